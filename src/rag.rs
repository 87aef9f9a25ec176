//! Consulta en lenguaje natural contra el grafo con un único enfoque
//! (graph, rag o hybrid).

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    api_client::{self, ApiClient},
    error::ClientError,
    models::{Approach, QueryResult},
};

pub const QUERY_ENDPOINT: &str = "/graph/query";

/// Respuesta cruda de `/graph/query`. `question` y `approach` pueden faltar;
/// en ese caso se rellenan con los de la petición.
#[derive(Debug, Deserialize)]
struct RawQueryResponse {
    answer: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    approach: Option<String>,
}

/// Lanza la pregunta con el enfoque indicado.
///
/// La comparación no es un `Approach`, así que no puede llegar aquí: se
/// enruta a `comparison::compare`.
pub async fn query(
    client: &ApiClient,
    question: &str,
    approach: Approach,
) -> Result<QueryResult, ClientError> {
    info!(%approach, "Lanzando consulta");
    let response = client
        .post(
            QUERY_ENDPOINT,
            &json!({ "question": question, "approach": approach, "verbose": false }),
        )
        .await?;

    let raw: RawQueryResponse = api_client::decode(response, "respuesta de consulta")?;
    normalize(raw, question, approach)
}

fn normalize(
    raw: RawQueryResponse,
    question: &str,
    requested: Approach,
) -> Result<QueryResult, ClientError> {
    if let Some(tag) = raw.approach.as_deref() {
        if !tag.eq_ignore_ascii_case(requested.as_str()) {
            warn!(%requested, returned = tag, "El backend respondió con otro enfoque");
            return Err(ClientError::InvalidResponse(format!(
                "se pidió el enfoque '{requested}' y la respuesta es de '{tag}'"
            )));
        }
    }

    Ok(QueryResult {
        question: raw.question.unwrap_or_else(|| question.to_string()),
        answer: raw.answer,
        context: raw.context.unwrap_or_default(),
        approach: requested,
    })
}
