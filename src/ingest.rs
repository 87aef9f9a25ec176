//! Ingesta de texto en el backend: el servidor extrae entidades y relaciones
//! y devuelve el delta estructural creado.

use serde_json::json;
use tracing::info;

use crate::{
    api_client::{self, ApiClient},
    error::ClientError,
    models::BuildResult,
};

pub const BUILD_ENDPOINT: &str = "/graph/build";

/// Rechaza localmente el texto vacío o formado sólo por espacios.
pub fn validate_text(text: &str) -> Result<(), ClientError> {
    if text.trim().is_empty() {
        return Err(ClientError::Validation(
            "Introduce un texto para procesar".to_string(),
        ));
    }
    Ok(())
}

/// Envía `text` al backend para construir (o ampliar) el grafo.
///
/// Con `clear_existing` el backend borra el grafo previo antes de la ingesta.
/// Los contadores devueltos son sólo el delta; quien llama debe refrescar las
/// estadísticas y los costes después.
pub async fn build_graph(
    client: &ApiClient,
    text: &str,
    clear_existing: bool,
) -> Result<BuildResult, ClientError> {
    validate_text(text)?;

    info!(chars = text.chars().count(), clear_existing, "Enviando texto para construir el grafo...");
    let response = client
        .post(
            BUILD_ENDPOINT,
            &json!({ "text": text, "clear_existing": clear_existing }),
        )
        .await?;

    let result: BuildResult = api_client::decode(
        api_client::unwrap_field(response, "result")?,
        "resultado de construcción",
    )?;

    info!(
        entities_created = result.entities_created,
        relationships_created = result.relationships_created,
        entities_failed = result.entities_failed,
        "Grafo construido"
    );
    Ok(result)
}
