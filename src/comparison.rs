//! Comparación de enfoques: una sola petición, el backend ejecuta graph, rag
//! e hybrid y calcula el resumen de rendimiento.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    api_client::{self, ApiClient},
    error::ClientError,
    models::{Approach, ApproachRun, ComparisonResult, PerformanceSummary},
};

pub const COMPARISON_ENDPOINT: &str = "/comparison/query";

#[derive(Debug, Deserialize)]
struct RawComparisonResponse {
    #[serde(default)]
    question: Option<String>,
    results: BTreeMap<Approach, ApproachRun>,
    performance_summary: PerformanceSummary,
}

/// Ejecuta la comparación. "fastest" y "richest_context" se toman tal cual
/// del backend; aquí sólo se comprueba que nombran enfoques presentes.
pub async fn compare(client: &ApiClient, question: &str) -> Result<ComparisonResult, ClientError> {
    info!("Lanzando comparación de enfoques");
    let response = client
        .post(COMPARISON_ENDPOINT, &json!({ "question": question }))
        .await?;

    let raw: RawComparisonResponse = api_client::decode(response, "respuesta de comparación")?;
    let result = ComparisonResult {
        question: raw.question.unwrap_or_else(|| question.to_string()),
        results: raw.results,
        performance_summary: raw.performance_summary,
    };
    check_invariants(&result)?;

    info!(
        fastest = %result.performance_summary.fastest,
        richest_context = %result.performance_summary.richest_context,
        "Comparación completada"
    );
    Ok(result)
}

fn check_invariants(result: &ComparisonResult) -> Result<(), ClientError> {
    let missing: Vec<&str> = Approach::ALL
        .iter()
        .filter(|a| !result.results.contains_key(*a))
        .map(Approach::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(ClientError::InvalidResponse(format!(
            "faltan resultados para: {}",
            missing.join(", ")
        )));
    }

    let summary = &result.performance_summary;
    for (field, approach) in [
        ("fastest", summary.fastest),
        ("richest_context", summary.richest_context),
    ] {
        if !result.results.contains_key(&approach) {
            return Err(ClientError::InvalidResponse(format!(
                "performance_summary.{field} nombra '{approach}', que no está en los resultados"
            )));
        }
    }

    for (approach, run) in &result.results {
        if !run.context_length_matches() {
            warn!(
                %approach,
                reported = run.context_length,
                actual = run.context.chars().count(),
                "context_length no coincide con el contexto recibido"
            );
        }
    }
    Ok(())
}
