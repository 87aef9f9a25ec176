//! Carga y gestión de configuración de la consola (dirección del backend GraphRAG).

use std::env;
use anyhow::{anyhow, Result};
use url::Url;

use crate::models::ApproachId;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5001";

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: Url,
    pub default_approach: ApproachId,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let raw_url = env::var("GRAPHRAG_API_BASE_URL")
            .or_else(|_| env::var("API_BASE_URL"))
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = parse_base_url(&raw_url)?;

        let default_approach = match env::var("GRAPHRAG_DEFAULT_APPROACH") {
            Ok(value) => value.parse::<ApproachId>().map_err(|e| anyhow!(e))?,
            Err(_) => ApproachId::Comparison,
        };

        Ok(Self {
            api_base_url,
            default_approach,
        })
    }
}

/// Valida la URL base del backend. Sólo se aceptan `http` y `https`, y se
/// elimina la barra final para poder concatenar endpoints tal cual.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|e| anyhow!("URL base de la API inválida '{raw}': {e}"))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("Esquema no soportado para la API: {other}")),
    }
}
