//! Adaptador de transporte HTTP hacia el backend GraphRAG.
//!
//! Serializa el cuerpo como JSON, decodifica cualquier respuesta JSON sin
//! validar su esquema y convierte los fallos en `ClientError`.

use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::error::ClientError;

/// Cliente sin estado: se puede clonar y usar desde varias tareas a la vez.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.api_base_url.as_str())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lanza una petición y devuelve el JSON de la respuesta tal cual.
    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%method, %url, "Llamada a la API");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.connection_error(e))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.connection_error(e))?;

        if !status.is_success() {
            let message = error_message(status, &bytes);
            error!(%method, %url, status = status.as_u16(), %message, "La API devolvió un error");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            error!(%url, "Cuerpo de respuesta no es JSON: {}", e);
            ClientError::InvalidResponse(format!("el cuerpo de {endpoint} no es JSON válido: {e}"))
        })
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value, ClientError> {
        self.call(endpoint, Method::GET, None).await
    }

    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ClientError> {
        self.call(endpoint, Method::POST, Some(body)).await
    }

    fn connection_error(&self, source: reqwest::Error) -> ClientError {
        error!(base_url = %self.base_url, "Backend inalcanzable: {}", source);
        ClientError::Connection {
            base_url: self.base_url.clone(),
            source,
        }
    }
}

/// Mensaje de un error HTTP: el campo `error` del cuerpo si existe, si no uno genérico.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Decodifica un valor ya recibido en el tipo esperado por el llamador.
pub fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, ClientError> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::InvalidResponse(format!("{what}: {e}")))
}

/// Extrae el campo envoltorio (`result`, `data`) de una respuesta.
pub fn unwrap_field(mut value: Value, field: &str) -> Result<Value, ClientError> {
    value
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| ClientError::InvalidResponse(format!("falta el campo '{field}'")))
}
