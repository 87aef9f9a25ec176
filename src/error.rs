//! Errores tipados de la capa cliente (validación, conexión, API y respuestas inválidas).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Error local previo a cualquier llamada de red (p. ej. texto vacío).
    #[error("{0}")]
    Validation(String),

    #[error(
        "No se puede conectar con el servidor de la API. Asegúrate de que el backend GraphRAG está en marcha en {base_url}"
    )]
    Connection {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },

    /// El backend respondió con un estado no exitoso.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Respuesta inválida del servidor: {0}")]
    InvalidResponse(String),
}

/// Clase del error, para quien sólo necesita distinguir el tipo de fallo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Connection,
    Api,
    InvalidResponse,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Api { .. } => ErrorKind::Api,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }
}
