//! Tipos de error personalizados para Custodio.
//!
//! Proporciona errores estructurados con contexto para mejor debugging
//! y manejo de errores en producción.

use std::fmt;

/// Error principal de la aplicación Custodio
#[derive(Debug)]
pub enum CustodioError {
    /// Errores de configuración
    Config(String),
    /// Errores de autenticación o autorización
    Auth(String),
    /// Errores de I/O
    Io(std::io::Error),
    /// Errores de parsing
    Parse(String),
    /// Errores HTTP
    Http(String),
    /// Errores genéricos
    Other(String),
}

impl fmt::Display for CustodioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustodioError::Config(msg) => write!(f, "Config error: {}", msg),
            CustodioError::Auth(msg) => write!(f, "Auth error: {}", msg),
            CustodioError::Io(err) => write!(f, "IO error: {}", err),
            CustodioError::Parse(msg) => write!(f, "Parse error: {}", msg),
            CustodioError::Http(msg) => write!(f, "HTTP error: {}", msg),
            CustodioError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CustodioError {}

impl From<std::io::Error> for CustodioError {
    fn from(err: std::io::Error) -> Self {
        CustodioError::Io(err)
    }
}

impl From<serde_json::Error> for CustodioError {
    fn from(err: serde_json::Error) -> Self {
        CustodioError::Parse(format!("JSON error: {}", err))
    }
}

impl From<&str> for CustodioError {
    fn from(err: &str) -> Self {
        CustodioError::Other(err.to_string())
    }
}

impl From<String> for CustodioError {
    fn from(err: String) -> Self {
        CustodioError::Other(err)
    }
}

impl axum::response::IntoResponse for CustodioError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            CustodioError::Auth(_) => (axum::http::StatusCode::UNAUTHORIZED, self.to_string()),
            CustodioError::Config(_) | CustodioError::Io(_) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                self.to_string(),
            ),
            CustodioError::Parse(_) | CustodioError::Http(_) | CustodioError::Other(_) => {
                (axum::http::StatusCode::BAD_REQUEST, self.to_string())
            }
        };

        axum::response::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(format!(
                "{{\"error\": \"{}\"}}",
                message
            )))
            .unwrap()
    }
}

/// Result type alias para simplificar el código
pub type Result<T> = std::result::Result<T, CustodioError>;
