use serde::{Deserialize, Serialize};
use tower_api_client::{Error as ApiError, StatusCode};

#[derive(Debug)]
pub enum TeslaApiError {
    Tesla(StatusCode, ErrorDetail),
    Internal(ApiError),
}

impl From<ApiError> for TeslaApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, detail) | ApiError::ServerError(status, detail) => {
                TeslaApiError::Tesla(status, ErrorDetail::from_body(&detail))
            }
            e => TeslaApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for TeslaApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeslaApiError::Internal(e) => write!(f, "Internal error: {}", e),
            TeslaApiError::Tesla(status, detail) => match &detail.error_description {
                Some(description) if !description.is_empty() => {
                    write!(f, "({}) {}: {}", status, detail.error, description)
                }
                _ => write!(f, "({}) {}", status, detail.error),
            },
        }
    }
}

impl std::error::Error for TeslaApiError {}

/// Error body of the owner API, e.g.
/// `{"response":null,"error":"vehicle unavailable","error_description":""}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ErrorDetail {
    /// Bodies that are not the usual JSON shape are kept verbatim.
    fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| ErrorDetail {
            error: body.trim().to_string(),
            error_description: None,
        })
    }
}
