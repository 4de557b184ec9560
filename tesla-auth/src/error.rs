use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not authenticated: log in or set tokens first")]
    NotAuthenticated,

    #[error("Auth error: {0}")]
    AuthClient(#[from] crate::client::AuthClientError),

    #[error("Owner API error: {0}")]
    Api(#[from] tesla_api::TeslaApiError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for AuthError {
    fn from(err: config::ConfigError) -> Self {
        AuthError::Configuration(err.to_string())
    }
}
