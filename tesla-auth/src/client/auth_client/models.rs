use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::scraper::HiddenFields;
use crate::common::Tokens;

/// State of one login attempt. Dropped when the login call returns.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    pub code_verifier: String,
    pub code_challenge: String,
    pub authorize_url: Url,
    pub transaction_id: Option<String>,
    pub hidden_fields: HiddenFields,
    pub factor_ids: Vec<String>,
}

impl AuthorizationContext {
    pub fn transaction_id(&self) -> Result<&str, AuthClientError> {
        self.transaction_id
            .as_deref()
            .ok_or_else(|| AuthClientError::Scrape("transaction_id".to_string()))
    }
}

// Token endpoint requests

#[derive(Debug, Serialize)]
pub struct AuthorizationCodeRequest<'a> {
    pub grant_type: &'a str,
    pub client_id: &'a str,
    pub code: &'a str,
    pub code_verifier: &'a str,
    pub redirect_uri: &'a str,
}

#[derive(Debug, Serialize)]
pub struct JwtBearerRequest<'a> {
    pub grant_type: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub grant_type: &'a str,
    pub client_id: &'a str,
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PasswordRequest<'a> {
    pub grant_type: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Success body shared by every token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Epoch seconds; only the owner-API endpoint sends it.
    pub created_at: Option<i64>,
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn into_tokens(self, now: DateTime<Utc>) -> Result<Tokens, AuthClientError> {
        let created_at = self
            .created_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(now);
        let expires_in = self.expires_in;
        Tokens::with_expiry(self.access_token, self.refresh_token, created_at, expires_in)
            .ok_or(AuthClientError::InvalidExpiry(expires_in))
    }
}

// MFA

#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct Factor {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyRequest<'a> {
    pub transaction_id: &'a str,
    pub factor_id: &'a str,
    pub passcode: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResult {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub flagged: bool,
}

impl VerifyResult {
    pub fn accepted(&self) -> bool {
        self.approved && self.valid && !self.flagged
    }
}

#[derive(Debug)]
pub enum AuthClientError {
    /// Connection failure or unreadable body.
    Http(reqwest::Error),
    /// Non-2xx response. `detail` is the provider's error message when the
    /// body carried one, otherwise the raw body.
    Status { status: StatusCode, detail: String },
    /// 2xx response whose JSON carried `error.message`.
    Provider(String),
    /// A hidden field the protocol depends on was missing from the page.
    Scrape(String),
    NoFactors,
    MfaRejected,
    MissingRefreshToken,
    /// `expires_in` too large to turn into an expiry instant.
    InvalidExpiry(i64),
    Json(serde_json::Error),
    InvalidUrl(url::ParseError),
}

impl std::fmt::Display for AuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {}", e),
            Self::Status { status, detail } if detail.is_empty() => {
                write!(f, "Request not successful: {}", status)
            }
            Self::Status { status, detail } => {
                write!(f, "Request not successful: {}: {}", status, detail)
            }
            Self::Provider(msg) => write!(f, "Provider error: {}", msg),
            Self::Scrape(field) => write!(f, "Login page is missing hidden field '{}'", field),
            Self::NoFactors => write!(f, "No MFA factors are registered for this account"),
            Self::MfaRejected => write!(f, "Passcode was not approved by any MFA factor"),
            Self::MissingRefreshToken => write!(f, "No refresh token available"),
            Self::InvalidExpiry(secs) => write!(f, "Token lifetime out of range: {}s", secs),
            Self::Json(e) => write!(f, "Unexpected response: {}", e),
            Self::InvalidUrl(e) => write!(f, "Invalid URL: {}", e),
        }
    }
}

impl std::error::Error for AuthClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::InvalidUrl(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<serde_json::Error> for AuthClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<url::ParseError> for AuthClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err)
    }
}
