use chrono::{serde::ts_seconds, serde::ts_seconds_option, DateTime, Duration, Utc};
use serde::Serialize;

/// Access/refresh token pair with derived expiry.
///
/// Values are never mutated; a refresh builds a new `Tokens`.
/// `expires_at` is only known when `expires_in` is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tokens {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(with = "ts_seconds")]
    created_at: DateTime<Utc>,
    expires_in: Option<i64>,
    #[serde(with = "ts_seconds_option")]
    expires_at: Option<DateTime<Utc>>,
}

impl Tokens {
    /// Tokens obtained out of band, e.g. copied from an earlier login.
    /// The expiry is unknown.
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            created_at: Utc::now(),
            expires_in: None,
            expires_at: None,
        }
    }

    /// `None` when `created_at + expires_in` is not a representable instant.
    pub fn with_expiry(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        created_at: DateTime<Utc>,
        expires_in: i64,
    ) -> Option<Self> {
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|lifetime| created_at.checked_add_signed(lifetime))?;

        Some(Self {
            access_token: access_token.into(),
            refresh_token,
            created_at,
            expires_in: Some(expires_in),
            expires_at: Some(expires_at),
        })
    }

    /// Same access token and expiry, different refresh token.
    pub fn with_refresh_token(&self, refresh_token: Option<String>) -> Self {
        Self {
            refresh_token,
            ..self.clone()
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True when the token expires within `buffer` of `now`. Tokens with an
    /// unknown expiry never report expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_at
            .map(|expires_at| expires_at <= now + buffer)
            .unwrap_or(false)
    }
}
