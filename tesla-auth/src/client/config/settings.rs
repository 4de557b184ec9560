use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the login protocol and the owner-API client are configured
/// with. Loaded from an optional TOML file overlaid with `TESLA__*`
/// environment variables, e.g. `TESLA__PROVIDER__LOCALE=nl-NL`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub wake: WakeSettings,
}

/// Identity of the provider app and the endpoints it talks to.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,

    #[serde(default = "default_owner_api_base_url")]
    pub owner_api_base_url: String,

    /// Path segment of the `oauth2/{version}/...` endpoints.
    #[serde(default = "default_oauth_version")]
    pub oauth_version: String,

    /// Client id for the authorize and token endpoints.
    #[serde(default = "default_auth_client_id")]
    pub auth_client_id: String,

    /// Client id/secret pair for the owner-API token exchange.
    #[serde(default = "default_api_client_id")]
    pub api_client_id: String,

    #[serde(default = "default_api_client_secret")]
    pub api_client_secret: String,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scope")]
    pub scope: String,

    pub audience: Option<String>,

    pub locale: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WakeSettings {
    #[serde(default = "default_wake_max_duration")]
    pub max_duration_ms: u64,

    #[serde(default = "default_wake_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_auth_base_url() -> String {
    "https://auth.tesla.com".to_string()
}

fn default_owner_api_base_url() -> String {
    "https://owner-api.teslamotors.com".to_string()
}

fn default_oauth_version() -> String {
    "v3".to_string()
}

fn default_auth_client_id() -> String {
    "ownerapi".to_string()
}

fn default_api_client_id() -> String {
    "81527cff06843c8634fdc09e8ac0abefb46ac849f38fe1e431c2ef2106796384".to_string()
}

fn default_api_client_secret() -> String {
    "c7257eb71a564034f9419ee651c7d0e5f7aa6bfbd18bafb5c5c033b093bb2fa3".to_string()
}

fn default_redirect_uri() -> String {
    "https://auth.tesla.com/void/callback".to_string()
}

fn default_scope() -> String {
    "openid email offline_access".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    120
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_wake_max_duration() -> u64 {
    60_000
}

fn default_wake_poll_interval() -> u64 {
    5_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            auth_base_url: default_auth_base_url(),
            owner_api_base_url: default_owner_api_base_url(),
            oauth_version: default_oauth_version(),
            auth_client_id: default_auth_client_id(),
            api_client_id: default_api_client_id(),
            api_client_secret: default_api_client_secret(),
            redirect_uri: default_redirect_uri(),
            scope: default_scope(),
            audience: None,
            locale: None,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for WakeSettings {
    fn default() -> Self {
        Self {
            max_duration_ms: default_wake_max_duration(),
            poll_interval_ms: default_wake_poll_interval(),
        }
    }
}

impl ProviderConfig {
    /// `{auth_base_url}/oauth2/{version}`
    pub fn oauth2_base(&self) -> String {
        format!(
            "{}/oauth2/{}",
            self.auth_base_url.trim_end_matches('/'),
            self.oauth_version
        )
    }

    /// Base of the versioned owner API, as expected by `tesla_api::Client`.
    pub fn owner_api_url(&self) -> String {
        format!("{}/api/1", self.owner_api_base_url.trim_end_matches('/'))
    }

    /// Owner-API token endpoint used for the JWT-bearer and password grants.
    pub fn owner_api_token_url(&self) -> String {
        format!("{}/oauth/token", self.owner_api_base_url.trim_end_matches('/'))
    }
}

impl WakeSettings {
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = std::env::var("TESLA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_config_path());

        let settings = Config::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(config::Environment::with_prefix("TESLA").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// `config.toml` in the working directory when present, otherwise the
    /// per-user config directory.
    fn default_config_path() -> PathBuf {
        let local = PathBuf::from("config.toml");
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("tesla-auth").join("config.toml"))
            .unwrap_or(local)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (key, value) in [
            ("provider.auth_base_url", &self.provider.auth_base_url),
            ("provider.owner_api_base_url", &self.provider.owner_api_base_url),
            ("provider.redirect_uri", &self.provider.redirect_uri),
        ] {
            if !value.starts_with("http") {
                return Err(format!("{} must be a valid HTTP(S) URL", key));
            }
        }
        if self.provider.oauth_version.is_empty() || self.provider.oauth_version.contains('/') {
            return Err("provider.oauth_version must be a single path segment".to_string());
        }
        if self.provider.auth_client_id.is_empty() || self.provider.api_client_id.is_empty() {
            return Err("provider client ids are required".to_string());
        }
        if self.wake.poll_interval_ms == 0 {
            return Err("wake.poll_interval_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.provider.oauth2_base(), "https://auth.tesla.com/oauth2/v3");
        assert_eq!(
            settings.provider.owner_api_url(),
            "https://owner-api.teslamotors.com/api/1"
        );
        assert_eq!(
            settings.provider.owner_api_token_url(),
            "https://owner-api.teslamotors.com/oauth/token"
        );
    }

    #[test]
    fn rejects_bad_values() {
        let mut settings = Settings::default();
        settings.provider.auth_base_url = "auth.tesla.com".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.provider.oauth_version = "v3/extra".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.wake.poll_interval_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(
                "[provider]\nlocale = \"nl-NL\"\n[wake]\npoll_interval_ms = 250\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.provider.locale.as_deref(), Some("nl-NL"));
        assert_eq!(settings.provider.auth_client_id, "ownerapi");
        assert_eq!(settings.wake.poll_interval(), Duration::from_millis(250));
        assert_eq!(settings.wake.max_duration_ms, 60_000);
        assert_eq!(settings.http.connect_timeout_secs, 30);
    }
}
