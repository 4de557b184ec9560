pub mod auth_client;
mod config;
pub mod login;
pub mod pkce;
pub mod scraper;
pub mod session;

pub use auth_client::{AuthClient, AuthClientError, AuthorizationContext};
pub use config::{HttpSettings, ProviderConfig, Settings, WakeSettings};
pub use login::LoginStrategy;
pub use pkce::PkceChallenge;
pub use scraper::{HiddenFieldScraper, HiddenFields, RegexScraper};
pub use session::Session;
