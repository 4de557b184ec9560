use chrono::{Duration, Utc};
use tesla_api::endpoints::{
    commands::{Command, CommandResult},
    data_request::ChargeState,
    vehicles::Vehicle,
    VehicleId,
};
use tesla_api::{Request, WakeOutcome};
use tracing::Instrument;
use uuid::Uuid;

use crate::client::auth_client::AuthClient;
use crate::client::config::{Settings, WakeSettings};
use crate::client::login::{self, LoginStrategy};
use crate::common::Tokens;
use crate::error::AuthError;

/// Tokens this close to expiry are refreshed ahead of time.
const REFRESH_MARGIN: Duration = Duration::minutes(5);

/// One authenticated identity. Holds at most one set of tokens; every
/// owner-API call is made with the current one.
pub struct Session {
    id: Uuid,
    auth_client: AuthClient,
    owner_api_url: String,
    wake: WakeSettings,
    tokens: Option<Tokens>,
    authorization_header: Option<String>,
}

impl Session {
    pub fn new(settings: &Settings) -> Result<Self, AuthError> {
        Ok(Self {
            id: Uuid::new_v4(),
            auth_client: AuthClient::new(settings)?,
            owner_api_url: settings.provider.owner_api_url(),
            wake: settings.wake.clone(),
            tokens: None,
            authorization_header: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn auth_client(&self) -> &AuthClient {
        &self.auth_client
    }

    pub async fn login(&mut self, strategy: LoginStrategy) -> Result<&Tokens, AuthError> {
        let span = tracing::info_span!("login", session_id = %self.id, strategy = strategy.name());

        let tokens = async {
            tracing::info!("Logging in");
            let tokens = login::run(&self.auth_client, &strategy).await?;
            tracing::info!(expires_at = ?tokens.expires_at(), "Login successful");
            Ok::<_, AuthError>(tokens)
        }
        .instrument(span)
        .await?;

        self.set_tokens(tokens);
        self.require_tokens()
    }

    /// Replaces the credential and the derived `Authorization` header.
    pub fn set_tokens(&mut self, tokens: Tokens) {
        self.authorization_header = Some(format!("Bearer {}", tokens.access_token()));
        self.tokens = Some(tokens);
    }

    pub fn tokens(&self) -> Option<&Tokens> {
        self.tokens.as_ref()
    }

    pub fn require_tokens(&self) -> Result<&Tokens, AuthError> {
        self.tokens.as_ref().ok_or(AuthError::NotAuthenticated)
    }

    /// `Bearer <access token>`, the header `api()` clients send. Exposed for
    /// callers issuing their own owner-API requests.
    pub fn authorization_header(&self) -> Option<&str> {
        self.authorization_header.as_deref()
    }

    /// True when the current tokens expire within the refresh margin.
    /// Tokens without a known expiry never need a refresh.
    pub fn needs_refresh(&self) -> bool {
        self.tokens
            .as_ref()
            .is_some_and(|tokens| tokens.is_expired_at(Utc::now(), REFRESH_MARGIN))
    }

    pub async fn refresh_if_needed(&mut self) -> Result<&Tokens, AuthError> {
        self.require_tokens()?;
        if self.needs_refresh() {
            tracing::debug!(session_id = %self.id, "Tokens about to expire");
            return self.refresh_tokens().await;
        }
        self.require_tokens()
    }

    pub async fn refresh_tokens(&mut self) -> Result<&Tokens, AuthError> {
        let current = self.require_tokens()?;
        let refreshed = self
            .auth_client
            .refresh(current)
            .instrument(tracing::info_span!("refresh", session_id = %self.id))
            .await?;

        self.set_tokens(refreshed);
        self.require_tokens()
    }

    /// Owner-API client bound to the current access token.
    pub fn api(&self) -> Result<tesla_api::Client, AuthError> {
        let tokens = self.require_tokens()?;
        Ok(tesla_api::Client::with_base_url(
            &self.owner_api_url,
            tokens.access_token(),
        ))
    }

    pub async fn vehicles(&self) -> Result<Vec<Vehicle>, AuthError> {
        let resp = self.api()?.send(Request::vehicles().list()).await?;
        Ok(resp.response)
    }

    pub async fn vehicle_by_vin(&self, vin: &str) -> Result<Option<Vehicle>, AuthError> {
        let vehicles = self.vehicles().await?;
        Ok(vehicles.into_iter().find(|v| v.vin.eq_ignore_ascii_case(vin)))
    }

    /// Wakes the vehicle with the configured timings.
    pub async fn wake_up(&self, vehicle_id: &VehicleId) -> Result<WakeOutcome, AuthError> {
        let api = self.api()?;
        let outcome = tesla_api::wake_and_confirm(
            &api,
            vehicle_id,
            self.wake.max_duration(),
            self.wake.poll_interval(),
        )
        .instrument(tracing::info_span!("wake", session_id = %self.id))
        .await;
        Ok(outcome)
    }

    /// `None` while the vehicle is asleep or unreachable.
    pub async fn charge_state(
        &self,
        vehicle_id: &VehicleId,
    ) -> Result<Option<ChargeState>, AuthError> {
        let req = Request::vehicles().charge_state(vehicle_id.clone());
        Ok(self.api()?.send(req).await?.response)
    }

    pub async fn command(&self, command: Command) -> Result<CommandResult, AuthError> {
        let name = command.name().to_string();
        let resp = self.api()?.send(command).await?;
        if let Some(reason) = resp.response.failure_reason(&[]) {
            tracing::warn!(command = %name, reason, "Command not executed");
        }
        Ok(resp.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN_PAGE: &str = r#"
        <form method="post">
          <input type="hidden" name="_csrf" value="csrf-token">
          <input type="hidden" name="_phase" value="authenticate">
          <input type="hidden" name="cancel" value="">
          <input type="hidden" name="transaction_id" value="tx-42">
        </form>"#;

    fn settings(server: &MockServer) -> Settings {
        let mut settings = Settings::default();
        settings.provider.auth_base_url = server.uri();
        settings.provider.owner_api_base_url = server.uri();
        settings.wake.max_duration_ms = 0;
        settings.wake.poll_interval_ms = 1;
        settings
    }

    #[tokio::test]
    async fn operations_require_tokens() {
        let server = MockServer::start().await;
        let mut session = Session::new(&settings(&server)).unwrap();

        assert!(session.tokens().is_none());
        assert!(session.authorization_header().is_none());
        assert!(matches!(session.require_tokens(), Err(AuthError::NotAuthenticated)));
        assert!(matches!(session.api(), Err(AuthError::NotAuthenticated)));
        assert!(matches!(session.vehicles().await, Err(AuthError::NotAuthenticated)));
        assert!(matches!(
            session.vehicle_by_vin("5YJ3E1EA7JF000001").await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            session.wake_up(&VehicleId::from("1")).await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            session
                .command(Request::vehicles().commands(VehicleId::from("1")).honk_horn())
                .await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            session.charge_state(&VehicleId::from("1")).await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            session.refresh_tokens().await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(matches!(
            session.refresh_if_needed().await,
            Err(AuthError::NotAuthenticated)
        ));
        assert!(!session.needs_refresh());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn set_tokens_replaces_header() {
        let server = MockServer::start().await;
        let mut session = Session::new(&settings(&server)).unwrap();

        session.set_tokens(Tokens::new("first", None));
        assert_eq!(session.authorization_header(), Some("Bearer first"));

        session.set_tokens(Tokens::new("second", Some("rt".to_string())));
        assert_eq!(session.authorization_header(), Some("Bearer second"));
        assert_eq!(session.require_tokens().unwrap().refresh_token(), Some("rt"));
    }

    #[tokio::test]
    async fn full_mfa_login_populates_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v3/authorize"))
            .and(query_param("code_challenge_method", "S256"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .expect(1)
            .mount(&server)
            .await;
        // Credential submission and the final code request both post to the
        // authorize URL; only the latter carries nothing but the transaction id.
        Mock::given(method("POST"))
            .and(path("/oauth2/v3/authorize"))
            .and(wiremock::matchers::body_string_contains("identity="))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>mfa</html>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v3/authorize"))
            .and(wiremock::matchers::body_string("transaction_id=tx-42"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "Location",
                "https://auth.tesla.com/void/callback?code=mfa-code&state=s&issuer=i",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v3/authorize/mfa/factors"))
            .and(query_param("transaction_id", "tx-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "factor-1", "name": "Phone"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v3/authorize/mfa/verify"))
            .and(body_partial_json(json!({
                "transaction_id": "tx-42",
                "factor_id": "factor-1",
                "passcode": "123456"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"approved": true, "valid": true, "flagged": false}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v3/token"))
            .and(body_partial_json(json!({"code": "mfa-code"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "oauth-at",
                "refresh_token": "oauth-rt",
                "expires_in": 300
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("authorization", "Bearer oauth-at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "api-at",
                "expires_in": 3888000,
                "created_at": 1612180800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = Session::new(&settings(&server)).unwrap();
        let strategy = LoginStrategy::Mfa {
            identity: "elon@tesla.com".to_string(),
            credential: SecretString::from("hunter2".to_string()),
            passcode: SecretString::from("123456".to_string()),
        };

        let tokens = session.login(strategy).await.unwrap();
        assert_eq!(tokens.access_token(), "api-at");
        assert_eq!(tokens.refresh_token(), Some("oauth-rt"));
        assert_eq!(session.authorization_header(), Some("Bearer api-at"));
    }

    #[tokio::test]
    async fn refresh_replaces_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v3/token"))
            .and(body_partial_json(json!({"refresh_token": "rt-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-2",
                "refresh_token": "rt-2",
                "expires_in": 300
            })))
            .mount(&server)
            .await;
        let mut session = Session::new(&settings(&server)).unwrap();
        session.set_tokens(Tokens::new("at-1", Some("rt-1".to_string())));

        let tokens = session.refresh_tokens().await.unwrap();
        assert_eq!(tokens.access_token(), "at-2");
        assert_eq!(tokens.refresh_token(), Some("rt-2"));
        assert_eq!(session.authorization_header(), Some("Bearer at-2"));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_current_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v3/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;
        let mut session = Session::new(&settings(&server)).unwrap();
        session.set_tokens(Tokens::new("at-1", Some("rt-1".to_string())));

        assert!(matches!(
            session.refresh_tokens().await,
            Err(AuthError::AuthClient(_))
        ));
        assert_eq!(session.authorization_header(), Some("Bearer at-1"));
    }

    #[tokio::test]
    async fn vehicle_lookup_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles"))
            .and(header("authorization", "Bearer api-at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": [
                    {"id": 11, "vehicle_id": 1, "vin": "5YJ3E1EA7JF000001", "display_name": "Red", "state": "online"},
                    {"id": 22, "vehicle_id": 2, "vin": "5YJ3E1EA7JF000002", "display_name": "Blue", "state": "asleep"}
                ],
                "count": 2
            })))
            .mount(&server)
            .await;
        let mut session = Session::new(&settings(&server)).unwrap();
        session.set_tokens(Tokens::new("api-at", None));
        assert_eq!(session.authorization_header(), Some("Bearer api-at"));

        let vehicles = session.vehicles().await.unwrap();
        assert_eq!(vehicles.len(), 2);

        let blue = session
            .vehicle_by_vin("5yj3e1ea7jf000002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(blue.id, "22");
        assert!(blue.is_asleep());
        assert!(session.vehicle_by_vin("UNKNOWN").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wake_up_confirms_shift_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/1/vehicles/11/wake_up"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"id": 11, "vin": "5YJ3E1EA7JF000001", "state": "online"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles/11/data_request/drive_state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"shift_state": "P", "speed": null}
            })))
            .mount(&server)
            .await;
        let mut session = Session::new(&settings(&server)).unwrap();
        session.set_tokens(Tokens::new("api-at", None));

        let outcome = session.wake_up(&VehicleId::from(11u64)).await.unwrap();
        assert_eq!(outcome, WakeOutcome::Confirmed("P".to_string()));
    }

    #[tokio::test]
    async fn command_result_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/1/vehicles/11/command/set_sentry_mode"))
            .and(body_partial_json(json!({"on": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"result": true, "reason": ""}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let mut session = Session::new(&settings(&server)).unwrap();
        session.set_tokens(Tokens::new("api-at", None));

        let command = Request::vehicles()
            .commands(VehicleId::from(11u64))
            .set_sentry_mode(true);
        let result = session.command(command).await.unwrap();
        assert!(result.result);
    }

    #[tokio::test]
    async fn expiring_tokens_are_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v3/token"))
            .and(body_partial_json(json!({"refresh_token": "rt-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        let mut session = Session::new(&settings(&server)).unwrap();
        let issued = Utc::now() - Duration::minutes(58);
        session.set_tokens(Tokens::with_expiry("at-1", Some("rt-1".to_string()), issued, 3600).unwrap());

        assert!(session.needs_refresh());
        let tokens = session.refresh_if_needed().await.unwrap();
        assert_eq!(tokens.access_token(), "at-2");
        assert_eq!(tokens.refresh_token(), Some("rt-1"));
        assert!(!session.needs_refresh());
    }

    #[tokio::test]
    async fn fresh_tokens_are_not_refreshed() {
        let server = MockServer::start().await;
        let mut session = Session::new(&settings(&server)).unwrap();
        session.set_tokens(
            Tokens::with_expiry("at-1", Some("rt-1".to_string()), Utc::now(), 3600).unwrap(),
        );

        assert!(!session.needs_refresh());
        assert_eq!(session.refresh_if_needed().await.unwrap().access_token(), "at-1");

        session.set_tokens(Tokens::new("pasted", Some("rt".to_string())));
        assert!(!session.needs_refresh());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn charge_state_is_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles/11/data_request/charge_state"))
            .and(header("authorization", "Bearer api-at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"battery_level": 64, "charging_state": "Charging", "charge_limit_soc": 90}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/1/vehicles/22/data_request/charge_state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": null})))
            .mount(&server)
            .await;
        let mut session = Session::new(&settings(&server)).unwrap();
        session.set_tokens(Tokens::new("api-at", None));

        let state = session
            .charge_state(&VehicleId::from(11u64))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.battery_level, Some(64));
        assert_eq!(state.charging_state.as_deref(), Some("Charging"));
        assert!(session
            .charge_state(&VehicleId::from(22u64))
            .await
            .unwrap()
            .is_none());
    }
}
