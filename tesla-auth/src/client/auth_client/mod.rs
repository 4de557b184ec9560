mod models;

pub use models::{AuthClientError, AuthorizationContext};
use models::*;

use chrono::Utc;
use regex::Regex;
use reqwest::{cookie::Jar, header::LOCATION, redirect, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use url::Url;

use crate::client::config::{ProviderConfig, Settings};
use crate::client::pkce::{self, PkceChallenge};
use crate::client::scraper::{HiddenFieldScraper, RegexScraper};
use crate::common::Tokens;

static AUTH_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"code=([^&]*)&").expect("valid regex"));

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Speaks the provider's hosted-login protocol.
///
/// Holds two HTTP clients over one cookie jar: the hosted login form relies
/// on session cookies, and some steps must see the redirect instead of
/// following it.
pub struct AuthClient {
    http_client: Client,
    no_redirect_client: Client,
    provider: ProviderConfig,
    scraper: Box<dyn HiddenFieldScraper>,
}

impl AuthClient {
    pub fn new(settings: &Settings) -> Result<Self, AuthClientError> {
        Self::with_scraper(settings, Box::new(RegexScraper))
    }

    pub fn with_scraper(
        settings: &Settings,
        scraper: Box<dyn HiddenFieldScraper>,
    ) -> Result<Self, AuthClientError> {
        let jar = Arc::new(Jar::default());
        let builder = || {
            Client::builder()
                .cookie_provider(jar.clone())
                .connect_timeout(Duration::from_secs(settings.http.connect_timeout_secs))
                .timeout(Duration::from_secs(settings.http.request_timeout_secs))
                .user_agent(settings.http.user_agent.as_str())
        };

        let http_client = builder().build()?;
        let no_redirect_client = builder().redirect(redirect::Policy::none()).build()?;

        Ok(Self {
            http_client,
            no_redirect_client,
            provider: settings.provider.clone(),
            scraper,
        })
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    fn token_url(&self) -> String {
        format!("{}/token", self.provider.oauth2_base())
    }

    /// Authorize URL for a fresh login attempt. Every call draws a new
    /// `state`.
    pub fn authorize_url(&self, pkce: &PkceChallenge) -> Result<Url, AuthClientError> {
        let mut url = Url::parse(&format!("{}/authorize", self.provider.oauth2_base()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.provider.auth_client_id)
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", pkce.method())
                .append_pair("redirect_uri", &self.provider.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.provider.scope)
                .append_pair("state", &pkce::random_state());
            if let Some(audience) = &self.provider.audience {
                query.append_pair("audience", audience);
            }
            if let Some(locale) = &self.provider.locale {
                query.append_pair("locale", locale);
            }
        }
        Ok(url)
    }

    /// Loads the hosted login form and collects the hidden fields that must
    /// be echoed back with the credentials.
    pub async fn fetch_login_page(
        &self,
        authorize_url: Url,
        pkce: &PkceChallenge,
    ) -> Result<AuthorizationContext, AuthClientError> {
        tracing::debug!(url = %authorize_url, "Fetching login page");

        let resp = self.http_client.get(authorize_url.clone()).send().await?;
        let html = read_text(resp).await?;
        let hidden_fields = self.scraper.scrape(&html);
        let transaction_id = hidden_fields.get("transaction_id").cloned();

        if transaction_id.is_none() {
            tracing::warn!("Login page carried no transaction_id");
        }
        tracing::trace!(fields = ?hidden_fields.keys().collect::<Vec<_>>(), "Scraped login page");

        Ok(AuthorizationContext {
            code_verifier: pkce.verifier.clone(),
            code_challenge: pkce.challenge.clone(),
            authorize_url,
            transaction_id,
            hidden_fields,
            factor_ids: Vec::new(),
        })
    }

    /// Posts the credentials and follows the redirects. Used when MFA comes
    /// next; the code is retrieved later by `obtain_authorization_code`.
    pub async fn submit_credentials(
        &self,
        ctx: &AuthorizationContext,
        identity: &str,
        credential: &str,
    ) -> Result<(), AuthClientError> {
        tracing::debug!("Submitting credentials");

        let resp = self
            .http_client
            .post(ctx.authorize_url.clone())
            .form(&credential_form(ctx, identity, credential))
            .send()
            .await?;
        read_text(resp).await?;
        Ok(())
    }

    /// Posts the credentials without following the redirect and returns the
    /// authorization code from its `Location`. An empty code is returned when
    /// the provider did not redirect to the callback.
    pub async fn submit_credentials_for_code(
        &self,
        ctx: &AuthorizationContext,
        identity: &str,
        credential: &str,
    ) -> Result<String, AuthClientError> {
        tracing::debug!("Submitting credentials for authorization code");

        let resp = self
            .no_redirect_client
            .post(ctx.authorize_url.clone())
            .form(&credential_form(ctx, identity, credential))
            .send()
            .await?;
        code_from_redirect(resp).await
    }

    /// Asks for the authorization code once MFA has been verified.
    pub async fn obtain_authorization_code(
        &self,
        ctx: &AuthorizationContext,
    ) -> Result<String, AuthClientError> {
        let transaction_id = ctx.transaction_id()?;
        tracing::debug!("Requesting authorization code");

        let resp = self
            .no_redirect_client
            .post(ctx.authorize_url.clone())
            .form(&[("transaction_id", transaction_id)])
            .send()
            .await?;
        code_from_redirect(resp).await
    }

    pub async fn list_factors(&self, transaction_id: &str) -> Result<Vec<String>, AuthClientError> {
        let url = format!("{}/authorize/mfa/factors", self.provider.oauth2_base());

        let resp = self
            .http_client
            .get(&url)
            .query(&[("transaction_id", transaction_id)])
            .send()
            .await?;
        let factors: DataEnvelope<Vec<Factor>> = read_json(resp).await?;

        let ids: Vec<String> = factors.data.into_iter().map(|f| f.id).collect();
        tracing::trace!(factor_ids = ?ids, "Listed MFA factors");
        Ok(ids)
    }

    /// Tries the passcode against each factor in order and returns the id of
    /// the first one that accepts it.
    pub async fn verify_passcode(
        &self,
        passcode: &str,
        transaction_id: &str,
        factor_ids: &[String],
    ) -> Result<String, AuthClientError> {
        let url = format!("{}/authorize/mfa/verify", self.provider.oauth2_base());

        for factor_id in factor_ids {
            let resp = self
                .http_client
                .post(&url)
                .json(&VerifyRequest {
                    transaction_id,
                    factor_id,
                    passcode,
                })
                .send()
                .await?;
            let result: DataEnvelope<VerifyResult> = read_json(resp).await?;

            if result.data.accepted() {
                tracing::debug!(factor_id, "Passcode accepted");
                return Ok(factor_id.clone());
            }
            tracing::debug!(
                factor_id,
                approved = result.data.approved,
                valid = result.data.valid,
                flagged = result.data.flagged,
                "Passcode not accepted"
            );
        }

        Err(AuthClientError::MfaRejected)
    }

    /// Authorization code to a short-lived OAuth token.
    pub async fn exchange_authorization_code(
        &self,
        code_verifier: &str,
        code: &str,
    ) -> Result<Tokens, AuthClientError> {
        tracing::debug!("Exchanging authorization code");

        let resp = self
            .http_client
            .post(self.token_url())
            .json(&AuthorizationCodeRequest {
                grant_type: "authorization_code",
                client_id: &self.provider.auth_client_id,
                code,
                code_verifier,
                redirect_uri: &self.provider.redirect_uri,
            })
            .send()
            .await?;
        read_tokens(resp).await
    }

    /// OAuth access token to an owner-API token.
    pub async fn exchange_oauth_for_api_token(
        &self,
        oauth_access_token: &str,
    ) -> Result<Tokens, AuthClientError> {
        tracing::debug!("Exchanging OAuth token for owner-API token");

        let resp = self
            .http_client
            .post(self.provider.owner_api_token_url())
            .bearer_auth(oauth_access_token)
            .json(&JwtBearerRequest {
                grant_type: JWT_BEARER_GRANT,
                client_id: &self.provider.api_client_id,
                client_secret: &self.provider.api_client_secret,
            })
            .send()
            .await?;
        read_tokens(resp).await
    }

    /// Keeps the old refresh token when the provider does not rotate it.
    pub async fn refresh(&self, old: &Tokens) -> Result<Tokens, AuthClientError> {
        let refresh_token = old
            .refresh_token()
            .ok_or(AuthClientError::MissingRefreshToken)?;
        tracing::debug!("Refreshing tokens");

        let resp = self
            .http_client
            .post(self.token_url())
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                client_id: &self.provider.auth_client_id,
                refresh_token,
            })
            .send()
            .await?;
        let tokens = read_tokens(resp).await?;

        if tokens.refresh_token().is_some() {
            Ok(tokens)
        } else {
            Ok(tokens.with_refresh_token(Some(refresh_token.to_string())))
        }
    }

    /// Legacy direct password grant against the owner API. Accounts with MFA
    /// enabled are rejected by the provider.
    pub async fn password_grant(
        &self,
        identity: &str,
        credential: &str,
    ) -> Result<Tokens, AuthClientError> {
        tracing::debug!("Requesting owner-API token with password grant");

        let resp = self
            .http_client
            .post(self.provider.owner_api_token_url())
            .json(&PasswordRequest {
                grant_type: "password",
                client_id: &self.provider.api_client_id,
                client_secret: &self.provider.api_client_secret,
                email: identity,
                password: credential,
            })
            .send()
            .await?;
        read_tokens(resp).await
    }
}

fn credential_form<'a>(
    ctx: &'a AuthorizationContext,
    identity: &'a str,
    credential: &'a str,
) -> Vec<(&'a str, &'a str)> {
    let mut form = vec![("identity", identity), ("credential", credential)];
    form.extend(
        ctx.hidden_fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str())),
    );
    form
}

/// `code` query parameter of a redirect target. Empty when the pattern does
/// not match.
pub(crate) fn extract_authorization_code(location: &str) -> String {
    AUTH_CODE
        .captures(location)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

/// A body carrying `error.message` is a failure whatever the status.
fn fail_on_error(body: &Value) -> Result<(), AuthClientError> {
    match envelope_message(body) {
        Some(message) => Err(AuthClientError::Provider(message)),
        None => Ok(()),
    }
}

fn envelope_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn status_error(status: reqwest::StatusCode, body: &str) -> AuthClientError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| envelope_message(&v))
        .unwrap_or_else(|| body.trim().to_string());
    AuthClientError::Status { status, detail }
}

async fn read_text(resp: Response) -> Result<String, AuthClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, AuthClientError> {
    let body = read_text(resp).await?;
    let value: Value = serde_json::from_str(&body)?;
    fail_on_error(&value)?;
    Ok(serde_json::from_value(value)?)
}

async fn read_tokens(resp: Response) -> Result<Tokens, AuthClientError> {
    let token: TokenResponse = read_json(resp).await?;
    token.into_tokens(Utc::now())
}

async fn code_from_redirect(resp: Response) -> Result<String, AuthClientError> {
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        let body = resp.text().await?;
        return Err(status_error(status, &body));
    }

    let location = resp
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match location {
        Some(location) => {
            let code = extract_authorization_code(&location);
            if code.is_empty() {
                tracing::warn!(%status, "Redirect carried no authorization code");
            }
            Ok(code)
        }
        None => {
            tracing::warn!(%status, "Credential submission did not redirect");
            Ok(String::new())
        }
    }
}
