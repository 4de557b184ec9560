use secrecy::{ExposeSecret, SecretString};

use crate::client::auth_client::{AuthClient, AuthClientError};
use crate::client::pkce::PkceChallenge;
use crate::common::Tokens;

/// How a session obtains its tokens.
#[derive(Debug)]
pub enum LoginStrategy {
    /// Hosted login form for accounts without MFA. The authorization code is
    /// read from the redirect that answers the credentials.
    PasswordGrant {
        identity: String,
        credential: SecretString,
    },
    /// Hosted login form followed by a one-time passcode.
    Mfa {
        identity: String,
        credential: SecretString,
        passcode: SecretString,
    },
    /// The code was obtained elsewhere (e.g. in a browser). `code_verifier`
    /// must be the verifier whose challenge went into that authorize URL.
    AuthorizationCodeOnly { code: String, code_verifier: String },
    /// Legacy direct password grant against the owner API.
    OwnerApiPassword {
        identity: String,
        credential: SecretString,
    },
}

impl LoginStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LoginStrategy::PasswordGrant { .. } => "password_grant",
            LoginStrategy::Mfa { .. } => "mfa",
            LoginStrategy::AuthorizationCodeOnly { .. } => "authorization_code",
            LoginStrategy::OwnerApiPassword { .. } => "owner_api_password",
        }
    }
}

pub(crate) async fn run(
    client: &AuthClient,
    strategy: &LoginStrategy,
) -> Result<Tokens, AuthClientError> {
    match strategy {
        LoginStrategy::PasswordGrant {
            identity,
            credential,
        } => {
            let pkce = PkceChallenge::generate();
            let ctx = client
                .fetch_login_page(client.authorize_url(&pkce)?, &pkce)
                .await?;
            let code = client
                .submit_credentials_for_code(&ctx, identity, credential.expose_secret())
                .await?;
            exchange_chain(client, &ctx.code_verifier, &code).await
        }
        LoginStrategy::Mfa {
            identity,
            credential,
            passcode,
        } => {
            let pkce = PkceChallenge::generate();
            let mut ctx = client
                .fetch_login_page(client.authorize_url(&pkce)?, &pkce)
                .await?;
            client
                .submit_credentials(&ctx, identity, credential.expose_secret())
                .await?;

            let transaction_id = ctx.transaction_id()?.to_string();
            ctx.factor_ids = client.list_factors(&transaction_id).await?;
            if ctx.factor_ids.is_empty() {
                return Err(AuthClientError::NoFactors);
            }
            client
                .verify_passcode(passcode.expose_secret(), &transaction_id, &ctx.factor_ids)
                .await?;

            let code = client.obtain_authorization_code(&ctx).await?;
            exchange_chain(client, &ctx.code_verifier, &code).await
        }
        LoginStrategy::AuthorizationCodeOnly {
            code,
            code_verifier,
        } => exchange_chain(client, code_verifier, code).await,
        LoginStrategy::OwnerApiPassword {
            identity,
            credential,
        } => {
            client
                .password_grant(identity, credential.expose_secret())
                .await
        }
    }
}

/// Authorization code to owner-API tokens. The result pairs the owner-API
/// access token with the OAuth refresh token, which is the one the token
/// endpoint accepts for refreshes.
pub async fn exchange_chain(
    client: &AuthClient,
    code_verifier: &str,
    code: &str,
) -> Result<Tokens, AuthClientError> {
    let oauth = client.exchange_authorization_code(code_verifier, code).await?;
    let api = client.exchange_oauth_for_api_token(oauth.access_token()).await?;
    Ok(api.with_refresh_token(oauth.refresh_token().map(str::to_string)))
}
