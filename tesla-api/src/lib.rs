pub mod endpoints;
mod error;
mod macros;
pub mod repositories;
pub mod wake;

pub use crate::error::{ErrorDetail, TeslaApiError};
pub use crate::wake::{WakeOutcome, WakeTarget, wake_and_confirm};
use repositories::*;
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

pub const BASE_URL: &str = "https://owner-api.teslamotors.com/api/1";

/// Owner-API client bound to a single bearer token.
pub struct Client {
    inner: ApiClient,
}

impl Client {
    pub fn new(access_token: &str) -> Self {
        Self::with_base_url(BASE_URL, access_token)
    }

    /// `base_url` includes the `/api/1` version prefix.
    pub fn with_base_url(base_url: &str, access_token: &str) -> Self {
        Self {
            inner: ApiClient::new(base_url).bearer_auth(access_token),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, TeslaApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }
}

pub struct Request;

impl Request {
    pub fn vehicles() -> VehicleRepository {
        VehicleRepository::new()
    }
}
