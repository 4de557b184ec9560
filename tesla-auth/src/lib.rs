// Common types shared by the login protocol and the session
pub mod common;

// Login protocol and session (public API)
pub mod client;
mod error;

pub use client::{
    AuthClient, AuthClientError, LoginStrategy, PkceChallenge, Session, Settings,
};
pub use common::Tokens;
pub use error::AuthError;
