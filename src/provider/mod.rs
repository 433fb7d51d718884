//! Boundary to the external crypto/sync library that issues authenticated
//! mail sessions. mailgate consumes these as opaque capabilities; the only
//! concrete implementation shipped here is the in-memory [`dev::DevProvider`]
//! used for local runs and tests.

pub mod dev;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::services::MailStore;

/// Failures reported by the session provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The username/password pair was rejected outright. Never retried.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The session's authentication token is no longer valid. Recoverable
    /// by re-authenticating; the orchestrator retries exactly once.
    #[error("stale authentication token")]
    StaleAuthToken,
    #[error("provider error: {0}")]
    Other(String),
}

/// Pre-resolved authentication info passed through to the provider.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

/// Opens authenticated sessions against one configured provider.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open_session(
        &self,
        username: &str,
        password: &str,
        auth: Option<&AuthContext>,
    ) -> Result<Arc<dyn UserSession>, ProviderError>;
}

/// An authenticated, provider-issued handle onto one user's mail store.
#[async_trait]
pub trait UserSession: Send + Sync {
    /// Stable account identifier.
    fn user_id(&self) -> &str;

    /// True only on the account's very first successful session creation.
    fn fresh_account(&self) -> bool;

    /// Handle to the session's mail store; per-user services derive from it.
    fn mail_store(&self) -> Arc<dyn MailStore>;

    async fn initial_sync(&self) -> Result<(), ProviderError>;

    async fn close(&self) -> Result<(), ProviderError>;
}
