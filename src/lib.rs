//! Library core for mailgate.
//!
//! mailgate is the front door of a multi-tenant encrypted-webmail service:
//! it exchanges a username/password submission for a live provider session,
//! bootstraps the per-user services backing that session exactly once per
//! user, and binds the result to the caller's HTTP session.

// --- Modules ---
pub mod auth;
pub mod config;
pub mod provider;
pub mod services;
pub mod web;

// Re-export key types for convenience
pub mod prelude {
    // Config
    pub use crate::config::Settings;

    // Provider boundary
    pub use crate::provider::{AuthContext, ProviderError, SessionProvider, UserSession};

    // Session establishment
    pub use crate::auth::{authenticate_user, AuthError};

    // Per-user services
    pub use crate::services::{MailStore, Message, ServiceBundle, ServicesRegistry};

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
    pub use std::sync::Arc;
    pub use thiserror::Error;
    pub use uuid::Uuid;
}
