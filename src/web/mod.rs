//! HTTP surface: login/logout handlers, browser-session store and routes.

pub mod login;
pub mod pages;
pub mod routes;
pub mod session;

use std::sync::Arc;

use crate::config::Settings;
use crate::provider::SessionProvider;
use crate::services::ServicesRegistry;
use crate::web::session::HttpSessionStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub provider: Arc<dyn SessionProvider>,
    pub registry: Arc<ServicesRegistry>,
    pub sessions: Arc<HttpSessionStore>,
}
