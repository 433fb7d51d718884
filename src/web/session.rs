use actix_web::cookie::Cookie;
use actix_web::HttpRequest;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use uuid::Uuid;

/// Name of the browser-session cookie.
pub const SESSION_COOKIE: &str = "mailgate-session";

#[derive(Debug, Clone)]
pub struct HttpSessionData {
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Server-side store of browser sessions.
///
/// A session carries at most one bound user id. Binding is an idempotent
/// overwrite; re-login as someone else under the same browser session
/// simply rebinds.
#[derive(Default)]
pub struct HttpSessionStore {
    sessions: DashMap<Uuid, HttpSessionData>,
}

impl HttpSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            HttpSessionData {
                user_id: None,
                created_at: Utc::now(),
            },
        );
        debug!("created http session {}", id);
        id
    }

    /// Session id from the request cookie, when it names a live session.
    pub fn resolve(&self, req: &HttpRequest) -> Option<Uuid> {
        let cookie = req.cookie(SESSION_COOKIE)?;
        let id = Uuid::parse_str(cookie.value()).ok()?;
        self.sessions.contains_key(&id).then_some(id)
    }

    pub fn bound_user(&self, id: Uuid) -> Option<String> {
        self.sessions.get(&id).and_then(|data| data.user_id.clone())
    }

    /// Attach a user id to a browser session.
    pub fn bind(&self, id: Uuid, user_id: &str) {
        match self.sessions.get_mut(&id) {
            Some(mut data) => {
                if let Some(previous) = data.user_id.as_deref() {
                    if previous != user_id {
                        info!("rebinding http session {} from {} to {}", id, previous, user_id);
                    }
                }
                data.user_id = Some(user_id.to_string());
            }
            // The browser session expired between the early response and
            // the end of bootstrap; the next request logs in again.
            None => warn!("cannot bind {} to expired http session {}", user_id, id),
        }
    }

    pub fn destroy(&self, id: Uuid) {
        if self.sessions.remove(&id).is_some() {
            debug!("destroyed http session {}", id);
        }
    }

    pub fn cookie_for(id: Uuid) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, id.to_string())
            .path("/")
            .http_only(true)
            .finish()
    }
}
