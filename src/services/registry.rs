use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::provider::UserSession;
use crate::services::bundle::ServiceBundle;
use crate::services::store::StoreError;

/// Errors raised while bootstrapping a user's services.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to build service bundle: {0}")]
    Bundle(#[from] StoreError),
}

/// Process-wide map from user id to that user's [`ServiceBundle`].
///
/// The registry is the only shared mutable state of the login pipeline.
/// Bundle creation is at-most-once per user id even under concurrent logins
/// for the same account; creation for distinct user ids never contends.
#[derive(Default)]
pub struct ServicesRegistry {
    bundles: DashMap<String, Arc<ServiceBundle>>,
    logins: DashMap<String, String>,
    creation_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ServicesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_services(&self, user_id: &str) -> bool {
        self.bundles.contains_key(user_id)
    }

    pub fn services_for(&self, user_id: &str) -> Option<Arc<ServiceBundle>> {
        self.bundles.get(user_id).map(|entry| Arc::clone(&entry))
    }

    /// Record a login-name alias for a user id so later requests can resolve
    /// services by the name the user typed.
    pub fn map_login(&self, login: &str, user_id: &str) {
        self.logins.insert(login.to_string(), user_id.to_string());
    }

    pub fn user_id_for_login(&self, login: &str) -> Option<String> {
        self.logins.get(login).map(|entry| entry.clone())
    }

    /// Make sure a service bundle exists for `user_id`, building one from
    /// `session` when missing. Returns `true` when this call created the
    /// bundle. A construction failure inserts nothing, so the next login
    /// for the user re-attempts the bootstrap.
    pub async fn ensure(
        &self,
        user_id: &str,
        session: Arc<dyn UserSession>,
    ) -> Result<bool, RegistryError> {
        if self.has_services(user_id) {
            return Ok(false);
        }

        // Per-user creation lock: same-user callers serialize here while
        // other users proceed on their own keys.
        let lock = self
            .creation_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if self.has_services(user_id) {
            debug!("services for {} appeared while waiting, nothing to do", user_id);
            return Ok(false);
        }

        let bundle = ServiceBundle::from_session(session).await?;
        self.bundles.insert(user_id.to_string(), Arc::new(bundle));
        info!("registered services for {}", user_id);
        Ok(true)
    }

    /// Tear down a user's services, closing the owned session. Required
    /// before a new bundle may be created for the same user id.
    pub async fn evict(&self, user_id: &str) {
        let Some((_, bundle)) = self.bundles.remove(user_id) else {
            return;
        };
        self.logins.retain(|_, mapped| mapped != user_id);
        self.creation_locks.remove(user_id);
        if let Err(err) = bundle.session().close().await {
            warn!("failed to close session while evicting {}: {}", user_id, err);
        }
        info!("evicted services for {}", user_id);
    }
}
