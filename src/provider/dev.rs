//! In-memory session provider for local development and the test suite.
//!
//! Accounts come from the `accounts` section of the settings file. Sessions
//! honour the same contract as a real provider: the first successful open
//! for an account is the fresh one, and a scripted number of stale-token
//! sync failures can be injected per username to exercise the retry path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info};

use crate::config::{DevAccount, Settings};
use crate::provider::{AuthContext, ProviderError, SessionProvider, UserSession};
use crate::services::{MailStore, MemoryMailStore};

pub struct DevProvider {
    hostname: String,
    accounts: HashMap<String, DevAccount>,
    /// One store per account, shared across that account's sessions.
    stores: DashMap<String, Arc<MemoryMailStore>>,
    /// User ids that have had at least one session.
    seen: DashMap<String, ()>,
    /// Remaining injected stale-token sync failures, keyed by username.
    failing_syncs: DashMap<String, usize>,
    open_calls: AtomicUsize,
}

impl DevProvider {
    pub fn new(hostname: &str, accounts: Vec<DevAccount>) -> Self {
        let accounts: HashMap<String, DevAccount> = accounts
            .into_iter()
            .map(|account| (account.username.clone(), account))
            .collect();
        info!(
            "dev provider for {} serving {} account(s)",
            hostname,
            accounts.len()
        );
        Self {
            hostname: hostname.to_string(),
            accounts,
            stores: DashMap::new(),
            seen: DashMap::new(),
            failing_syncs: DashMap::new(),
            open_calls: AtomicUsize::new(0),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.provider.hostname, settings.accounts.clone())
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Total `open_session` calls, successful or not.
    pub fn open_count(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Make the next session opened for `username` fail its first sync
    /// with a stale auth token.
    pub fn fail_next_sync(&self, username: &str) {
        *self.failing_syncs.entry(username.to_string()).or_insert(0) += 1;
    }

    /// Mail store for an account, if any session was ever opened for it.
    pub fn store_for(&self, user_id: &str) -> Option<Arc<MemoryMailStore>> {
        self.stores.get(user_id).map(|entry| Arc::clone(&entry))
    }

    fn take_sync_failure(&self, username: &str) -> bool {
        match self.failing_syncs.get_mut(username) {
            Some(mut remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl SessionProvider for DevProvider {
    async fn open_session(
        &self,
        username: &str,
        password: &str,
        _auth: Option<&AuthContext>,
    ) -> Result<Arc<dyn UserSession>, ProviderError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let account = self
            .accounts
            .get(username)
            .filter(|account| account.password == password)
            .ok_or(ProviderError::InvalidCredentials)?;

        let store = self
            .stores
            .entry(account.user_id.clone())
            .or_insert_with(|| Arc::new(MemoryMailStore::new()))
            .clone();
        let fresh = self.seen.insert(account.user_id.clone(), ()).is_none();
        let stale_sync = self.take_sync_failure(username);

        debug!("opened dev session for {} (fresh: {})", account.user_id, fresh);
        Ok(Arc::new(DevSession {
            user_id: account.user_id.clone(),
            fresh,
            store,
            stale_sync: AtomicBool::new(stale_sync),
        }))
    }
}

struct DevSession {
    user_id: String,
    fresh: bool,
    store: Arc<MemoryMailStore>,
    stale_sync: AtomicBool,
}

#[async_trait]
impl UserSession for DevSession {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn fresh_account(&self) -> bool {
        self.fresh
    }

    fn mail_store(&self) -> Arc<dyn MailStore> {
        Arc::clone(&self.store) as Arc<dyn MailStore>
    }

    async fn initial_sync(&self) -> Result<(), ProviderError> {
        if self.stale_sync.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::StaleAuthToken);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ProviderError> {
        debug!("closed dev session for {}", self.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Message;

    fn provider() -> DevProvider {
        DevProvider::new(
            "dev.example.org",
            vec![DevAccount {
                username: "alice".to_string(),
                password: "correct".to_string(),
                user_id: "u-1".to_string(),
            }],
        )
    }

    #[tokio::test]
    async fn first_session_is_fresh_later_ones_are_not() {
        let provider = provider();
        let first = provider.open_session("alice", "correct", None).await.unwrap();
        let second = provider.open_session("alice", "correct", None).await.unwrap();
        assert!(first.fresh_account());
        assert!(!second.fresh_account());
        assert_eq!(provider.open_count(), 2);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let provider = provider();
        let err = provider
            .open_session("alice", "wrong", None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::InvalidCredentials));
    }

    #[tokio::test]
    async fn injected_sync_failure_hits_only_the_next_session() {
        let provider = provider();
        provider.fail_next_sync("alice");

        let first = provider.open_session("alice", "correct", None).await.unwrap();
        assert!(matches!(
            first.initial_sync().await,
            Err(ProviderError::StaleAuthToken)
        ));
        // second sync on the same session succeeds
        first.initial_sync().await.unwrap();

        let second = provider.open_session("alice", "correct", None).await.unwrap();
        second.initial_sync().await.unwrap();
    }

    #[tokio::test]
    async fn sessions_for_one_account_share_a_store() {
        let provider = provider();
        let session = provider.open_session("alice", "correct", None).await.unwrap();
        session
            .mail_store()
            .add_message(
                crate::services::INBOX,
                Message {
                    subject: "hello".to_string(),
                    sender: "x@example.org".to_string(),
                    recipient: "alice@example.org".to_string(),
                    body: "hi".to_string(),
                    date: chrono::Utc::now(),
                },
            )
            .await
            .unwrap();

        let store = provider.store_for("u-1").unwrap();
        assert_eq!(store.messages(crate::services::INBOX).await.unwrap().len(), 1);
    }
}
