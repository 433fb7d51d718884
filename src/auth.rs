//! Session establishment: credential-to-session exchange with a one-shot
//! retry when the provider reports a stale authentication token.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use thiserror::Error;

use crate::provider::{AuthContext, ProviderError, SessionProvider, UserSession};

/// Errors surfaced to the login handler.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authentication failed: {0}")]
    Failed(ProviderError),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredentials => AuthError::InvalidCredentials,
            // A second stale token lands here too: out of retry budget, it is
            // surfaced as a generic authentication failure.
            other => AuthError::Failed(other),
        }
    }
}

/// One creation attempt that failed, possibly after a session already existed.
struct FailedAttempt {
    session: Option<Arc<dyn UserSession>>,
    error: ProviderError,
}

/// Exchange credentials for a live session.
///
/// Creates a session and, when `initial_sync` is set, runs its initial sync.
/// If creation or sync fails with [`ProviderError::StaleAuthToken`], the
/// discarded session is closed and exactly one replacement attempt runs with
/// the same username/password pair. Any other failure, and any failure of
/// the replacement attempt, propagates unretried.
pub async fn authenticate_user(
    provider: &dyn SessionProvider,
    username: &str,
    password: &str,
    initial_sync: bool,
    auth: Option<&AuthContext>,
) -> Result<Arc<dyn UserSession>, AuthError> {
    match attempt(provider, username, password, initial_sync, auth).await {
        Ok(session) => Ok(session),
        Err(FailedAttempt {
            error: ProviderError::StaleAuthToken,
            session,
        }) => {
            info!("stale auth token for {}, recreating session", username);
            if let Some(stale) = session {
                force_close_session(stale.as_ref()).await;
            }
            match attempt(provider, username, password, initial_sync, auth).await {
                Ok(session) => Ok(session),
                Err(FailedAttempt { error, session }) => {
                    // No retry budget left; discard whatever the second
                    // attempt created before surfacing the failure.
                    if let Some(stale) = session {
                        force_close_session(stale.as_ref()).await;
                    }
                    Err(error.into())
                }
            }
        }
        Err(FailedAttempt { error, .. }) => Err(error.into()),
    }
}

async fn attempt(
    provider: &dyn SessionProvider,
    username: &str,
    password: &str,
    initial_sync: bool,
    auth: Option<&AuthContext>,
) -> Result<Arc<dyn UserSession>, FailedAttempt> {
    let started = Instant::now();
    let session = provider
        .open_session(username, password, auth)
        .await
        .map_err(|error| FailedAttempt {
            session: None,
            error,
        })?;
    debug!(
        "session created for {} in {}ms",
        username,
        started.elapsed().as_millis()
    );

    if initial_sync {
        if let Err(error) = session.initial_sync().await {
            return Err(FailedAttempt {
                session: Some(session),
                error,
            });
        }
    }
    Ok(session)
}

/// Close a discarded session. Close failures are logged and swallowed so
/// they never mask the failure that discarded the session.
async fn force_close_session(session: &dyn UserSession) {
    if let Err(err) = session.close().await {
        warn!(
            "failed to close discarded session for {}: {}",
            session.user_id(),
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use async_trait::async_trait;

    use crate::services::{MailStore, MemoryMailStore};

    struct ScriptedSession {
        user_id: String,
        sync_results: Mutex<VecDeque<Result<(), ProviderError>>>,
        sync_calls: AtomicUsize,
        close_calls: AtomicUsize,
        close_fails: bool,
    }

    impl ScriptedSession {
        fn new(sync_results: Vec<Result<(), ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                user_id: "u-1".to_string(),
                sync_results: Mutex::new(sync_results.into()),
                sync_calls: AtomicUsize::new(0),
                close_calls: AtomicUsize::new(0),
                close_fails: false,
            })
        }

        fn with_failing_close(sync_results: Vec<Result<(), ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                user_id: "u-1".to_string(),
                sync_results: Mutex::new(sync_results.into()),
                sync_calls: AtomicUsize::new(0),
                close_calls: AtomicUsize::new(0),
                close_fails: true,
            })
        }
    }

    #[async_trait]
    impl UserSession for ScriptedSession {
        fn user_id(&self) -> &str {
            &self.user_id
        }

        fn fresh_account(&self) -> bool {
            false
        }

        fn mail_store(&self) -> Arc<dyn MailStore> {
            Arc::new(MemoryMailStore::new())
        }

        async fn initial_sync(&self) -> Result<(), ProviderError> {
            self.sync_calls.fetch_add(1, Ordering::SeqCst);
            self.sync_results
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn close(&self) -> Result<(), ProviderError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            if self.close_fails {
                return Err(ProviderError::Other("close refused".to_string()));
            }
            Ok(())
        }
    }

    struct ScriptedProvider {
        sessions: Mutex<VecDeque<Result<Arc<ScriptedSession>, ProviderError>>>,
        open_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(sessions: Vec<Result<Arc<ScriptedSession>, ProviderError>>) -> Self {
            Self {
                sessions: Mutex::new(sessions.into()),
                open_calls: AtomicUsize::new(0),
            }
        }

        fn open_calls(&self) -> usize {
            self.open_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionProvider for ScriptedProvider {
        async fn open_session(
            &self,
            _username: &str,
            _password: &str,
            _auth: Option<&AuthContext>,
        ) -> Result<Arc<dyn UserSession>, ProviderError> {
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            match self.sessions.lock().await.pop_front() {
                Some(Ok(session)) => Ok(session as Arc<dyn UserSession>),
                Some(Err(err)) => Err(err),
                None => Err(ProviderError::Other("no scripted session".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn success_needs_one_create_and_one_sync() {
        let session = ScriptedSession::new(vec![Ok(())]);
        let provider = ScriptedProvider::new(vec![Ok(session.clone())]);

        let result = authenticate_user(&provider, "alice", "correct", true, None).await;
        assert!(result.is_ok());
        assert_eq!(provider.open_calls(), 1);
        assert_eq!(session.sync_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.close_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sync_is_skipped_when_not_requested() {
        let session = ScriptedSession::new(vec![Err(ProviderError::StaleAuthToken)]);
        let provider = ScriptedProvider::new(vec![Ok(session.clone())]);

        authenticate_user(&provider, "alice", "correct", false, None)
            .await
            .unwrap();
        assert_eq!(session.sync_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_sync_retries_exactly_once() {
        let stale = ScriptedSession::new(vec![Err(ProviderError::StaleAuthToken)]);
        let replacement = ScriptedSession::new(vec![Ok(())]);
        let provider =
            ScriptedProvider::new(vec![Ok(stale.clone()), Ok(replacement.clone())]);

        let session = authenticate_user(&provider, "alice", "correct", true, None)
            .await
            .unwrap();
        assert_eq!(provider.open_calls(), 2);
        assert_eq!(stale.close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(replacement.sync_calls.load(Ordering::SeqCst), 1);
        // callers never observe the discarded session
        let replacement_dyn: Arc<dyn UserSession> = replacement;
        assert!(Arc::ptr_eq(&session, &replacement_dyn));
    }

    #[tokio::test]
    async fn second_stale_token_is_not_retried_again() {
        let first = ScriptedSession::new(vec![Err(ProviderError::StaleAuthToken)]);
        let second = ScriptedSession::new(vec![Err(ProviderError::StaleAuthToken)]);
        let provider = ScriptedProvider::new(vec![Ok(first), Ok(second.clone())]);

        let err = authenticate_user(&provider, "alice", "correct", true, None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Failed(ProviderError::StaleAuthToken)));
        assert_eq!(provider.open_calls(), 2);
        assert_eq!(second.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_create_consumes_the_retry_budget_too() {
        let replacement = ScriptedSession::new(vec![Ok(())]);
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::StaleAuthToken),
            Ok(replacement.clone()),
        ]);

        authenticate_user(&provider, "alice", "correct", true, None)
            .await
            .unwrap();
        assert_eq!(provider.open_calls(), 2);
        assert_eq!(replacement.sync_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_credentials_are_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::InvalidCredentials)]);

        let err = authenticate_user(&provider, "alice", "wrong", true, None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(provider.open_calls(), 1);
    }

    #[tokio::test]
    async fn non_auth_sync_failure_propagates_unretried() {
        let session =
            ScriptedSession::new(vec![Err(ProviderError::Other("sync exploded".to_string()))]);
        let provider = ScriptedProvider::new(vec![Ok(session)]);

        let err = authenticate_user(&provider, "alice", "correct", true, None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::Failed(ProviderError::Other(_))));
        assert_eq!(provider.open_calls(), 1);
    }

    #[tokio::test]
    async fn close_failure_never_masks_the_retry_outcome() {
        let stale = ScriptedSession::with_failing_close(vec![Err(ProviderError::StaleAuthToken)]);
        let replacement = ScriptedSession::new(vec![Ok(())]);
        let provider = ScriptedProvider::new(vec![Ok(stale.clone()), Ok(replacement)]);

        let result = authenticate_user(&provider, "alice", "correct", true, None).await;
        assert!(result.is_ok());
        assert_eq!(stale.close_calls.load(Ordering::SeqCst), 1);
    }
}
