use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;
use tokio::sync::RwLock;

use crate::provider::UserSession;
use crate::services::store::{MailStore, Message, StoreError, DRAFTS, INBOX};

/// Per-user tag handling, backed by the session's mail store.
pub struct TagService {
    mail_store: Arc<dyn MailStore>,
    tags: RwLock<BTreeSet<String>>,
}

impl TagService {
    const DEFAULT_TAGS: [&'static str; 4] = ["inbox", "sent", "trash", "drafts"];

    pub fn new(mail_store: Arc<dyn MailStore>) -> Self {
        let tags = Self::DEFAULT_TAGS.iter().map(|t| t.to_string()).collect();
        Self {
            mail_store,
            tags: RwLock::new(tags),
        }
    }

    pub async fn add_tag(&self, tag: &str) {
        self.tags.write().await.insert(tag.to_lowercase());
    }

    pub async fn tags(&self) -> Vec<String> {
        self.tags.read().await.iter().cloned().collect()
    }

    pub fn mail_store(&self) -> &Arc<dyn MailStore> {
        &self.mail_store
    }
}

/// Searches the user's mailbox. The real index engine lives behind the mail
/// store boundary; this handle scans folders on demand.
pub struct SearchEngine {
    mail_store: Arc<dyn MailStore>,
}

impl SearchEngine {
    /// Builds the engine and warms it against the inbox. Fails when the
    /// store is unreadable, which aborts bundle construction.
    pub async fn build(mail_store: Arc<dyn MailStore>) -> Result<Self, StoreError> {
        let indexed = mail_store.messages(INBOX).await?.len();
        debug!("search engine ready, {} message(s) indexed", indexed);
        Ok(Self { mail_store })
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Message>, StoreError> {
        let term = term.to_lowercase();
        let matches = self
            .mail_store
            .messages(INBOX)
            .await?
            .into_iter()
            .filter(|message| {
                message.subject.to_lowercase().contains(&term)
                    || message.body.to_lowercase().contains(&term)
            })
            .collect();
        Ok(matches)
    }
}

/// Draft storage for one user.
pub struct DraftService {
    mail_store: Arc<dyn MailStore>,
}

impl DraftService {
    pub fn new(mail_store: Arc<dyn MailStore>) -> Self {
        Self { mail_store }
    }

    pub async fn save_draft(&self, draft: Message) -> Result<(), StoreError> {
        self.mail_store.add_message(DRAFTS, draft).await
    }

    pub async fn drafts(&self) -> Result<Vec<Message>, StoreError> {
        self.mail_store.messages(DRAFTS).await
    }
}

/// The per-user service objects derived from one authenticated session.
///
/// Built at most once per user id; the registry owns it, and through it the
/// session, for the process lifetime of that user's login.
pub struct ServiceBundle {
    session: Arc<dyn UserSession>,
    pub mail_store: Arc<dyn MailStore>,
    pub tag_service: TagService,
    pub search_engine: SearchEngine,
    pub draft_service: DraftService,
}

impl ServiceBundle {
    pub async fn from_session(session: Arc<dyn UserSession>) -> Result<Self, StoreError> {
        let mail_store = session.mail_store();
        let tag_service = TagService::new(Arc::clone(&mail_store));
        let search_engine = SearchEngine::build(Arc::clone(&mail_store)).await?;
        let draft_service = DraftService::new(Arc::clone(&mail_store));
        Ok(Self {
            session,
            mail_store,
            tag_service,
            search_engine,
            draft_service,
        })
    }

    pub fn session(&self) -> &Arc<dyn UserSession> {
        &self.session
    }
}
