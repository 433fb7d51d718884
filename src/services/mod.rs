//! Per-user services derived from an authenticated session, and the
//! process-wide registry that creates them at most once per user.

pub mod bundle;
pub mod registry;
pub mod store;
pub mod welcome;

pub use bundle::{DraftService, SearchEngine, ServiceBundle, TagService};
pub use registry::{RegistryError, ServicesRegistry};
pub use store::{MailStore, MemoryMailStore, Message, StoreError, DRAFTS, INBOX};
pub use welcome::add_welcome_mail;
