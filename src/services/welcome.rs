use chrono::Utc;
use log::info;

use crate::services::store::{MailStore, Message, StoreError, INBOX};

const WELCOME_SENDER: &str = "welcome@mailgate";
const WELCOME_SUBJECT: &str = "Welcome to your encrypted mailbox";
const WELCOME_BODY: &str = "\
Hello,

Your account is ready. Everything you send and receive here is stored
encrypted; only your password unlocks it, so keep it safe.

Drafts, tags and search are available from the top bar. This message was
written to your inbox when your account was created and will not appear
again.

Happy mailing!
";

/// Write the fixed welcome message into a user's inbox.
///
/// Not idempotent on its own: the caller gates on the session's
/// fresh-account flag, after the user's services are registered, so the
/// mail lands exactly once in the store future requests will read.
pub async fn add_welcome_mail(mail_store: &dyn MailStore) -> Result<(), StoreError> {
    let message = Message {
        subject: WELCOME_SUBJECT.to_string(),
        sender: WELCOME_SENDER.to_string(),
        recipient: String::new(),
        body: WELCOME_BODY.to_string(),
        date: Utc::now(),
    };
    mail_store.add_message(INBOX, message).await?;
    info!("welcome mail seeded");
    Ok(())
}
