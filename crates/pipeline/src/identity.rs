//! Sender address → durable conversation identity.

use chatline_store::{Chat, Store, User};

use crate::error::{Error, Result};

/// The user and active chat an inbound event belongs to.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub chat: Chat,
}

/// Map a sender address to its user and active chat, creating both on first
/// contact. Pure composition of the store's find-or-create operations; the
/// only job here is sequencing (user before chat) and tagging whichever step
/// failed.
pub async fn resolve(store: &Store, address: &str) -> Result<Identity> {
    let user = store
        .find_or_create_user(address)
        .await
        .map_err(Error::Identity)?;
    let chat = store
        .find_or_create_chat(user.id)
        .await
        .map_err(Error::Identity)?;
    Ok(Identity { user, chat })
}
