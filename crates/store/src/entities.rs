//! Durable conversation entities: one `User` per sender address, one or more
//! `Chat` threads per user, append-only `Message` turns per chat.

use chatline_common::Role;

/// One distinct sender address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub phone: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: i64,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            phone: r.phone,
            name: r.name,
            email: r.email,
            created_at: r.created_at,
        }
    }
}

/// One conversation thread owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
    pub user_id: i64,
    /// Public opaque correlation token, unique per chat.
    pub token: String,
    pub title: String,
    pub summary: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ChatRow {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub title: String,
    pub summary: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<ChatRow> for Chat {
    fn from(r: ChatRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            token: r.token,
            title: r.title,
            summary: r.summary,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// One turn in a chat history. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    /// Authoring user, absent for agent-authored turns.
    pub user_id: Option<i64>,
    pub role: Role,
    pub body: String,
    pub created_at: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub role: String,
    pub body: String,
    pub created_at: i64,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Self {
            id: r.id,
            chat_id: r.chat_id,
            user_id: r.user_id,
            role: Role::from_tag(&r.role),
            body: r.body,
            created_at: r.created_at,
        }
    }
}
