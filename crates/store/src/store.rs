use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    tracing::debug,
    uuid::Uuid,
};

use chatline_common::Role;

use crate::{
    entities::{Chat, ChatRow, Message, MessageRow, User, UserRow},
    error::{Error, Result},
};

/// Title given to a chat created by the pipeline.
const DEFAULT_CHAT_TITLE: &str = "New Chat";
/// Summary given to a chat created by the pipeline.
const DEFAULT_CHAT_SUMMARY: &str = "Chat started";

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Placeholder display name derived from the sender address.
fn default_user_name(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let tail = &digits[digits.len().saturating_sub(4)..];
    if tail.is_empty() {
        "WhatsApp user".to_string()
    } else {
        format!("WhatsApp user {tail}")
    }
}

/// SQLite-backed conversation store. Cheap to clone; all clones share the pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database file and run pending migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store for tests. A single connection keeps the database
    /// alive for the pool's lifetime.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool (the caller is responsible for migrations).
    #[must_use]
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ── Users ────────────────────────────────────────────────────────────────

    /// Look up a user by sender address, creating one on first contact.
    ///
    /// Race-safe under concurrent calls for the same address: the insert is a
    /// blind `ON CONFLICT DO NOTHING` against the unique phone column, so a
    /// lost race degrades into the following lookup instead of an error.
    pub async fn find_or_create_user(&self, phone: &str) -> Result<User> {
        sqlx::query(
            "INSERT INTO users (phone, name, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(phone)
        .bind(default_user_name(phone))
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, phone, name, email, created_at FROM users WHERE phone = ?",
        )
        .bind(phone)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Paginated user listing, newest first. Pages are 1-based.
    pub async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<User>> {
        let offset = page.saturating_sub(1) * per_page;
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, phone, name, email, created_at FROM users \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ── Chats ────────────────────────────────────────────────────────────────

    /// Return the user's active chat: the first chat by creation order,
    /// created with defaults when the user has none.
    ///
    /// Race-safe under concurrent calls for the same user: the insert carries
    /// its own NOT EXISTS predicate, evaluated in the same statement, so two
    /// first-contact events never create two chats.
    pub async fn find_or_create_chat(&self, user_id: i64) -> Result<Chat> {
        let now = now_ms();
        let inserted = sqlx::query(
            "INSERT INTO chats (user_id, token, title, summary, created_at, updated_at) \
             SELECT ?, ?, ?, ?, ?, ? \
             WHERE NOT EXISTS (SELECT 1 FROM chats WHERE user_id = ?)",
        )
        .bind(user_id)
        .bind(Uuid::new_v4().to_string())
        .bind(DEFAULT_CHAT_TITLE)
        .bind(DEFAULT_CHAT_SUMMARY)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            debug!(user_id, "created chat");
        }

        self.first_chat(user_id)
            .await?
            .ok_or(Error::not_found("chat for user", user_id))
    }

    async fn first_chat(&self, user_id: i64) -> Result<Option<Chat>> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, token, title, summary, created_at, updated_at \
             FROM chats WHERE user_id = ? ORDER BY created_at, id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Look up a chat by its public correlation token.
    pub async fn chat_by_token(&self, token: &str) -> Result<Option<Chat>> {
        let row = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, token, title, summary, created_at, updated_at \
             FROM chats WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// Paginated chat listing, most recently updated first. Pages are 1-based.
    pub async fn list_chats(&self, page: u32, per_page: u32) -> Result<Vec<Chat>> {
        let offset = page.saturating_sub(1) * per_page;
        let rows = sqlx::query_as::<_, ChatRow>(
            "SELECT id, user_id, token, title, summary, created_at, updated_at \
             FROM chats ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ── Messages ─────────────────────────────────────────────────────────────

    /// Append one turn to a chat and touch the chat's update timestamp.
    ///
    /// Fails with [`Error::EmptyBody`] before writing anything when the body
    /// is empty or whitespace-only.
    pub async fn append_message(
        &self,
        chat_id: i64,
        author: Option<i64>,
        body: &str,
        role: Role,
    ) -> Result<Message> {
        if body.trim().is_empty() {
            return Err(Error::EmptyBody);
        }

        let now = now_ms();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO messages (chat_id, user_id, role, body, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(author)
        .bind(role.as_str())
        .bind(body)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let id = result.last_insert_rowid();
        Ok(Message {
            id,
            chat_id,
            user_id: author,
            role,
            body: body.to_string(),
            created_at: now,
        })
    }

    /// The newest `limit` turns of a chat, returned oldest first.
    ///
    /// Single snapshot read; ties on the millisecond timestamp are broken by
    /// insert order.
    pub async fn history(&self, chat_id: i64, limit: u32) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, chat_id, user_id, role, body, created_at \
             FROM messages WHERE chat_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(chat_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<Message> = rows.into_iter().map(Into::into).collect();
        messages.reverse();
        Ok(messages)
    }

    /// Number of turns in a chat.
    pub async fn message_count(&self, chat_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ── Duplicate-delivery guard ─────────────────────────────────────────────

    /// Record a provider message id. Returns `false` when the id was already
    /// recorded, meaning this delivery is a duplicate and must be skipped.
    pub async fn mark_event_processed(&self, provider_message_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO processed_events (provider_message_id, seen_at) \
             VALUES (?, ?)",
        )
        .bind(provider_message_id)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
