use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedbox_shared::Message;
use sqlx::types::Json;
use uuid::Uuid;

use super::{DbPool, Registration, UserRecord, UserStore};

const USER_COLUMNS: &str = r#"
    id, username, email, password_hash, is_verified, verify_code,
    verify_code_expiry, is_accepting_messages, messages, created_at
"#;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    is_verified: bool,
    verify_code: Option<String>,
    verify_code_expiry: Option<DateTime<Utc>>,
    is_accepting_messages: bool,
    messages: Json<Vec<Message>>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            is_verified: row.is_verified,
            verify_code: row.verify_code,
            verify_code_expiry: row.verify_code_expiry,
            is_accepting_messages: row.is_accepting_messages,
            messages: row.messages.0,
            created_at: row.created_at,
        }
    }
}

/// Postgres-backed store. Messages live in a JSONB array on the user row,
/// so each append or removal is a single-row update.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    db: DbPool,
}

impl PgUserStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create the users table if it is missing. Safe to run on every start.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_verified BOOLEAN NOT NULL DEFAULT FALSE,
                verify_code TEXT,
                verify_code_expiry TIMESTAMPTZ,
                is_accepting_messages BOOLEAN NOT NULL DEFAULT TRUE,
                messages JSONB NOT NULL DEFAULT '[]'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.db)
        .await
        .context("creating users table")?;

        // Only verified accounts claim a username
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS users_verified_username
            ON users (username) WHERE is_verified
            "#,
        )
        .execute(&self.db)
        .await
        .context("creating verified username index")?;

        Ok(())
    }

    async fn fetch_one_where(
        &self,
        predicate: &str,
        value: &str,
    ) -> anyhow::Result<Option<UserRecord>> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} ORDER BY is_verified DESC, created_at ASC LIMIT 1",
            USER_COLUMNS, predicate
        );

        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(UserRecord::from))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<UserRecord>> {
        self.fetch_one_where("username = $1", username).await
    }

    async fn find_verified_by_username(
        &self,
        username: &str,
    ) -> anyhow::Result<Option<UserRecord>> {
        self.fetch_one_where("username = $1 AND is_verified", username)
            .await
    }

    async fn find_pending_by_username_and_code(
        &self,
        username: &str,
        code: &str,
    ) -> anyhow::Result<Option<UserRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM users
            WHERE username = $1 AND verify_code = $2 AND NOT is_verified
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            USER_COLUMNS
        );

        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(username)
            .bind(code)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        self.fetch_one_where("email = $1", email).await
    }

    async fn insert_user(&self, user: &UserRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, is_verified, verify_code,
                verify_code_expiry, is_accepting_messages, messages, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(&user.verify_code)
        .bind(user.verify_code_expiry)
        .bind(user.is_accepting_messages)
        .bind(Json(&user.messages))
        .bind(user.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn update_registration(
        &self,
        id: Uuid,
        registration: &Registration,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3, verify_code = $4, verify_code_expiry = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&registration.username)
        .bind(&registration.password_hash)
        .bind(&registration.verify_code)
        .bind(registration.verify_code_expiry)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, verify_code = NULL, verify_code_expiry = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_accepting_messages(
        &self,
        id: Uuid,
        accepting: bool,
    ) -> anyhow::Result<Option<UserRecord>> {
        let sql = format!(
            "UPDATE users SET is_accepting_messages = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(accepting)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn append_message(&self, id: Uuid, message: &Message) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET messages = messages || $2
            WHERE id = $1 AND is_accepting_messages
            "#,
        )
        .bind(id)
        .bind(Json([message]))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_message(&self, user_id: Uuid, message_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET messages = COALESCE(
                (
                    SELECT jsonb_agg(m ORDER BY i)
                    FROM jsonb_array_elements(messages) WITH ORDINALITY AS t(m, i)
                    WHERE m->>'id' <> $2
                ),
                '[]'::jsonb
            )
            WHERE id = $1 AND messages @> jsonb_build_array(jsonb_build_object('id', $2))
            "#,
        )
        .bind(user_id)
        .bind(message_id.to_string())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
