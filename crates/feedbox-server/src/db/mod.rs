mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedbox_shared::{Message, User};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::AppError;

pub type DbPool = PgPool;

static POOL: OnceCell<DbPool> = OnceCell::const_new();

/// Process-wide connection pool.
///
/// The first caller connects; concurrent callers wait on that attempt and
/// every later call returns the same pool. A failed attempt leaves the cell
/// empty so the next call retries. The pool lives until the process exits.
pub async fn pool(database_url: &str) -> anyhow::Result<&'static DbPool> {
    POOL.get_or_try_init(|| async {
        tracing::info!("Opening database connection pool");
        PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
    })
    .await
    .map_err(Into::into)
}

/// Full account record as persisted, messages embedded.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub verify_code: Option<String>,
    pub verify_code_expiry: Option<DateTime<Utc>>,
    pub is_accepting_messages: bool,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// A fresh, unverified account that accepts messages and has none yet.
    pub fn new(
        username: &str,
        email: &str,
        password_hash: String,
        verify_code: String,
        verify_code_expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            is_verified: false,
            verify_code: Some(verify_code),
            verify_code_expiry: Some(verify_code_expiry),
            is_accepting_messages: true,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Check a submitted verification code against the stored one.
    ///
    /// A matching code past its expiry is `CodeExpired`; any mismatch is
    /// `InvalidCode` regardless of expiry. Once verified the code is cleared,
    /// so every later attempt is `InvalidCode`.
    pub fn check_verify_code(&self, code: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let matches = self.verify_code.as_deref() == Some(code);
        let unexpired = self.verify_code_expiry.is_some_and(|expiry| expiry > now);

        match (matches, unexpired) {
            (true, true) => Ok(()),
            (true, false) => Err(AppError::CodeExpired),
            (false, _) => Err(AppError::InvalidCode),
        }
    }

    pub fn to_view(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_verified: self.is_verified,
            is_accepting_messages: self.is_accepting_messages,
            created_at: self.created_at,
        }
    }
}

/// Fresh credentials and code for an unverified account signing up again.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password_hash: String,
    pub verify_code: String,
    pub verify_code_expiry: DateTime<Utc>,
}

/// Access to the user collection.
///
/// Every mutating method is a single-record write; appends and removals on
/// the message sequence are atomic per record.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>>;

    /// Any account bound to `username`, verified accounts first.
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<UserRecord>>;

    async fn find_verified_by_username(&self, username: &str)
        -> anyhow::Result<Option<UserRecord>>;

    /// The newest unverified account with this username whose pending code
    /// equals `code`, expired or not.
    async fn find_pending_by_username_and_code(
        &self,
        username: &str,
        code: &str,
    ) -> anyhow::Result<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;

    async fn insert_user(&self, user: &UserRecord) -> anyhow::Result<()>;

    async fn update_registration(&self, id: Uuid, registration: &Registration)
        -> anyhow::Result<()>;

    /// Mark verified and clear the code. Returns false if the id is unknown.
    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn set_accepting_messages(&self, id: Uuid, accepting: bool)
        -> anyhow::Result<Option<UserRecord>>;

    /// Append only if the user still accepts messages at write time.
    /// Returns false when the user is missing or not accepting.
    async fn append_message(&self, id: Uuid, message: &Message) -> anyhow::Result<bool>;

    /// Returns false if the message is not in that user's sequence.
    async fn remove_message(&self, user_id: Uuid, message_id: Uuid) -> anyhow::Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending(code: &str, issued: DateTime<Utc>) -> UserRecord {
        UserRecord::new(
            "alice",
            "alice@example.com",
            "hash".to_string(),
            code.to_string(),
            issued + Duration::minutes(10),
        )
    }

    #[test]
    fn correct_code_within_window_passes() {
        let issued = Utc::now();
        let user = pending("123456", issued);

        assert!(user
            .check_verify_code("123456", issued + Duration::minutes(5))
            .is_ok());
    }

    #[test]
    fn correct_code_after_expiry_is_expired() {
        let issued = Utc::now();
        let user = pending("123456", issued);

        assert!(matches!(
            user.check_verify_code("123456", issued + Duration::minutes(15)),
            Err(AppError::CodeExpired)
        ));
    }

    #[test]
    fn wrong_code_is_invalid_whether_or_not_expired() {
        let issued = Utc::now();
        let user = pending("123456", issued);

        for minutes in [5, 15] {
            assert!(matches!(
                user.check_verify_code("654321", issued + Duration::minutes(minutes)),
                Err(AppError::InvalidCode)
            ));
        }
    }

    #[test]
    fn cleared_code_never_matches() {
        let issued = Utc::now();
        let mut user = pending("123456", issued);
        user.is_verified = true;
        user.verify_code = None;
        user.verify_code_expiry = None;

        assert!(matches!(
            user.check_verify_code("123456", issued + Duration::minutes(1)),
            Err(AppError::InvalidCode)
        ));
    }

    #[test]
    fn view_hides_credentials() {
        let user = pending("123456", Utc::now());
        let value = serde_json::to_value(user.to_view()).unwrap();

        assert!(value.get("passwordHash").is_none());
        assert!(value.get("verifyCode").is_none());
        assert_eq!(value["isAcceptingMessages"], true);
    }
}
