use async_trait::async_trait;
use feedbox_shared::Message;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Registration, UserRecord, UserStore};

/// Store backed by a process-local vector. Used for `STORE=memory` dev runs
/// and by the test suite; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<UserRecord>> {
        let users = self.users.read().await;
        let verified = users
            .iter()
            .find(|u| u.is_verified && u.username == username);

        Ok(verified
            .or_else(|| users.iter().find(|u| u.username == username))
            .cloned())
    }

    async fn find_verified_by_username(
        &self,
        username: &str,
    ) -> anyhow::Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.is_verified && u.username == username)
            .cloned())
    }

    async fn find_pending_by_username_and_code(
        &self,
        username: &str,
        code: &str,
    ) -> anyhow::Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .rev()
            .find(|u| {
                !u.is_verified && u.username == username && u.verify_code.as_deref() == Some(code)
            })
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &UserRecord) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            anyhow::bail!("duplicate email {}", user.email);
        }
        users.push(user.clone());
        Ok(())
    }

    async fn update_registration(
        &self,
        id: Uuid,
        registration: &Registration,
    ) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.username = registration.username.clone();
            user.password_hash = registration.password_hash.clone();
            user.verify_code = Some(registration.verify_code.clone());
            user.verify_code_expiry = Some(registration.verify_code_expiry);
        }
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };

        user.is_verified = true;
        user.verify_code = None;
        user.verify_code_expiry = None;
        Ok(true)
    }

    async fn set_accepting_messages(
        &self,
        id: Uuid,
        accepting: bool,
    ) -> anyhow::Result<Option<UserRecord>> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.is_accepting_messages = accepting;
            user.clone()
        }))
    }

    async fn append_message(&self, id: Uuid, message: &Message) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        match users
            .iter_mut()
            .find(|u| u.id == id && u.is_accepting_messages)
        {
            Some(user) => {
                user.messages.push(message.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_message(&self, user_id: Uuid, message_id: Uuid) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(false);
        };

        let before = user.messages.len();
        user.messages.retain(|m| m.id != message_id);
        Ok(user.messages.len() < before)
    }
}
