//! User directory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tally_core::{Result, TallyError, User};
use tokio::sync::RwLock;

/// Resolves internal user ids to chat-platform profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by internal id.
    async fn get_user(&self, id: &str) -> Result<User>;
}

/// In-memory user directory, populated by the ingestion layer.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory holding `users`.
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    /// Add or replace a profile. Returns the previous profile, if any.
    pub async fn upsert(&self, user: User) -> Option<User> {
        let mut users = self.users.write().await;
        users.insert(user.id.clone(), user)
    }

    /// Remove a profile.
    pub async fn remove(&self, id: &str) -> Option<User> {
        self.users.write().await.remove(id)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: &str) -> Result<User> {
        let users = self.users.read().await;
        users
            .get(id)
            .cloned()
            .ok_or_else(|| TallyError::lookup(id, "no such user"))
    }
}
