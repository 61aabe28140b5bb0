//! User service — create/read/list/update-password/delete, with a
//! read-through cache in front of every single-user read.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{UserCache, UserKey};
use crate::error::{DatabaseError, ServiceError};
use crate::model::{Page, User};
use crate::notify::NotificationPublisher;
use crate::service::Caller;
use crate::store::UserStore;

/// Request body for user creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    cache: UserCache,
    publisher: Arc<dyn NotificationPublisher>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, publisher: Arc<dyn NotificationPublisher>) -> Self {
        Self {
            store,
            cache: UserCache::new(),
            publisher,
        }
    }

    /// Create a user. Duplicate usernames are a [`ServiceError::Conflict`].
    ///
    /// The welcome notification is best-effort: a publish failure is logged
    /// and the created user is returned anyway.
    pub async fn create(&self, req: CreateUserRequest) -> Result<UserResponse, ServiceError> {
        if self.store.get_user_by_username(&req.username).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username already exists: {}",
                req.username
            )));
        }

        let password_hash = hash_password(&req.password)?;

        // A concurrent create can still hit the unique index; surface that
        // race as the same conflict.
        let user = match self.store.insert_user(&req.username, &password_hash).await {
            Ok(user) => user,
            Err(DatabaseError::Constraint(_)) => {
                return Err(ServiceError::Conflict(format!(
                    "Username already exists: {}",
                    req.username
                )));
            }
            Err(e) => return Err(e.into()),
        };

        self.cache.invalidate_all();

        if let Err(e) = self
            .publisher
            .publish(
                "user.exchange",
                "user.welcome",
                &format!("Welcome, {}!", user.username),
            )
            .await
        {
            warn!(error = %e, "Welcome notification failed");
        }

        Ok(UserResponse::from(&user))
    }

    /// Get a user by id, read-through cached.
    pub async fn get_by_id(&self, id: i64) -> Result<UserResponse, ServiceError> {
        let user = self.load(UserKey::Id(id)).await?;
        Ok(UserResponse::from(&user))
    }

    /// Get a user by username, read-through cached.
    pub async fn get_by_username(&self, username: &str) -> Result<UserResponse, ServiceError> {
        let user = self.load(UserKey::Username(username.to_string())).await?;
        Ok(UserResponse::from(&user))
    }

    /// Resolve a caller identity from a username (cached like any read).
    pub async fn resolve_caller(&self, username: &str) -> Result<Caller, ServiceError> {
        let user = self.load(UserKey::Username(username.to_string())).await?;
        Ok(Caller {
            user_id: user.id,
            username: user.username,
        })
    }

    /// List users, paginated. Uncached.
    pub async fn list(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<UserResponse>, ServiceError> {
        let users = self.store.list_users(page, per_page).await?;
        Ok(Page {
            items: users.items.iter().map(UserResponse::from).collect(),
            page: users.page,
            per_page: users.per_page,
            total: users.total,
        })
    }

    /// Change a user's password. Only the user themself may do this.
    pub async fn update_password(
        &self,
        caller: &Caller,
        user_id: i64,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        if caller.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Cannot change another user's password".into(),
            ));
        }

        let password_hash = hash_password(new_password)?;
        match self.store.update_password(user_id, &password_hash).await {
            Ok(()) => {}
            Err(DatabaseError::NotFound { .. }) => {
                return Err(ServiceError::not_found("User", user_id));
            }
            Err(e) => return Err(e.into()),
        }

        self.cache.invalidate_all();
        Ok(())
    }

    /// Delete a user. Only the user themself may do this.
    pub async fn delete(&self, caller: &Caller, user_id: i64) -> Result<(), ServiceError> {
        if caller.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Cannot delete another user".into(),
            ));
        }

        if !self.store.delete_user(user_id).await? {
            return Err(ServiceError::not_found("User", user_id));
        }

        self.cache.invalidate_all();
        Ok(())
    }

    /// Read-through: cache hit, or load from the store and populate both
    /// keys for the user.
    async fn load(&self, key: UserKey) -> Result<User, ServiceError> {
        if let Some(user) = self.cache.get(&key) {
            return Ok(user);
        }

        let user = match &key {
            UserKey::Id(id) => self
                .store
                .get_user(*id)
                .await?
                .ok_or_else(|| ServiceError::not_found("User", id))?,
            UserKey::Username(name) => self
                .store
                .get_user_by_username(name)
                .await?
                .ok_or_else(|| ServiceError::not_found("User", name.clone()))?,
        };

        self.cache.put(&user);
        Ok(user)
    }
}

/// Salted Argon2id hash of a password.
fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::PasswordHash(e.to_string()))
}

// ── Tests ───────────────────────────────────────────────────────────
