//! Store traits — async persistence interfaces for check-ins and users.
//!
//! The enrichment and user services depend on these traits, not on the
//! libSQL backend, so tests can substitute counting or failing stubs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::model::{CheckIn, EnergyLevel, GeneratedMessage, Mood, Page, User};

/// Data for a new check-in row.
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub user_id: i64,
    pub mood: Mood,
    pub energy_level: EnergyLevel,
    pub notes: Option<String>,
}

/// Partial update for a check-in. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct CheckInPatch {
    pub mood: Option<Mood>,
    pub energy_level: Option<EnergyLevel>,
    pub notes: Option<String>,
}

/// Persistence of check-ins and their generated messages.
#[async_trait]
pub trait CheckInStore: Send + Sync {
    /// Insert a new check-in; `created_at` is assigned by the store.
    async fn insert_check_in(&self, new: NewCheckIn) -> Result<CheckIn, DatabaseError>;

    /// Get a check-in by id.
    async fn get_check_in(&self, id: i64) -> Result<Option<CheckIn>, DatabaseError>;

    /// List a user's check-ins, newest first.
    async fn list_for_user(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Page<CheckIn>, DatabaseError>;

    /// Apply a partial update. Returns the updated row, or `None` if the
    /// check-in does not exist. `created_at` is never touched.
    async fn update_check_in(
        &self,
        id: i64,
        patch: CheckInPatch,
    ) -> Result<Option<CheckIn>, DatabaseError>;

    /// Delete a check-in and, in the same transaction, its generated
    /// message. Returns whether a row was deleted.
    async fn delete_check_in(&self, id: i64) -> Result<bool, DatabaseError>;

    /// Persist a generated message and point the check-in's back-reference
    /// at it, atomically. Any previous generated message for this check-in
    /// is replaced in the same transaction (the relationship is strictly
    /// 1:1, so the old row must not be left orphaned).
    async fn attach_generated_message(
        &self,
        check_in_id: i64,
        message: &str,
        confidence: Option<f64>,
        generated_at: DateTime<Utc>,
    ) -> Result<GeneratedMessage, DatabaseError>;

    /// Get the generated message currently linked to a check-in.
    async fn get_generated_message(
        &self,
        check_in_id: i64,
    ) -> Result<Option<GeneratedMessage>, DatabaseError>;
}

/// Persistence of users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. A duplicate username surfaces as
    /// [`DatabaseError::Constraint`].
    async fn insert_user(&self, username: &str, password_hash: &str)
    -> Result<User, DatabaseError>;

    /// Get a user by id.
    async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError>;

    /// Get a user by unique username.
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError>;

    /// Replace a user's password hash.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), DatabaseError>;

    /// Delete a user and, in the same transaction, their check-ins and any
    /// generated messages those own. Returns whether a row was deleted.
    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError>;

    /// List users, oldest first.
    async fn list_users(&self, page: u32, per_page: u32) -> Result<Page<User>, DatabaseError>;
}
