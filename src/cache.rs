//! Read-through user cache.
//!
//! A user is reachable under two independent keys (id and username), so
//! mutations clear the whole cache instead of evicting single entries —
//! selective eviction would need a reverse index between the two keys.
//!
//! One `RwLock` guards the entire map. Populate-on-miss takes the write
//! lock, so an `invalidate_all` can never interleave with a populate and
//! leave a stale entry behind: after invalidation returns, every lookup
//! goes back to the store.
//!
//! No expiry; entries live until invalidated or the process ends. Sizing is
//! bounded only by process memory, which is fine for the expected
//! active-user counts.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::model::User;

/// Key under which a cached user is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserKey {
    Id(i64),
    Username(String),
}

/// Whole-cache-invalidation user cache.
#[derive(Default)]
pub struct UserCache {
    entries: RwLock<HashMap<UserKey, User>>,
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached user.
    pub fn get(&self, key: &UserKey) -> Option<User> {
        self.entries
            .read()
            .expect("user cache lock poisoned")
            .get(key)
            .cloned()
    }

    /// Cache a user under both its id and username keys, so a later lookup
    /// by either key hits.
    pub fn put(&self, user: &User) {
        let mut entries = self.entries.write().expect("user cache lock poisoned");
        entries.insert(UserKey::Id(user.id), user.clone());
        entries.insert(UserKey::Username(user.username.clone()), user.clone());
    }

    /// Drop every entry. Called by every mutating user operation.
    pub fn invalidate_all(&self) {
        self.entries
            .write()
            .expect("user cache lock poisoned")
            .clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().expect("user cache lock poisoned").len()
    }
}
