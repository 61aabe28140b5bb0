//! Check-in service — CRUD over the check-in store, ownership-checked.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::model::{CheckIn, EnergyLevel, Mood, Page};
use crate::service::Caller;
use crate::store::{CheckInPatch, CheckInStore, NewCheckIn};

/// Request body for creating a check-in.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckInRequest {
    pub mood: Mood,
    pub energy_level: EnergyLevel,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for partially updating a check-in. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchCheckInRequest {
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Public view of a check-in, with the current generated message text
/// inlined when one exists.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInResponse {
    pub id: i64,
    pub user_id: i64,
    pub mood: Mood,
    pub energy_level: EnergyLevel,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub generated_message: Option<String>,
}

pub struct CheckInService {
    store: Arc<dyn CheckInStore>,
}

impl CheckInService {
    pub fn new(store: Arc<dyn CheckInStore>) -> Self {
        Self { store }
    }

    /// Record a new check-in for the given user.
    pub async fn create(
        &self,
        user_id: i64,
        req: CreateCheckInRequest,
    ) -> Result<CheckInResponse, ServiceError> {
        let check_in = self
            .store
            .insert_check_in(NewCheckIn {
                user_id,
                mood: req.mood,
                energy_level: req.energy_level,
                notes: req.notes,
            })
            .await?;

        self.to_response(check_in).await
    }

    /// Get a check-in by id.
    pub async fn get(&self, id: i64) -> Result<CheckInResponse, ServiceError> {
        let check_in = self
            .store
            .get_check_in(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("CheckIn", id))?;
        self.to_response(check_in).await
    }

    /// List a user's check-ins, newest first.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Page<CheckInResponse>, ServiceError> {
        let check_ins = self.store.list_for_user(user_id, page, per_page).await?;

        let mut items = Vec::with_capacity(check_ins.items.len());
        for check_in in check_ins.items {
            items.push(self.to_response(check_in).await?);
        }

        Ok(Page {
            items,
            page: check_ins.page,
            per_page: check_ins.per_page,
            total: check_ins.total,
        })
    }

    /// Partially update a check-in. Only the owner may do this; `created_at`
    /// and the generated-message link are never touched.
    pub async fn update_partial(
        &self,
        caller: &Caller,
        id: i64,
        req: PatchCheckInRequest,
    ) -> Result<CheckInResponse, ServiceError> {
        self.ensure_owner(caller, id).await?;

        let updated = self
            .store
            .update_check_in(
                id,
                CheckInPatch {
                    mood: req.mood,
                    energy_level: req.energy_level,
                    notes: req.notes,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("CheckIn", id))?;

        self.to_response(updated).await
    }

    /// Delete a check-in. Only the owner may do this. The generated message,
    /// if any, is removed in the same transaction.
    pub async fn delete(&self, caller: &Caller, id: i64) -> Result<(), ServiceError> {
        self.ensure_owner(caller, id).await?;

        if !self.store.delete_check_in(id).await? {
            return Err(ServiceError::not_found("CheckIn", id));
        }
        Ok(())
    }

    async fn ensure_owner(&self, caller: &Caller, id: i64) -> Result<(), ServiceError> {
        let check_in = self
            .store
            .get_check_in(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("CheckIn", id))?;

        if check_in.user_id != caller.user_id {
            return Err(ServiceError::Forbidden(
                "Check-in belongs to another user".into(),
            ));
        }
        Ok(())
    }

    async fn to_response(&self, check_in: CheckIn) -> Result<CheckInResponse, ServiceError> {
        let generated_message = match check_in.generated_message_id {
            Some(_) => self
                .store
                .get_generated_message(check_in.id)
                .await?
                .map(|gm| gm.message),
            None => None,
        };

        Ok(CheckInResponse {
            id: check_in.id,
            user_id: check_in.user_id,
            mood: check_in.mood,
            energy_level: check_in.energy_level,
            notes: check_in.notes,
            created_at: check_in.created_at,
            generated_message,
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LibSqlBackend, UserStore};

    async fn setup() -> (CheckInService, Arc<LibSqlBackend>, Caller) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let user = db.insert_user("alice", "hash").await.unwrap();
        let service = CheckInService::new(Arc::clone(&db) as Arc<dyn CheckInStore>);
        let caller = Caller {
            user_id: user.id,
            username: user.username,
        };
        (service, db, caller)
    }

    fn create_req() -> CreateCheckInRequest {
        CreateCheckInRequest {
            mood: Mood::Happy,
            energy_level: EnergyLevel::High,
            notes: Some("Great day".into()),
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let (service, _, caller) = setup().await;

        let created = service.create(caller.user_id, create_req()).await.unwrap();
        assert_eq!(created.mood, Mood::Happy);
        assert_eq!(created.generated_message, None);

        let fetched = service.get(created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.notes.as_deref(), Some("Great day"));
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (service, _, _) = setup().await;
        let err = service.get(404).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn get_inlines_generated_message() {
        let (service, db, caller) = setup().await;
        let created = service.create(caller.user_id, create_req()).await.unwrap();
        db.attach_generated_message(created.id, "Keep it up!", Some(0.9), Utc::now())
            .await
            .unwrap();

        let fetched = service.get(created.id).await.unwrap();
        assert_eq!(fetched.generated_message.as_deref(), Some("Keep it up!"));
    }

    #[tokio::test]
    async fn patch_by_owner_updates_fields() {
        let (service, _, caller) = setup().await;
        let created = service.create(caller.user_id, create_req()).await.unwrap();

        let patched = service
            .update_partial(
                &caller,
                created.id,
                PatchCheckInRequest {
                    energy_level: Some(EnergyLevel::Low),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(patched.energy_level, EnergyLevel::Low);
        assert_eq!(patched.mood, Mood::Happy);
    }

    #[tokio::test]
    async fn patch_by_non_owner_is_forbidden() {
        let (service, db, caller) = setup().await;
        let created = service.create(caller.user_id, create_req()).await.unwrap();

        let bob = db.insert_user("bob", "hash").await.unwrap();
        let bob_caller = Caller {
            user_id: bob.id,
            username: bob.username,
        };

        let err = service
            .update_partial(&bob_caller, created.id, PatchCheckInRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_by_owner_removes_check_in_and_message() {
        let (service, db, caller) = setup().await;
        let created = service.create(caller.user_id, create_req()).await.unwrap();
        db.attach_generated_message(created.id, "msg", None, Utc::now())
            .await
            .unwrap();

        service.delete(&caller, created.id).await.unwrap();

        assert!(matches!(
            service.get(created.id).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(db.get_generated_message(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_non_owner_is_forbidden() {
        let (service, db, caller) = setup().await;
        let created = service.create(caller.user_id, create_req()).await.unwrap();

        let bob = db.insert_user("bob", "hash").await.unwrap();
        let bob_caller = Caller {
            user_id: bob.id,
            username: bob.username,
        };

        let err = service.delete(&bob_caller, created.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn list_only_returns_own_check_ins() {
        let (service, db, caller) = setup().await;
        service.create(caller.user_id, create_req()).await.unwrap();
        service.create(caller.user_id, create_req()).await.unwrap();

        let bob = db.insert_user("bob", "hash").await.unwrap();
        service.create(bob.id, create_req()).await.unwrap();

        let page = service.list_for_user(caller.user_id, 0, 10).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|c| c.user_id == caller.user_id));
    }
}
