//! In-process store backend — RwLock'd maps, no durability.
//!
//! Used by the test suite and by embedders that want the engine without a
//! database. Patch semantics are shared with the durable backend through
//! `AccountPatch::apply_to`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::account::{Account, AccountPatch, RoleRecord};
use crate::error::StoreError;
use crate::roles::Role;

use super::traits::Store;

#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Account>>,
    records: RwLock<Vec<RoleRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_account(&self, subject_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(subject_id).cloned())
    }

    async fn create_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.subject_id) {
            return Err(StoreError::Constraint(format!(
                "account already exists: {}",
                account.subject_id
            )));
        }
        accounts.insert(account.subject_id.clone(), account.clone());
        Ok(())
    }

    async fn patch_account(
        &self,
        subject_id: &str,
        patch: &AccountPatch,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(subject_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "account".to_string(),
                id: subject_id.to_string(),
            })?;
        patch.apply_to(account);
        Ok(())
    }

    async fn find_role_record(
        &self,
        role: Role,
        subject_id: &str,
    ) -> Result<Option<RoleRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.role() == role && r.subject_id() == subject_id)
            .cloned())
    }

    async fn count_role_records(&self, role: Role, subject_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.role() == role && r.subject_id() == subject_id)
            .count())
    }

    async fn create_role_record(&self, record: &RoleRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|r| r.role() == record.role() && r.subject_id() == record.subject_id())
        {
            return Err(StoreError::Constraint(format!(
                "{} record already exists for {}",
                record.role(),
                record.subject_id()
            )));
        }
        records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::onboarding::step::OnboardingStep;
    use crate::roles::{AgentDraft, RoleProfileDraft};

    use super::*;

    #[tokio::test]
    async fn create_then_load_roundtrip() {
        let store = MemoryStore::new();
        let account = Account::bootstrap("sub_1", "a@example.com", None, None);
        store.create_account(&account).await.unwrap();

        let loaded = store.load_account("sub_1").await.unwrap().unwrap();
        assert_eq!(loaded, account);
        assert!(store.load_account("sub_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_a_constraint_error() {
        let store = MemoryStore::new();
        let account = Account::bootstrap("sub_1", "a@example.com", None, None);
        store.create_account(&account).await.unwrap();
        assert!(matches!(
            store.create_account(&account).await,
            Err(StoreError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn patch_missing_account_is_not_found() {
        let store = MemoryStore::new();
        let patch = AccountPatch {
            onboarding_step: Some(OnboardingStep::BasicInfo),
            ..Default::default()
        };
        assert!(matches!(
            store.patch_account("ghost", &patch).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn patch_preserves_unrelated_fields() {
        let store = MemoryStore::new();
        let account = Account::bootstrap("sub_1", "a@example.com", Some("Ann"), None);
        store.create_account(&account).await.unwrap();

        // Two "tabs" patch different fields; neither clobbers the other.
        store
            .patch_account(
                "sub_1",
                &AccountPatch {
                    phone: Some("+15550000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .patch_account(
                "sub_1",
                &AccountPatch {
                    country: Some("Canada".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = store.get_account("sub_1").await.unwrap();
        assert_eq!(loaded.phone, "+15550000");
        assert_eq!(loaded.country, "Canada");
        assert_eq!(loaded.full_name, "Ann");
    }

    #[tokio::test]
    async fn role_records_are_unique_per_subject() {
        let store = MemoryStore::new();
        let draft = RoleProfileDraft::Agent(AgentDraft {
            company_name: "Globe Study".to_string(),
            business_license: "BL-1".to_string(),
            payout_email: "p@g.example".to_string(),
        });
        let record = RoleRecord::from_draft("sub_1", &draft);
        store.create_role_record(&record).await.unwrap();

        let again = RoleRecord::from_draft("sub_1", &draft);
        assert!(matches!(
            store.create_role_record(&again).await,
            Err(StoreError::Constraint(_))
        ));
        assert_eq!(
            store.count_role_records(Role::Agent, "sub_1").await.unwrap(),
            1
        );
        assert!(
            store
                .find_role_record(Role::Tutor, "sub_1")
                .await
                .unwrap()
                .is_none()
        );
    }
}
