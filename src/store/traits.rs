//! Backend-agnostic `Store` trait — single async interface for all
//! persistence.
//!
//! One document per account keyed by subject id, plus one collection per
//! non-student role keyed by a generated id with a `subject_id` field for
//! lookup. Account writes are atomic partial merges: concurrent sessions
//! racing on the same subject must never clobber each other's unrelated
//! fields with a full-document overwrite.

use async_trait::async_trait;

use crate::account::{Account, AccountPatch, RoleRecord};
use crate::error::StoreError;
use crate::roles::Role;

#[async_trait]
pub trait Store: Send + Sync {
    /// Run all pending schema migrations. No-op for backends without a schema.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        Ok(())
    }

    // ── Accounts ────────────────────────────────────────────────────

    /// Load an account, or `None` if the subject has never been seen.
    async fn load_account(&self, subject_id: &str) -> Result<Option<Account>, StoreError>;

    /// Create a fresh account document. Fails with `Constraint` if one
    /// already exists for the subject.
    async fn create_account(&self, account: &Account) -> Result<(), StoreError>;

    /// Apply a partial update to an account. Only the patch's present
    /// fields are written; a failed patch leaves the document untouched
    /// and surfaces as a retryable error.
    async fn patch_account(&self, subject_id: &str, patch: &AccountPatch)
    -> Result<(), StoreError>;

    /// Load an account that must exist.
    async fn get_account(&self, subject_id: &str) -> Result<Account, StoreError> {
        self.load_account(subject_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "account".to_string(),
                id: subject_id.to_string(),
            })
    }

    // ── Role records ────────────────────────────────────────────────

    /// Find the role record for a subject in `role`'s collection, if any.
    async fn find_role_record(
        &self,
        role: Role,
        subject_id: &str,
    ) -> Result<Option<RoleRecord>, StoreError>;

    /// Number of records for a subject in `role`'s collection. The
    /// invariant after finalization is exactly one for non-student roles.
    async fn count_role_records(&self, role: Role, subject_id: &str) -> Result<usize, StoreError>;

    /// Insert a role record. Fails with `Constraint` if the subject
    /// already has one in that collection.
    async fn create_role_record(&self, record: &RoleRecord) -> Result<(), StoreError>;
}
