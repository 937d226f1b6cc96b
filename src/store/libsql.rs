//! libSQL store backend — durable `Store` implementation.
//!
//! Accounts live in one table with JSON columns for the role-shaped draft
//! and subscription blobs; each non-student role has its own collection
//! table with a unique index on `subject_id`. Partial updates build an
//! `UPDATE ... SET` from the present patch fields only, so concurrent
//! sessions never overwrite each other's unrelated columns.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::account::{
    Account, AccountPatch, AgentRecord, RoleRecord, SchoolRecord, Subscription, TutorRecord,
    VendorRecord, VerificationStatus,
};
use crate::error::StoreError;
use crate::onboarding::step::OnboardingStep;
use crate::roles::Role;
use crate::store::migrations;
use crate::store::traits::Store;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Parse a role string from the DB.
fn str_to_role(s: &str) -> Role {
    s.parse().unwrap_or_default()
}

/// Parse a step string from the DB.
fn str_to_step(s: &str) -> OnboardingStep {
    match s {
        "basic_info" => OnboardingStep::BasicInfo,
        "role_specific" => OnboardingStep::RoleSpecific,
        "subscription" => OnboardingStep::Subscription,
        "complete" => OnboardingStep::Complete,
        _ => OnboardingStep::ChooseRole,
    }
}

/// Parse a verification status string from the DB.
fn str_to_verification(s: &str) -> VerificationStatus {
    match s {
        "verified" => VerificationStatus::Verified,
        "rejected" => VerificationStatus::Rejected,
        _ => VerificationStatus::Pending,
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Serialization(format!("invalid uuid {s}: {e}")))
}

fn json_to_string<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn string_to_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, StoreError> {
    serde_json::from_str(s).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Map a constraint failure to `Constraint`, anything else to `Query`.
fn map_write_err(context: &str, e: libsql::Error) -> StoreError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint") {
        StoreError::Constraint(format!("{context}: {msg}"))
    } else {
        StoreError::Query(format!("{context}: {msg}"))
    }
}

const ACCOUNT_COLUMNS: &str = "subject_id, email, full_name, phone, country, country_code, role, \
     role_locked, onboarding_step, onboarding_completed, role_profile_draft, subscription, \
     created_at, updated_at";

/// Map a libsql row to an Account. Column order matches ACCOUNT_COLUMNS.
fn row_to_account(row: &libsql::Row) -> Result<Account, StoreError> {
    let get_text = |idx: i32| -> Result<String, StoreError> {
        row.get::<String>(idx)
            .map_err(|e| StoreError::Serialization(format!("account column {idx}: {e}")))
    };
    let get_opt_text = |idx: i32| -> Result<Option<String>, StoreError> {
        row.get::<Option<String>>(idx)
            .map_err(|e| StoreError::Serialization(format!("account column {idx}: {e}")))
    };
    let get_bool = |idx: i32| -> Result<bool, StoreError> {
        row.get::<i64>(idx)
            .map(|v| v != 0)
            .map_err(|e| StoreError::Serialization(format!("account column {idx}: {e}")))
    };

    let role_profile_draft = match get_opt_text(10)? {
        Some(json) => Some(string_to_json(&json)?),
        None => None,
    };
    let subscription: Subscription = string_to_json(&get_text(11)?)?;

    Ok(Account {
        subject_id: get_text(0)?,
        email: get_text(1)?,
        full_name: get_text(2)?,
        phone: get_text(3)?,
        country: get_text(4)?,
        country_code: get_opt_text(5)?,
        role: str_to_role(&get_text(6)?),
        role_locked: get_bool(7)?,
        onboarding_step: str_to_step(&get_text(8)?),
        onboarding_completed: get_bool(9)?,
        role_profile_draft,
        subscription,
        created_at: parse_datetime(&get_text(12)?),
        updated_at: parse_datetime(&get_text(13)?),
    })
}

fn bind(sets: &mut Vec<String>, values: &mut Vec<Value>, column: &str, value: Value) {
    values.push(value);
    sets.push(format!("{column} = ?{}", values.len()));
}

#[async_trait]
impl Store for LibSqlStore {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn load_account(&self, subject_id: &str) -> Result<Option<Account>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE subject_id = ?1"),
                params![subject_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("load_account: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_account(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("load_account: {e}"))),
        }
    }

    async fn create_account(&self, account: &Account) -> Result<(), StoreError> {
        let draft_json = match &account.role_profile_draft {
            Some(draft) => Some(json_to_string(draft)?),
            None => None,
        };
        let subscription_json = json_to_string(&account.subscription)?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO accounts ({ACCOUNT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    account.subject_id.as_str(),
                    account.email.as_str(),
                    account.full_name.as_str(),
                    account.phone.as_str(),
                    account.country.as_str(),
                    account.country_code.as_deref(),
                    account.role.to_string(),
                    account.role_locked as i64,
                    account.onboarding_step.to_string(),
                    account.onboarding_completed as i64,
                    draft_json,
                    subscription_json,
                    account.created_at.to_rfc3339(),
                    account.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| map_write_err("create_account", e))?;

        debug!(subject_id = %account.subject_id, "Account created");
        Ok(())
    }

    async fn patch_account(
        &self,
        subject_id: &str,
        patch: &AccountPatch,
    ) -> Result<(), StoreError> {
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(v) = &patch.full_name {
            bind(&mut sets, &mut values, "full_name", Value::from(v.clone()));
        }
        if let Some(v) = &patch.phone {
            bind(&mut sets, &mut values, "phone", Value::from(v.clone()));
        }
        if let Some(v) = &patch.country {
            bind(&mut sets, &mut values, "country", Value::from(v.clone()));
        }
        if let Some(v) = &patch.country_code {
            bind(
                &mut sets,
                &mut values,
                "country_code",
                Value::from(v.clone()),
            );
        }
        if let Some(v) = patch.role {
            bind(&mut sets, &mut values, "role", Value::from(v.to_string()));
        }
        if let Some(v) = patch.role_locked {
            bind(&mut sets, &mut values, "role_locked", Value::from(v as i64));
        }
        if let Some(v) = patch.onboarding_step {
            bind(
                &mut sets,
                &mut values,
                "onboarding_step",
                Value::from(v.to_string()),
            );
        }
        if let Some(v) = patch.onboarding_completed {
            bind(
                &mut sets,
                &mut values,
                "onboarding_completed",
                Value::from(v as i64),
            );
        }
        if let Some(v) = &patch.role_profile_draft {
            let value = match v {
                Some(draft) => Value::from(json_to_string(draft)?),
                None => Value::Null,
            };
            bind(&mut sets, &mut values, "role_profile_draft", value);
        }
        if let Some(v) = &patch.subscription {
            bind(
                &mut sets,
                &mut values,
                "subscription",
                Value::from(json_to_string(v)?),
            );
        }

        // Every patch stamps updated_at, even an otherwise empty one.
        bind(
            &mut sets,
            &mut values,
            "updated_at",
            Value::from(Utc::now().to_rfc3339()),
        );

        values.push(Value::from(subject_id.to_string()));
        let sql = format!(
            "UPDATE accounts SET {} WHERE subject_id = ?{}",
            sets.join(", "),
            values.len()
        );

        let affected = self
            .conn()
            .execute(&sql, values)
            .await
            .map_err(|e| map_write_err("patch_account", e))?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "account".to_string(),
                id: subject_id.to_string(),
            });
        }
        debug!(subject_id = %subject_id, "Account patched");
        Ok(())
    }

    async fn find_role_record(
        &self,
        role: Role,
        subject_id: &str,
    ) -> Result<Option<RoleRecord>, StoreError> {
        let conn = self.conn();
        let mut rows = match role {
            Role::Student => return Ok(None),
            Role::Agent => conn
                .query(
                    "SELECT id, subject_id, company_name, business_license, payout_email, \
                     referral_code, verification_status, created_at \
                     FROM agents WHERE subject_id = ?1",
                    params![subject_id],
                )
                .await,
            Role::Tutor => conn
                .query(
                    "SELECT id, subject_id, specializations, experience_years, hourly_rate, \
                     payout_email, bio, verification_status, created_at \
                     FROM tutors WHERE subject_id = ?1",
                    params![subject_id],
                )
                .await,
            Role::School => conn
                .query(
                    "SELECT id, subject_id, name, location, website, school_type, \
                     verification_status, created_at \
                     FROM schools WHERE subject_id = ?1",
                    params![subject_id],
                )
                .await,
            Role::Vendor => conn
                .query(
                    "SELECT id, subject_id, business_name, service_categories, payout_email, \
                     verification_status, created_at \
                     FROM vendors WHERE subject_id = ?1",
                    params![subject_id],
                )
                .await,
        }
        .map_err(|e| StoreError::Query(format!("find_role_record: {e}")))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(StoreError::Query(format!("find_role_record: {e}"))),
        };

        let get_text = |idx: i32| -> Result<String, StoreError> {
            row.get::<String>(idx)
                .map_err(|e| StoreError::Serialization(format!("role record column {idx}: {e}")))
        };

        let record = match role {
            Role::Student => unreachable!("student handled above"),
            Role::Agent => RoleRecord::Agent(AgentRecord {
                id: parse_uuid(&get_text(0)?)?,
                subject_id: get_text(1)?,
                company_name: get_text(2)?,
                business_license: get_text(3)?,
                payout_email: get_text(4)?,
                referral_code: get_text(5)?,
                verification_status: str_to_verification(&get_text(6)?),
                created_at: parse_datetime(&get_text(7)?),
            }),
            Role::Tutor => RoleRecord::Tutor(TutorRecord {
                id: parse_uuid(&get_text(0)?)?,
                subject_id: get_text(1)?,
                specializations: string_to_json(&get_text(2)?)?,
                experience_years: row
                    .get::<i64>(3)
                    .map_err(|e| StoreError::Serialization(format!("experience_years: {e}")))?
                    as u32,
                hourly_rate: Decimal::from_str(&get_text(4)?)
                    .map_err(|e| StoreError::Serialization(format!("hourly_rate: {e}")))?,
                payout_email: get_text(5)?,
                bio: row
                    .get::<Option<String>>(6)
                    .map_err(|e| StoreError::Serialization(format!("bio: {e}")))?,
                verification_status: str_to_verification(&get_text(7)?),
                created_at: parse_datetime(&get_text(8)?),
            }),
            Role::School => RoleRecord::School(SchoolRecord {
                id: parse_uuid(&get_text(0)?)?,
                subject_id: get_text(1)?,
                name: get_text(2)?,
                location: get_text(3)?,
                website: get_text(4)?,
                school_type: get_text(5)?,
                verification_status: str_to_verification(&get_text(6)?),
                created_at: parse_datetime(&get_text(7)?),
            }),
            Role::Vendor => RoleRecord::Vendor(VendorRecord {
                id: parse_uuid(&get_text(0)?)?,
                subject_id: get_text(1)?,
                business_name: get_text(2)?,
                service_categories: string_to_json(&get_text(3)?)?,
                payout_email: get_text(4)?,
                verification_status: str_to_verification(&get_text(5)?),
                created_at: parse_datetime(&get_text(6)?),
            }),
        };
        Ok(Some(record))
    }

    async fn count_role_records(&self, role: Role, subject_id: &str) -> Result<usize, StoreError> {
        let table = match role {
            Role::Student => return Ok(0),
            Role::Agent => "agents",
            Role::Tutor => "tutors",
            Role::School => "schools",
            Role::Vendor => "vendors",
        };
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*) FROM {table} WHERE subject_id = ?1"),
                params![subject_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("count_role_records: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count = row
                    .get::<i64>(0)
                    .map_err(|e| StoreError::Serialization(format!("count: {e}")))?;
                Ok(count as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(StoreError::Query(format!("count_role_records: {e}"))),
        }
    }

    async fn create_role_record(&self, record: &RoleRecord) -> Result<(), StoreError> {
        let conn = self.conn();
        match record {
            RoleRecord::Agent(r) => {
                conn.execute(
                    "INSERT INTO agents (id, subject_id, company_name, business_license, \
                     payout_email, referral_code, verification_status, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        r.id.to_string(),
                        r.subject_id.as_str(),
                        r.company_name.as_str(),
                        r.business_license.as_str(),
                        r.payout_email.as_str(),
                        r.referral_code.as_str(),
                        r.verification_status.to_string(),
                        r.created_at.to_rfc3339(),
                    ],
                )
                .await
            }
            RoleRecord::Tutor(r) => {
                conn.execute(
                    "INSERT INTO tutors (id, subject_id, specializations, experience_years, \
                     hourly_rate, payout_email, bio, verification_status, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        r.id.to_string(),
                        r.subject_id.as_str(),
                        json_to_string(&r.specializations)?,
                        r.experience_years as i64,
                        r.hourly_rate.to_string(),
                        r.payout_email.as_str(),
                        r.bio.as_deref(),
                        r.verification_status.to_string(),
                        r.created_at.to_rfc3339(),
                    ],
                )
                .await
            }
            RoleRecord::School(r) => {
                conn.execute(
                    "INSERT INTO schools (id, subject_id, name, location, website, school_type, \
                     verification_status, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        r.id.to_string(),
                        r.subject_id.as_str(),
                        r.name.as_str(),
                        r.location.as_str(),
                        r.website.as_str(),
                        r.school_type.as_str(),
                        r.verification_status.to_string(),
                        r.created_at.to_rfc3339(),
                    ],
                )
                .await
            }
            RoleRecord::Vendor(r) => {
                conn.execute(
                    "INSERT INTO vendors (id, subject_id, business_name, service_categories, \
                     payout_email, verification_status, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        r.id.to_string(),
                        r.subject_id.as_str(),
                        r.business_name.as_str(),
                        json_to_string(&r.service_categories)?,
                        r.payout_email.as_str(),
                        r.verification_status.to_string(),
                        r.created_at.to_rfc3339(),
                    ],
                )
                .await
            }
        }
        .map_err(|e| map_write_err("create_role_record", e))?;

        debug!(
            role = %record.role(),
            subject_id = %record.subject_id(),
            "Role record created"
        );
        Ok(())
    }
}
