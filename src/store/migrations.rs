//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::StoreError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS accounts (
            subject_id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            full_name TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            country_code TEXT,
            role TEXT NOT NULL DEFAULT 'student',
            role_locked INTEGER NOT NULL DEFAULT 0,
            onboarding_step TEXT NOT NULL DEFAULT 'choose_role',
            onboarding_completed INTEGER NOT NULL DEFAULT 0,
            role_profile_draft TEXT,
            subscription TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_accounts_role ON accounts(role);
        CREATE INDEX IF NOT EXISTS idx_accounts_completed ON accounts(onboarding_completed);

        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            company_name TEXT NOT NULL,
            business_license TEXT NOT NULL,
            payout_email TEXT NOT NULL,
            referral_code TEXT NOT NULL,
            verification_status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_subject ON agents(subject_id);

        CREATE TABLE IF NOT EXISTS tutors (
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            specializations TEXT NOT NULL DEFAULT '[]',
            experience_years INTEGER NOT NULL DEFAULT 0,
            hourly_rate TEXT NOT NULL DEFAULT '0',
            payout_email TEXT NOT NULL,
            bio TEXT,
            verification_status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tutors_subject ON tutors(subject_id);

        CREATE TABLE IF NOT EXISTS schools (
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            name TEXT NOT NULL,
            location TEXT NOT NULL,
            website TEXT NOT NULL,
            school_type TEXT NOT NULL,
            verification_status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_schools_subject ON schools(subject_id);

        CREATE TABLE IF NOT EXISTS vendors (
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            business_name TEXT NOT NULL,
            service_categories TEXT NOT NULL DEFAULT '[]',
            payout_email TEXT NOT NULL,
            verification_status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_vendors_subject ON vendors(subject_id);
    "#,
}];

/// Apply all migrations newer than the database's current version.
pub async fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                StoreError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    Ok(())
}

async fn get_current_version(conn: &Connection) -> Result<i64, StoreError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to read migration version: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => row
            .get::<i64>(0)
            .map_err(|e| StoreError::Migration(format!("Failed to parse migration version: {e}"))),
        Ok(None) => Ok(0),
        Err(e) => Err(StoreError::Migration(format!(
            "Failed to read migration version: {e}"
        ))),
    }
}

async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
