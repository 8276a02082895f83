//! SQLite implementation of AssetStore.
//!
//! Foreign keys are enforced by SQLite itself (`PRAGMA foreign_keys = ON`), so
//! deleting a still-referenced row fails the whole statement. Every reference
//! is a composite `(id, team_id)` key: a row can only point at rows of its own
//! team. Ids, dates and
//! timestamps are stored as text; tag lists and audit changes as JSON text.

use super::error::{StoreError, StoreResult};
use super::traits::AssetStore;
use crate::activity::models::{ActivityLogEntry, ActivityQuery};
use crate::assets::models::*;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS team_members (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT,
    role TEXT NOT NULL,
    UNIQUE (id, team_id)
);

CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT,
    profile_url TEXT,
    status TEXT NOT NULL,
    received_at TEXT NOT NULL,
    blocked_at TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    created_by TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (id, team_id)
);

CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    name TEXT NOT NULL,
    external_id TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    created_by TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (id, team_id)
);

CREATE TABLE IF NOT EXISTS ad_accounts (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    name TEXT NOT NULL,
    external_id TEXT,
    status TEXT NOT NULL,
    organization_id TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    created_by TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (id, team_id),
    FOREIGN KEY (organization_id, team_id) REFERENCES organizations(id, team_id)
);

CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    name TEXT NOT NULL,
    external_id TEXT,
    status TEXT NOT NULL,
    origin_organization_id TEXT NOT NULL,
    current_organization_id TEXT,
    current_ad_account_id TEXT,
    current_manager_id TEXT,
    current_profile_id TEXT,
    usage_started_on TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    created_by TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (origin_organization_id, team_id) REFERENCES organizations(id, team_id),
    FOREIGN KEY (current_organization_id, team_id) REFERENCES organizations(id, team_id),
    FOREIGN KEY (current_ad_account_id, team_id) REFERENCES ad_accounts(id, team_id),
    FOREIGN KEY (current_manager_id, team_id) REFERENCES team_members(id, team_id),
    FOREIGN KEY (current_profile_id, team_id) REFERENCES profiles(id, team_id)
);

CREATE TABLE IF NOT EXISTS profile_organizations (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    profile_id TEXT NOT NULL,
    organization_id TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (profile_id, organization_id, role),
    FOREIGN KEY (profile_id, team_id) REFERENCES profiles(id, team_id),
    FOREIGN KEY (organization_id, team_id) REFERENCES organizations(id, team_id)
);

CREATE TABLE IF NOT EXISTS activity_log (
    id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    action_type TEXT NOT NULL,
    changes TEXT NOT NULL,
    actor_name TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_entity
    ON activity_log(team_id, entity_type, entity_id, created_at);
CREATE INDEX IF NOT EXISTS idx_pages_team ON pages(team_id);
CREATE INDEX IF NOT EXISTS idx_ad_accounts_team ON ad_accounts(team_id);
"#;

/// SQLite-backed store. One connection behind a mutex; every call is one
/// statement or one transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("connection mutex poisoned".to_string()))
    }

    /// Insert or replace a team member. Members are managed outside the desk.
    pub fn upsert_team_member(&self, member: &TeamMember) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO team_members (id, team_id, name, email, role)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 team_id = excluded.team_id,
                 name = excluded.name,
                 email = excluded.email,
                 role = excluded.role",
            params![
                member.id.to_string(),
                member.team_id.to_string(),
                member.name,
                member.email,
                member.role.to_string()
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn conversion_error(idx: usize, msg: impl Into<String>) -> rusqlite::Error {
    let msg: String = msg.into();
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn uuid_col(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn opt_uuid_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| Uuid::parse_str(&r).map_err(|e| conversion_error(idx, e.to_string())))
        .transpose()
}

fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn opt_date_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| NaiveDate::from_str(&r).map_err(|e| conversion_error(idx, e.to_string())))
        .transpose()
}

fn ts_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn enum_col<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn json_col<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn tags_to_sql(tags: &[String]) -> StoreResult<String> {
    serde_json::to_string(tags).map_err(|e| StoreError::Backend(e.to_string()))
}

fn opt_to_sql<T: ToString>(value: &Option<T>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

fn json_to_sql(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Turn a rusqlite failure into a store error, recognizing foreign-key violations.
fn map_write_error(e: rusqlite::Error, asset_type: AssetType) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            StoreError::referenced(
                asset_type,
                message.clone().unwrap_or_else(|| "FOREIGN KEY constraint failed".to_string()),
            )
        }
        _ => StoreError::from(e),
    }
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Apply a sparse patch: the serialized patch keys are the column names.
fn update_rows<P: Serialize>(
    conn: &Connection,
    table: &str,
    asset_type: AssetType,
    team_id: Uuid,
    ids: &[Uuid],
    patch: &P,
) -> StoreResult<()> {
    let fields = match serde_json::to_value(patch) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => return Err(StoreError::Backend("patch is not an object".to_string())),
        Err(e) => return Err(StoreError::Backend(e.to_string())),
    };
    if fields.is_empty() || ids.is_empty() {
        return Ok(());
    }

    let mut values: Vec<SqlValue> = Vec::with_capacity(fields.len() + ids.len() + 1);
    let mut assignments = Vec::with_capacity(fields.len());
    for (column, value) in &fields {
        values.push(json_to_sql(value));
        assignments.push(format!("{} = ?{}", column, values.len()));
    }
    values.push(SqlValue::Text(team_id.to_string()));
    let team_idx = values.len();
    let id_start = values.len() + 1;
    values.extend(ids.iter().map(|id| SqlValue::Text(id.to_string())));

    let sql = format!(
        "UPDATE {} SET {} WHERE team_id = ?{} AND id IN ({})",
        table,
        assignments.join(", "),
        team_idx,
        placeholders(id_start, ids.len())
    );
    conn.execute(&sql, params_from_iter(values))
        .map_err(|e| map_write_error(e, asset_type))?;
    Ok(())
}

fn delete_rows(
    conn: &Connection,
    table: &str,
    asset_type: AssetType,
    team_id: Uuid,
    ids: &[Uuid],
) -> StoreResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut values = vec![team_id.to_string()];
    values.extend(ids.iter().map(|id| id.to_string()));
    let sql = format!(
        "DELETE FROM {} WHERE team_id = ?1 AND id IN ({})",
        table,
        placeholders(2, ids.len())
    );
    conn.execute(&sql, params_from_iter(values))
        .map_err(|e| map_write_error(e, asset_type))?;
    Ok(())
}

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: uuid_col(row, 0)?,
        team_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        profile_url: row.get(4)?,
        status: enum_col(row, 5)?,
        received_at: date_col(row, 6)?,
        blocked_at: opt_date_col(row, 7)?,
        tags: json_col(row, 8)?,
        created_by: opt_uuid_col(row, 9)?,
        created_at: ts_col(row, 10)?,
    })
}

fn organization_from_row(row: &Row) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: uuid_col(row, 0)?,
        team_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        external_id: row.get(3)?,
        tags: json_col(row, 4)?,
        created_by: opt_uuid_col(row, 5)?,
        created_at: ts_col(row, 6)?,
    })
}

fn ad_account_from_row(row: &Row) -> rusqlite::Result<AdAccount> {
    Ok(AdAccount {
        id: uuid_col(row, 0)?,
        team_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        external_id: row.get(3)?,
        status: enum_col(row, 4)?,
        organization_id: opt_uuid_col(row, 5)?,
        organization_name: row.get(6)?,
        tags: json_col(row, 7)?,
        created_by: opt_uuid_col(row, 8)?,
        created_at: ts_col(row, 9)?,
    })
}

fn page_from_row(row: &Row) -> rusqlite::Result<Page> {
    Ok(Page {
        id: uuid_col(row, 0)?,
        team_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        external_id: row.get(3)?,
        status: enum_col(row, 4)?,
        origin_organization_id: uuid_col(row, 5)?,
        origin_organization_name: row.get(6)?,
        current_organization_id: opt_uuid_col(row, 7)?,
        current_organization_name: row.get(8)?,
        current_ad_account_id: opt_uuid_col(row, 9)?,
        current_ad_account_name: row.get(10)?,
        current_manager_id: opt_uuid_col(row, 11)?,
        current_manager_name: row.get(12)?,
        current_profile_id: opt_uuid_col(row, 13)?,
        current_profile_name: row.get(14)?,
        usage_started_on: opt_date_col(row, 15)?,
        tags: json_col(row, 16)?,
        created_by: opt_uuid_col(row, 17)?,
        created_at: ts_col(row, 18)?,
    })
}

fn link_from_row(row: &Row) -> rusqlite::Result<ProfileOrganizationLink> {
    Ok(ProfileOrganizationLink {
        id: uuid_col(row, 0)?,
        team_id: uuid_col(row, 1)?,
        profile_id: uuid_col(row, 2)?,
        organization_id: uuid_col(row, 3)?,
        role: enum_col(row, 4)?,
        organization_name: row.get(5)?,
        created_at: ts_col(row, 6)?,
    })
}

fn activity_from_row(row: &Row) -> rusqlite::Result<ActivityLogEntry> {
    Ok(ActivityLogEntry {
        id: uuid_col(row, 0)?,
        team_id: uuid_col(row, 1)?,
        entity_type: enum_col(row, 2)?,
        entity_id: row.get(3)?,
        action_type: enum_col(row, 4)?,
        changes: json_col(row, 5)?,
        actor_name: row.get(6)?,
        created_at: ts_col(row, 7)?,
    })
}

fn query_rows<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    map: impl FnMut(&Row) -> rusqlite::Result<T>,
) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[async_trait]
impl AssetStore for SqliteStore {
    // ========================================================================
    // Profiles
    // ========================================================================

    async fn list_profiles(&self, team_id: Uuid) -> StoreResult<Vec<Profile>> {
        let conn = self.conn()?;
        query_rows(
            &conn,
            "SELECT id, team_id, name, email, profile_url, status, received_at, blocked_at,
                    tags, created_by, created_at
             FROM profiles WHERE team_id = ?1 ORDER BY created_at DESC",
            params![team_id.to_string()],
            profile_from_row,
        )
    }

    async fn create_profiles(&self, team_id: Uuid, rows: &[Profile]) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for row in rows {
            tx.execute(
                "INSERT INTO profiles (id, team_id, name, email, profile_url, status, received_at,
                                       blocked_at, tags, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    row.id.to_string(),
                    team_id.to_string(),
                    row.name,
                    row.email,
                    row.profile_url,
                    row.status.to_string(),
                    row.received_at.to_string(),
                    opt_to_sql(&row.blocked_at),
                    tags_to_sql(&row.tags)?,
                    opt_to_sql(&row.created_by),
                    ts_to_sql(&row.created_at)
                ],
            )
            .map_err(|e| map_write_error(e, AssetType::Profile))?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn update_profiles(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &ProfilePatch,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        update_rows(&conn, "profiles", AssetType::Profile, team_id, ids, patch)
    }

    async fn delete_profiles(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        let conn = self.conn()?;
        delete_rows(&conn, "profiles", AssetType::Profile, team_id, ids)
    }

    // ========================================================================
    // Organizations
    // ========================================================================

    async fn list_organizations(&self, team_id: Uuid) -> StoreResult<Vec<Organization>> {
        let conn = self.conn()?;
        query_rows(
            &conn,
            "SELECT id, team_id, name, external_id, tags, created_by, created_at
             FROM organizations WHERE team_id = ?1 ORDER BY created_at DESC",
            params![team_id.to_string()],
            organization_from_row,
        )
    }

    async fn create_organizations(&self, team_id: Uuid, rows: &[Organization]) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for row in rows {
            tx.execute(
                "INSERT INTO organizations
                     (id, team_id, name, external_id, tags, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.id.to_string(),
                    team_id.to_string(),
                    row.name,
                    row.external_id,
                    tags_to_sql(&row.tags)?,
                    opt_to_sql(&row.created_by),
                    ts_to_sql(&row.created_at)
                ],
            )
            .map_err(|e| map_write_error(e, AssetType::Organization))?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn update_organizations(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &OrganizationPatch,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        update_rows(&conn, "organizations", AssetType::Organization, team_id, ids, patch)
    }

    async fn delete_organizations(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        let conn = self.conn()?;
        delete_rows(&conn, "organizations", AssetType::Organization, team_id, ids)
    }

    // ========================================================================
    // Ad accounts
    // ========================================================================

    async fn list_ad_accounts(&self, team_id: Uuid) -> StoreResult<Vec<AdAccount>> {
        let conn = self.conn()?;
        query_rows(
            &conn,
            "SELECT a.id, a.team_id, a.name, a.external_id, a.status, a.organization_id, o.name,
                    a.tags, a.created_by, a.created_at
             FROM ad_accounts a
             LEFT JOIN organizations o ON o.id = a.organization_id AND o.team_id = a.team_id
             WHERE a.team_id = ?1 ORDER BY a.created_at DESC",
            params![team_id.to_string()],
            ad_account_from_row,
        )
    }

    async fn create_ad_accounts(&self, team_id: Uuid, rows: &[AdAccount]) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for row in rows {
            tx.execute(
                "INSERT INTO ad_accounts (id, team_id, name, external_id, status, organization_id,
                                          tags, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.id.to_string(),
                    team_id.to_string(),
                    row.name,
                    row.external_id,
                    row.status.to_string(),
                    opt_to_sql(&row.organization_id),
                    tags_to_sql(&row.tags)?,
                    opt_to_sql(&row.created_by),
                    ts_to_sql(&row.created_at)
                ],
            )
            .map_err(|e| map_write_error(e, AssetType::AdAccount))?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn update_ad_accounts(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &AdAccountPatch,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        update_rows(&conn, "ad_accounts", AssetType::AdAccount, team_id, ids, patch)
    }

    async fn delete_ad_accounts(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        let conn = self.conn()?;
        delete_rows(&conn, "ad_accounts", AssetType::AdAccount, team_id, ids)
    }

    // ========================================================================
    // Pages
    // ========================================================================

    async fn list_pages(&self, team_id: Uuid) -> StoreResult<Vec<Page>> {
        let conn = self.conn()?;
        query_rows(
            &conn,
            "SELECT p.id, p.team_id, p.name, p.external_id, p.status,
                    p.origin_organization_id, oo.name,
                    p.current_organization_id, co.name,
                    p.current_ad_account_id, aa.name,
                    p.current_manager_id, tm.name,
                    p.current_profile_id, pr.name,
                    p.usage_started_on, p.tags, p.created_by, p.created_at
             FROM pages p
             LEFT JOIN organizations oo
                    ON oo.id = p.origin_organization_id AND oo.team_id = p.team_id
             LEFT JOIN organizations co
                    ON co.id = p.current_organization_id AND co.team_id = p.team_id
             LEFT JOIN ad_accounts aa
                    ON aa.id = p.current_ad_account_id AND aa.team_id = p.team_id
             LEFT JOIN team_members tm
                    ON tm.id = p.current_manager_id AND tm.team_id = p.team_id
             LEFT JOIN profiles pr
                    ON pr.id = p.current_profile_id AND pr.team_id = p.team_id
             WHERE p.team_id = ?1 ORDER BY p.created_at DESC",
            params![team_id.to_string()],
            page_from_row,
        )
    }

    async fn create_pages(&self, team_id: Uuid, rows: &[Page]) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for row in rows {
            tx.execute(
                "INSERT INTO pages (id, team_id, name, external_id, status, origin_organization_id,
                                    current_organization_id, current_ad_account_id,
                                    current_manager_id, current_profile_id, usage_started_on,
                                    tags, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    row.id.to_string(),
                    team_id.to_string(),
                    row.name,
                    row.external_id,
                    row.status.to_string(),
                    row.origin_organization_id.to_string(),
                    opt_to_sql(&row.current_organization_id),
                    opt_to_sql(&row.current_ad_account_id),
                    opt_to_sql(&row.current_manager_id),
                    opt_to_sql(&row.current_profile_id),
                    opt_to_sql(&row.usage_started_on),
                    tags_to_sql(&row.tags)?,
                    opt_to_sql(&row.created_by),
                    ts_to_sql(&row.created_at)
                ],
            )
            .map_err(|e| map_write_error(e, AssetType::Page))?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn update_pages(
        &self,
        team_id: Uuid,
        ids: &[Uuid],
        patch: &PagePatch,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        update_rows(&conn, "pages", AssetType::Page, team_id, ids, patch)
    }

    async fn delete_pages(&self, team_id: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        let conn = self.conn()?;
        delete_rows(&conn, "pages", AssetType::Page, team_id, ids)
    }

    // ========================================================================
    // Links
    // ========================================================================

    async fn list_profile_links(
        &self,
        team_id: Uuid,
        profile_id: Option<Uuid>,
    ) -> StoreResult<Vec<ProfileOrganizationLink>> {
        let conn = self.conn()?;
        query_rows(
            &conn,
            "SELECT l.id, l.team_id, l.profile_id, l.organization_id, l.role, o.name, l.created_at
             FROM profile_organizations l
             LEFT JOIN organizations o ON o.id = l.organization_id AND o.team_id = l.team_id
             WHERE l.team_id = ?1 AND (?2 IS NULL OR l.profile_id = ?2)
             ORDER BY l.created_at DESC",
            params![team_id.to_string(), opt_to_sql(&profile_id)],
            link_from_row,
        )
    }

    async fn create_profile_link(
        &self,
        team_id: Uuid,
        link: &ProfileOrganizationLink,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO profile_organizations
                 (id, team_id, profile_id, organization_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                link.id.to_string(),
                team_id.to_string(),
                link.profile_id.to_string(),
                link.organization_id.to_string(),
                link.role.to_string(),
                ts_to_sql(&link.created_at)
            ],
        )
        .map_err(|e| map_write_error(e, AssetType::Profile))?;
        Ok(())
    }

    async fn delete_profile_link(&self, team_id: Uuid, id: Uuid) -> StoreResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM profile_organizations WHERE team_id = ?1 AND id = ?2",
            params![team_id.to_string(), id.to_string()],
        )?;
        if deleted == 0 {
            return Err(StoreError::not_found("link", id));
        }
        Ok(())
    }

    // ========================================================================
    // Team members
    // ========================================================================

    async fn list_team_members(&self, team_id: Uuid) -> StoreResult<Vec<TeamMember>> {
        let conn = self.conn()?;
        query_rows(
            &conn,
            "SELECT id, team_id, name, email, role FROM team_members
             WHERE team_id = ?1 ORDER BY name",
            params![team_id.to_string()],
            |row| {
                Ok(TeamMember {
                    id: uuid_col(row, 0)?,
                    team_id: uuid_col(row, 1)?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                    role: enum_col(row, 4)?,
                })
            },
        )
    }

    // ========================================================================
    // Activity log
    // ========================================================================

    async fn append_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO activity_log (id, team_id, entity_type, entity_id, action_type, changes,
                                       actor_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id.to_string(),
                entry.team_id.to_string(),
                entry.entity_type.to_string(),
                entry.entity_id,
                entry.action_type.to_string(),
                entry.changes.to_string(),
                entry.actor_name,
                ts_to_sql(&entry.created_at)
            ],
        )?;
        Ok(())
    }

    async fn query_activity(
        &self,
        team_id: Uuid,
        query: &ActivityQuery,
    ) -> StoreResult<Vec<ActivityLogEntry>> {
        let conn = self.conn()?;
        query_rows(
            &conn,
            "SELECT id, team_id, entity_type, entity_id, action_type, changes, actor_name,
                    created_at
             FROM activity_log
             WHERE team_id = ?1
               AND (?2 IS NULL OR entity_type = ?2)
               AND (?3 IS NULL OR entity_id = ?3)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?4",
            params![
                team_id.to_string(),
                opt_to_sql(&query.entity_type),
                query.entity_id,
                query.effective_limit() as i64
            ],
            activity_from_row,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::models::ActionType;
    use crate::context::Role;
    use crate::test_helpers::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("desk.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_roundtrip_profile_fields() {
        let (_dir, store) = store();
        let team = Uuid::new_v4();
        let mut profile = test_profile(team, "Joana");
        profile.status = ProfileStatus::Blocked;
        profile.blocked_at = NaiveDate::from_ymd_opt(2024, 2, 29);
        profile.tags = vec!["vip".into(), "reserve".into()];
        store.create_profiles(team, &[profile.clone()]).await.unwrap();

        let rows = store.list_profiles(team).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ProfileStatus::Blocked);
        assert_eq!(rows[0].blocked_at, profile.blocked_at);
        assert_eq!(rows[0].tags, profile.tags);
        assert!(store.list_profiles(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_page_joins_and_sparse_update() {
        let (_dir, store) = store();
        let team = Uuid::new_v4();
        let manager = test_team_member(team, "Marta", Role::Member);
        store.upsert_team_member(&manager).unwrap();
        let org = test_organization(team, "Origin");
        store.create_organizations(team, &[org.clone()]).await.unwrap();
        let page = test_page(team, "Recipes", &org);
        store.create_pages(team, &[page.clone()]).await.unwrap();

        let patch = PagePatch {
            status: Some(PageStatus::InUse),
            current_organization_id: Some(Some(org.id)),
            current_manager_id: Some(Some(manager.id)),
            ..Default::default()
        };
        store.update_pages(team, &[page.id], &patch).await.unwrap();

        let rows = store.list_pages(team).await.unwrap();
        let row = &rows[0];
        assert_eq!(row.name, "Recipes");
        assert_eq!(row.status, PageStatus::InUse);
        assert_eq!(row.origin_organization_name.as_deref(), Some("Origin"));
        assert_eq!(row.current_organization_name.as_deref(), Some("Origin"));
        assert_eq!(row.current_manager_name.as_deref(), Some("Marta"));

        let mut clear = PagePatch {
            status: Some(PageStatus::Down),
            ..Default::default()
        };
        clear.clear_usage();
        store.update_pages(team, &[page.id], &clear).await.unwrap();
        let rows = store.list_pages(team).await.unwrap();
        assert!(rows[0].current_organization_id.is_none());
        assert!(rows[0].current_manager_id.is_none());
    }

    #[tokio::test]
    async fn test_foreign_key_violation_is_referential() {
        let (_dir, store) = store();
        let team = Uuid::new_v4();
        let org = test_organization(team, "BM");
        store.create_organizations(team, &[org.clone()]).await.unwrap();
        store
            .create_ad_accounts(team, &[test_ad_account(team, "acc", Some(&org))])
            .await
            .unwrap();

        let err = store.delete_organizations(team, &[org.id]).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ReferentialIntegrity {
                asset_type: AssetType::Organization,
                ..
            }
        ));
        assert_eq!(store.list_organizations(team).await.unwrap().len(), 1);

        let ghost = test_organization(team, "ghost");
        let err = store
            .create_pages(team, &[test_page(team, "p", &ghost)])
            .await
            .unwrap_err();
        assert!(err.is_referential());
    }

    #[tokio::test]
    async fn test_links_and_profile_delete_guard() {
        let (_dir, store) = store();
        let team = Uuid::new_v4();
        let org = test_organization(team, "BM");
        let profile = test_profile(team, "P");
        store.create_organizations(team, &[org.clone()]).await.unwrap();
        store.create_profiles(team, &[profile.clone()]).await.unwrap();

        let link = test_link(team, &profile, &org, LinkRole::Advertiser);
        store.create_profile_link(team, &link).await.unwrap();
        let links = store.list_profile_links(team, Some(profile.id)).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].organization_name.as_deref(), Some("BM"));

        assert!(store
            .delete_profiles(team, &[profile.id])
            .await
            .unwrap_err()
            .is_referential());

        store.delete_profile_link(team, link.id).await.unwrap();
        store.delete_profiles(team, &[profile.id]).await.unwrap();
        assert!(matches!(
            store.delete_profile_link(team, link.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cross_team_references_are_rejected() {
        let (_dir, store) = store();
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let foreign_org = test_organization(team_b, "Team B BM");
        let foreign_profile = test_profile(team_b, "Team B profile");
        let foreign_member = test_team_member(team_b, "Bruno", Role::Member);
        store.create_organizations(team_b, &[foreign_org.clone()]).await.unwrap();
        store.create_profiles(team_b, &[foreign_profile.clone()]).await.unwrap();
        store.upsert_team_member(&foreign_member).unwrap();

        let err = store
            .create_pages(team_a, &[test_page(team_a, "Hijack", &foreign_org)])
            .await
            .unwrap_err();
        assert!(err.is_referential());
        let err = store
            .create_ad_accounts(team_a, &[test_ad_account(team_a, "acc", Some(&foreign_org))])
            .await
            .unwrap_err();
        assert!(err.is_referential());

        let own_org = test_organization(team_a, "Team A BM");
        let own_profile = test_profile(team_a, "Team A profile");
        store.create_organizations(team_a, &[own_org.clone()]).await.unwrap();
        store.create_profiles(team_a, &[own_profile.clone()]).await.unwrap();
        let err = store
            .create_profile_link(
                team_a,
                &test_link(team_a, &own_profile, &foreign_org, LinkRole::Administrator),
            )
            .await
            .unwrap_err();
        assert!(err.is_referential());

        let page = test_page(team_a, "Own page", &own_org);
        store.create_pages(team_a, &[page.clone()]).await.unwrap();
        for patch in [
            PagePatch {
                current_organization_id: Some(Some(foreign_org.id)),
                ..Default::default()
            },
            PagePatch {
                current_manager_id: Some(Some(foreign_member.id)),
                ..Default::default()
            },
            PagePatch {
                current_profile_id: Some(Some(foreign_profile.id)),
                ..Default::default()
            },
        ] {
            let err = store.update_pages(team_a, &[page.id], &patch).await.unwrap_err();
            assert!(err.is_referential());
        }

        let rows = store.list_pages(team_a).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].current_organization_id.is_none());
        assert!(rows[0].current_manager_name.is_none());
        assert!(store.list_ad_accounts(team_a).await.unwrap().is_empty());

        // Nothing in team A holds on to team B's rows
        store.delete_organizations(team_b, &[foreign_org.id]).await.unwrap();
        store.delete_profiles(team_b, &[foreign_profile.id]).await.unwrap();
    }

    #[tokio::test]
    async fn test_activity_roundtrip_keeps_wire_shape() {
        let (_dir, store) = store();
        let team = Uuid::new_v4();
        let target = AssetRef::new(AssetType::Page, Uuid::new_v4());
        let changes = json!({"status": {"old": "available", "new": "in_use"}});
        let entry = ActivityLogEntry::new(
            team,
            target,
            ActionType::Update,
            changes.clone(),
            Some("Ana".into()),
        );
        store.append_activity(&entry).await.unwrap();

        let rows = store
            .query_activity(team, &ActivityQuery::for_entity(target))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].changes, changes);
        assert_eq!(rows[0].action_type, ActionType::Update);
        assert_eq!(rows[0].actor_name.as_deref(), Some("Ana"));
    }
}
