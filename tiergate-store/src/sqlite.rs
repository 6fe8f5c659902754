//! SQLite-backed store for memberships, usage counters and the audit log.
//!
//! Timestamps are stored as fixed-width RFC 3339 text in UTC with nanosecond
//! precision, so text order is time order and values round-trip exactly.
//! Custom limits are stored as a JSON object.

use crate::error::{StoreError, StoreResult};
use crate::traits::{MembershipStore, UsageStore, MAX_COUNT};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tiergate_types::{
    AuditEntry, AuditSink, CustomLimits, MembershipRecord, MembershipStatus, PeriodKey,
    ResourceType, Tier, UserId,
};
use tracing::{debug, warn};

const MEMBERSHIP_COLUMNS: &str = "user_id, tier, status, custom_limits, starts_at, expires_at, \
     provider_customer_ref, provider_subscription_ref";

/// Raw membership row as read from SQLite.
type MembershipRow = (
    i64,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        debug!("Opened tiergate store at {:?}", path);
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS memberships (
                user_id INTEGER PRIMARY KEY,
                tier TEXT NOT NULL,
                status TEXT NOT NULL,
                custom_limits TEXT NOT NULL DEFAULT '{}',
                starts_at TEXT NOT NULL,
                expires_at TEXT,
                provider_customer_ref TEXT,
                provider_subscription_ref TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_memberships_expiry
                ON memberships (status, expires_at);

            CREATE TABLE IF NOT EXISTS usage_counters (
                user_id INTEGER NOT NULL,
                resource_type TEXT NOT NULL,
                period_key TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                UNIQUE(user_id, resource_type, period_key)
            );

            CREATE TABLE IF NOT EXISTS resource_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                resource_type TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_resource_log_user
                ON resource_log (user_id, resource_type, created_at);

            CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                action TEXT NOT NULL,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                details TEXT NOT NULL,
                at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Audit log ────────────────────────────────────────────────

    /// Saves an audit entry.
    pub fn save_audit_entry(&self, entry: &AuditEntry) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO audit_log (id, action, target_type, target_id, details, at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id.to_string(),
                entry.action,
                entry.target_type,
                entry.target_id,
                serde_json::to_string(&entry.details)?,
                to_sql_instant(entry.at)?,
            ],
        )?;
        Ok(())
    }

    /// Loads audit entries, newest first, with pagination.
    pub fn load_audit_log(&self, limit: usize, offset: usize) -> StoreResult<Vec<AuditEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, action, target_type, target_id, details, at FROM audit_log \
             ORDER BY at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, action, target_type, target_id, details, at) = row?;
            result.push(AuditEntry {
                id: id
                    .parse()
                    .map_err(|e| StoreError::InvalidData(format!("invalid audit id: {e}")))?,
                action,
                target_type,
                target_id,
                details: serde_json::from_str(&details)?,
                at: from_sql_instant(&at)?,
            });
        }
        Ok(result)
    }

    /// Returns the total number of audit log entries.
    pub fn audit_log_count(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl MembershipStore for SqliteStore {
    fn get_membership(&self, user_id: UserId) -> StoreResult<Option<MembershipRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = ?1"),
                params![user_id.get()],
                read_membership_row,
            )
            .optional()?;
        row.map(decode_membership).transpose()
    }

    fn upsert_membership(&self, record: &MembershipRecord) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO memberships ({MEMBERSHIP_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                record.user_id.get(),
                record.tier.as_str(),
                record.status.as_str(),
                serde_json::to_string(&record.custom_limits)?,
                to_sql_instant(record.starts_at)?,
                record.expires_at.map(to_sql_instant).transpose()?,
                record.provider_customer_ref,
                record.provider_subscription_ref,
            ],
        )?;
        Ok(())
    }

    fn list_due_for_expiry(&self, now: DateTime<Utc>) -> StoreResult<Vec<MembershipRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE status = ?1 AND expires_at IS NOT NULL AND expires_at < ?2 \
             ORDER BY user_id"
        ))?;
        let rows = stmt.query_map(
            params![MembershipStatus::Active.as_str(), to_sql_instant(now)?],
            read_membership_row,
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(decode_membership(row?)?);
        }
        Ok(result)
    }

    fn transition_status(
        &self,
        user_id: UserId,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE memberships SET status = ?1 WHERE user_id = ?2 AND status = ?3",
            params![to.as_str(), user_id.get(), from.as_str()],
        )?;
        Ok(changed == 1)
    }
}

impl UsageStore for SqliteStore {
    fn record_created(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO resource_log (user_id, resource_type, created_at) VALUES (?1, ?2, ?3)",
            params![user_id.get(), resource.as_str(), to_sql_instant(at)?],
        )?;
        Ok(())
    }

    fn record_created_within(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        at: DateTime<Utc>,
        amount: u64,
        max: u64,
    ) -> StoreResult<Option<u64>> {
        let created_at = to_sql_instant(at)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current = count_records(&tx, user_id, resource, PeriodKey::containing(at))?;
        let next = match current.checked_add(amount) {
            Some(next) if next <= max.min(MAX_COUNT) => next,
            _ => {
                debug!(user_id = %user_id, resource = %resource, current, max, "record creation refused");
                return Ok(None);
            }
        };
        {
            let mut stmt = tx.prepare(
                "INSERT INTO resource_log (user_id, resource_type, created_at) VALUES (?1, ?2, ?3)",
            )?;
            for _ in 0..amount {
                stmt.execute(params![user_id.get(), resource.as_str(), created_at])?;
            }
        }
        tx.commit()?;
        Ok(Some(next))
    }

    fn count_resources(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
    ) -> StoreResult<u64> {
        let conn = self.lock()?;
        count_records(&conn, user_id, resource, period)
    }

    fn counter(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
    ) -> StoreResult<u64> {
        let conn = self.lock()?;
        read_counter(&conn, user_id, resource, period)
    }

    fn increment_counter(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
        amount: u64,
    ) -> StoreResult<u64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO usage_counters (user_id, resource_type, period_key, count) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id, resource_type, period_key) DO UPDATE SET count = \
                 CASE WHEN count > ?5 - excluded.count THEN ?5 ELSE count + excluded.count END",
            params![
                user_id.get(),
                resource.as_str(),
                period.to_string(),
                to_sql_count(amount.min(MAX_COUNT))?,
                to_sql_count(MAX_COUNT)?,
            ],
        )?;
        read_counter(&conn, user_id, resource, period)
    }

    fn increment_counter_within(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
        amount: u64,
        max: u64,
    ) -> StoreResult<Option<u64>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let current = read_counter(&tx, user_id, resource, period)?;
        let next = match current.checked_add(amount) {
            Some(next) if next <= max.min(MAX_COUNT) => next,
            _ => {
                debug!(user_id = %user_id, resource = %resource, current, max, "counter increment refused");
                return Ok(None);
            }
        };
        tx.execute(
            "INSERT INTO usage_counters (user_id, resource_type, period_key, count) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id, resource_type, period_key) DO UPDATE SET count = excluded.count",
            params![
                user_id.get(),
                resource.as_str(),
                period.to_string(),
                to_sql_count(next)?,
            ],
        )?;
        tx.commit()?;
        Ok(Some(next))
    }
}

impl AuditSink for SqliteStore {
    fn append(&self, entry: AuditEntry) {
        if let Err(e) = self.save_audit_entry(&entry) {
            warn!(action = %entry.action, "failed to persist audit entry: {}", e);
        }
    }
}

fn read_counter(
    conn: &Connection,
    user_id: UserId,
    resource: &ResourceType,
    period: PeriodKey,
) -> StoreResult<u64> {
    let count: Option<i64> = conn
        .query_row(
            "SELECT count FROM usage_counters \
             WHERE user_id = ?1 AND resource_type = ?2 AND period_key = ?3",
            params![user_id.get(), resource.as_str(), period.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count.unwrap_or(0).max(0) as u64)
}

fn count_records(
    conn: &Connection,
    user_id: UserId,
    resource: &ResourceType,
    period: PeriodKey,
) -> StoreResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM resource_log \
         WHERE user_id = ?1 AND resource_type = ?2 AND created_at >= ?3 AND created_at < ?4",
        params![
            user_id.get(),
            resource.as_str(),
            to_sql_instant(period.start())?,
            to_sql_instant(period.end())?,
        ],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

fn to_sql_count(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::InvalidData(format!("count {value} out of range")))
}

fn read_membership_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MembershipRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode_membership(row: MembershipRow) -> StoreResult<MembershipRecord> {
    let (user_id, tier, status, custom_limits, starts_at, expires_at, customer_ref, sub_ref) = row;

    let tier: Tier = tier
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("membership {user_id}: {e}")))?;
    let status: MembershipStatus = status
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("membership {user_id}: {e}")))?;
    let custom_limits: CustomLimits = serde_json::from_str(&custom_limits)?;

    Ok(MembershipRecord {
        user_id: UserId::new(user_id),
        tier,
        status,
        custom_limits,
        starts_at: from_sql_instant(&starts_at)?,
        expires_at: expires_at.as_deref().map(from_sql_instant).transpose()?,
        provider_customer_ref: customer_ref,
        provider_subscription_ref: sub_ref,
    })
}

fn to_sql_instant(at: DateTime<Utc>) -> StoreResult<String> {
    if !(0..=9999).contains(&at.year()) {
        return Err(StoreError::InvalidData(format!("timestamp out of range: {at}")));
    }
    Ok(at.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn from_sql_instant(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("invalid timestamp {raw:?}: {e}")))
}
