//! locbot-storage: SQLite-based event store.
//!
//! Holds members, location check-ins, registered groups and the per-group
//! allow-list. Check-in timestamps are stored as fixed-width RFC 3339 UTC
//! strings so that lexicographic `BETWEEN` matches chronological order.

pub mod access;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;

use locbot_types::{CheckIn, GroupInfo, Member};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Blocking task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Corrupt timestamp in database: {0}")]
    Timestamp(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS members (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL,
        member_id INTEGER NOT NULL,
        handle TEXT,
        given_name TEXT,
        family_name TEXT,
        UNIQUE (group_id, member_id)
    );

    CREATE TABLE IF NOT EXISTS checkins (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id INTEGER NOT NULL,
        member_id INTEGER NOT NULL,
        timestamp_utc TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_checkins_group_time
        ON checkins (group_id, timestamp_utc);

    CREATE TABLE IF NOT EXISTS groups (
        group_id INTEGER PRIMARY KEY,
        title TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS allowed (
        group_id INTEGER NOT NULL,
        member_id INTEGER NOT NULL,
        PRIMARY KEY (group_id, member_id)
    );
";

/// Encode a UTC instant as a fixed-width, zero-padded string.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::Timestamp(s.to_string()))
}

/// Everything a single report build reads, captured under one lock.
#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
    /// Members of the group in first-seen order.
    pub members: Vec<Member>,
    /// Allow-list at read time.
    pub allowed: HashSet<i64>,
    /// Check-in counts per member inside the requested range.
    pub counts: HashMap<i64, u64>,
}

/// SQLite-based storage for locbot.
///
/// One long-lived connection; every operation acquires it for the duration
/// of a blocking task and releases it when the task ends.
#[derive(Clone)]
pub struct LocBotStorage {
    conn: Arc<Mutex<Connection>>,
}

impl LocBotStorage {
    /// Open (or create) the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("Storage opened: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await?
    }

    // ─── Members ────────────────────────────────────────────

    /// Insert a member or refresh its name fields. First-seen order is kept.
    pub async fn upsert_member(&self, member: &Member) -> Result<()> {
        let member = member.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO members (group_id, member_id, handle, given_name, family_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(group_id, member_id) DO UPDATE SET
                    handle = excluded.handle,
                    given_name = excluded.given_name,
                    family_name = excluded.family_name",
                rusqlite::params![
                    member.group_id,
                    member.member_id,
                    member.handle,
                    member.given_name,
                    member.family_name,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// List members of a group in first-seen order.
    pub async fn list_members(&self, group_id: i64) -> Result<Vec<Member>> {
        self.with_conn(move |conn| query_members(conn, group_id))
            .await
    }

    // ─── Check-ins ──────────────────────────────────────────

    /// Append a check-in. Duplicates are stored as-is.
    pub async fn insert_checkin(&self, checkin: &CheckIn) -> Result<()> {
        let checkin = checkin.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO checkins (group_id, member_id, timestamp_utc, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    checkin.group_id,
                    checkin.member_id,
                    encode_timestamp(&checkin.timestamp),
                    checkin.latitude,
                    checkin.longitude,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Check-ins of a group within `[start, end]`, oldest first.
    pub async fn list_checkins(
        &self,
        group_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT member_id, timestamp_utc, latitude, longitude FROM checkins
                 WHERE group_id = ?1 AND timestamp_utc BETWEEN ?2 AND ?3
                 ORDER BY timestamp_utc, id",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![group_id, encode_timestamp(&start), encode_timestamp(&end)],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, f64>(3)?,
                        ))
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(member_id, ts, latitude, longitude)| {
                    Ok(CheckIn {
                        group_id,
                        member_id,
                        timestamp: decode_timestamp(&ts)?,
                        latitude,
                        longitude,
                    })
                })
                .collect()
        })
        .await
    }

    /// Read members, allow-list and in-range counts for one report build
    /// while holding the connection once.
    pub async fn load_report_inputs(
        &self,
        group_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ReportInputs> {
        self.with_conn(move |conn| {
            Ok(ReportInputs {
                members: query_members(conn, group_id)?,
                allowed: access::query_allow_list(conn, group_id)?,
                counts: query_counts(conn, group_id, &start, &end)?,
            })
        })
        .await
    }

    // ─── Groups ─────────────────────────────────────────────

    /// Register a group or overwrite its title.
    pub async fn save_group(&self, group: &GroupInfo) -> Result<()> {
        let group = group.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO groups (group_id, title) VALUES (?1, ?2)
                 ON CONFLICT(group_id) DO UPDATE SET title = excluded.title",
                rusqlite::params![group.group_id, group.title],
            )?;
            Ok(())
        })
        .await
    }

    /// Get a registered group.
    pub async fn get_group(&self, group_id: i64) -> Result<Option<GroupInfo>> {
        self.with_conn(move |conn| {
            let result = conn
                .query_row(
                    "SELECT group_id, title FROM groups WHERE group_id = ?1",
                    rusqlite::params![group_id],
                    |row| {
                        Ok(GroupInfo {
                            group_id: row.get(0)?,
                            title: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(result)
        })
        .await
    }

    /// List all registered groups.
    pub async fn list_groups(&self) -> Result<Vec<GroupInfo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT group_id, title FROM groups ORDER BY group_id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(GroupInfo {
                        group_id: row.get(0)?,
                        title: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

fn query_members(conn: &Connection, group_id: i64) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT group_id, member_id, handle, given_name, family_name
         FROM members WHERE group_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![group_id], |row| {
            Ok(Member {
                group_id: row.get(0)?,
                member_id: row.get(1)?,
                handle: row.get(2)?,
                given_name: row.get(3)?,
                family_name: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_counts(
    conn: &Connection,
    group_id: i64,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<HashMap<i64, u64>> {
    let mut stmt = conn.prepare(
        "SELECT member_id, COUNT(*) FROM checkins
         WHERE group_id = ?1 AND timestamp_utc BETWEEN ?2 AND ?3
         GROUP BY member_id",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![group_id, encode_timestamp(start), encode_timestamp(end)],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64)),
        )?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}
