//! SQLite persistence for contacts, survey responses and the sent-message log.
//!
//! One `contacts` row per address holds the latest survey answers (joined with
//! `|`). The `messages` table is append-only, one row per outbound message.
//! The connection sits behind a mutex, so writers from concurrent surveys are
//! serialized.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{Result, SurveyError};
use crate::transport::DeliveryStatus;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Ordered schema migrations. `PRAGMA user_version` records how many have run.
const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS contacts (
        address      TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        survey_date  TEXT,
        answers      TEXT
    );
    CREATE TABLE IF NOT EXISTS messages (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        address TEXT NOT NULL,
        body    TEXT NOT NULL,
        status  TEXT NOT NULL,
        sent_at TEXT NOT NULL
    );",
    "CREATE INDEX IF NOT EXISTS idx_messages_address ON messages(address);",
];

fn run_migrations(conn: &Connection) -> Result<()> {
    let applied: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(applied.max(0) as usize) {
        conn.execute_batch(sql)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", idx + 1))?;
        tracing::debug!(version = idx + 1, "applied schema migration");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SurveyStore
// ---------------------------------------------------------------------------

/// The persistence operations the survey engine and transports depend on.
pub trait SurveyStore: Send + Sync {
    /// Upsert the latest answers for `address`, replacing any earlier response.
    fn save_response(
        &self,
        address: &str,
        display_name: &str,
        joined_answers: &str,
        answered_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Append a sent-message record and return its row id.
    fn log_message(
        &self,
        address: &str,
        text: &str,
        status: DeliveryStatus,
        sent_at: DateTime<Utc>,
    ) -> Result<i64>;
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredResponse {
    pub address: String,
    pub display_name: String,
    pub answers: String,
    pub survey_date: String,
}

impl StoredResponse {
    pub fn answer_list(&self) -> Vec<String> {
        if self.answers.is_empty() {
            return Vec::new();
        }
        self.answers.split('|').map(str::to_string).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub address: String,
    pub body: String,
    pub status: String,
    pub sent_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub messages_sent: u64,
    pub replies: u64,
    pub contacts: u64,
    pub by_status: BTreeMap<String, u64>,
}

// ---------------------------------------------------------------------------
// SurveyDb
// ---------------------------------------------------------------------------

pub struct SurveyDb {
    conn: Mutex<Connection>,
}

impl SurveyDb {
    /// Open or create the database at `path` and bring the schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SurveyError::Lock)
    }

    /// Insert the contact, or refresh its display name if it already exists.
    pub fn upsert_contact(&self, address: &str, display_name: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO contacts (address, display_name) VALUES (?1, ?2)
             ON CONFLICT(address) DO UPDATE SET display_name = excluded.display_name",
            params![address, display_name],
        )?;
        Ok(())
    }

    /// Insert two sample contacts with a message each. No-op unless the
    /// contacts table is empty. Returns whether anything was inserted.
    pub fn seed_samples(&self) -> Result<bool> {
        let mut conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM contacts", [], |r| r.get(0))?;
        if count > 0 {
            return Ok(false);
        }
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        for (address, name, answers) in [("+1234567890", "Alice", "yes"), ("+1987654321", "Bob", "no")] {
            tx.execute(
                "INSERT INTO contacts (address, display_name, survey_date, answers)
                 VALUES (?1, ?2, ?3, ?4)",
                params![address, name, now, answers],
            )?;
            tx.execute(
                "INSERT INTO messages (address, body, status, sent_at) VALUES (?1, ?2, ?3, ?4)",
                params![address, format!("Hello {name}"), DeliveryStatus::Sent.as_str(), now],
            )?;
        }
        tx.commit()?;
        Ok(true)
    }

    pub fn stats(&self) -> Result<Stats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
            Ok(n.max(0) as u64)
        };
        let mut stats = Stats {
            messages_sent: count("SELECT COUNT(*) FROM messages")?,
            replies: count("SELECT COUNT(*) FROM contacts WHERE answers IS NOT NULL")?,
            contacts: count("SELECT COUNT(*) FROM contacts")?,
            by_status: BTreeMap::new(),
        };

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM messages GROUP BY status")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        for row in rows {
            let (status, n) = row?;
            stats.by_status.insert(status, n.max(0) as u64);
        }
        Ok(stats)
    }

    /// All contacts with persisted answers, newest survey first.
    pub fn responses(&self) -> Result<Vec<StoredResponse>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT address, display_name, answers, survey_date FROM contacts
             WHERE answers IS NOT NULL ORDER BY survey_date DESC, address",
        )?;
        let rows = stmt.query_map([], row_to_response)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn response_for(&self, address: &str) -> Result<Option<StoredResponse>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT address, display_name, answers, survey_date FROM contacts
                 WHERE address = ?1 AND answers IS NOT NULL",
                params![address],
                row_to_response,
            )
            .optional()?;
        Ok(row)
    }

    pub fn messages_for(&self, address: &str) -> Result<Vec<MessageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, address, body, status, sent_at FROM messages
             WHERE address = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![address], |r| {
            Ok(MessageRecord {
                id: r.get(0)?,
                address: r.get(1)?,
                body: r.get(2)?,
                status: r.get(3)?,
                sent_at: r.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn row_to_response(r: &rusqlite::Row<'_>) -> rusqlite::Result<StoredResponse> {
    Ok(StoredResponse {
        address: r.get(0)?,
        display_name: r.get(1)?,
        answers: r.get(2)?,
        survey_date: r.get(3)?,
    })
}

impl SurveyStore for SurveyDb {
    fn save_response(
        &self,
        address: &str,
        display_name: &str,
        joined_answers: &str,
        answered_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO contacts (address, display_name, survey_date, answers)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(address) DO UPDATE SET
                display_name = excluded.display_name,
                survey_date  = excluded.survey_date,
                answers      = excluded.answers",
            params![address, display_name, answered_at.to_rfc3339(), joined_answers],
        )?;
        Ok(())
    }

    fn log_message(
        &self,
        address: &str,
        text: &str,
        status: DeliveryStatus,
        sent_at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO contacts (address, display_name) VALUES (?1, ?1)",
            params![address],
        )?;
        tx.execute(
            "INSERT INTO messages (address, body, status, sent_at) VALUES (?1, ?2, ?3, ?4)",
            params![address, text, status.as_str(), sent_at.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }
}
