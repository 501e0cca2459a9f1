//! Logging service - structured auth event logging to DuckDB
//!
//! Stores session events (`login_succeeded`, `signup_partial`,
//! `session_revoked`, ...) in logs.duckdb inside the chronicles directory.
//! Identifiers, secrets, tokens and display names are never logged; an
//! event carries only its name, the backend, the command and, on failure,
//! the normalized error kind with the backend's message.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::{Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::AuthError;
use crate::log_migrations::LOG_MIGRATIONS;

const LOG_DB_FILE: &str = "logs.duckdb";
const BOOTSTRAP_MIGRATION: &str = "000_migrations.sql";

const SELECT_COLUMNS: &str = "SELECT id, timestamp, run_id, entry_point, app_version, platform, \
     event, backend, command, error_kind, error_message FROM sys_logs";

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Timestamp in the low 48 bits, per-millisecond counter in the high 16
fn generate_id() -> u64 {
    let timestamp = now_ms() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Which surface drove the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Library,
}

impl EntryPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Library => "library",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            backend: None,
            command: None,
            error_kind: None,
            error_message: None,
        }
    }

    /// Name of the identity backend involved
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// Set the command context (for CLI events)
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_error_kind(mut self, kind: impl Into<String>) -> Self {
        self.error_kind = Some(kind.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Kind and message of a normalized auth failure
    pub fn with_auth_error(self, error: &AuthError) -> Self {
        self.with_error_kind(error.kind.as_str())
            .with_error(error.message.clone())
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    /// Same for every event written by one process
    pub run_id: String,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub backend: Option<String>,
    pub command: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

impl LogEntry {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            run_id: row.get(2)?,
            entry_point: row.get(3)?,
            app_version: row.get(4)?,
            platform: row.get(5)?,
            event: row.get(6)?,
            backend: row.get(7)?,
            command: row.get(8)?,
            error_kind: row.get(9)?,
            error_message: row.get(10)?,
        })
    }
}

/// Service for structured event logging
///
/// Owns the logs.duckdb connection; safe to share between the session
/// façade and the CLI behind an `Arc`.
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    run_id: String,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create logs.duckdb in `chronicles_dir` and apply pending migrations
    pub fn new(
        chronicles_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        std::fs::create_dir_all(chronicles_dir)?;
        let db_path = chronicles_dir.join(LOG_DB_FILE);
        let conn = Connection::open(&db_path)?;

        let service = Self {
            conn: Mutex::new(conn),
            db_path,
            run_id: Uuid::new_v4().to_string(),
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        };
        service.run_migrations()?;

        Ok(service)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        let table_exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM information_schema.tables WHERE table_name = 'sys_migrations'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !table_exists {
            if let Some((name, sql)) = LOG_MIGRATIONS.iter().find(|(n, _)| *n == BOOTSTRAP_MIGRATION) {
                conn.execute_batch(sql)?;
                conn.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])?;
            }
        }

        let applied: Vec<String> = {
            let mut stmt = conn.prepare("SELECT migration_name FROM sys_migrations")?;
            let names = stmt.query_map([], |row| row.get(0))?;
            names.filter_map(|r| r.ok()).collect()
        };

        for (name, sql) in LOG_MIGRATIONS.iter().filter(|(n, _)| *n != BOOTSTRAP_MIGRATION) {
            if !applied.iter().any(|a| a == name) {
                conn.execute_batch(sql)?;
                conn.execute("INSERT INTO sys_migrations (migration_name) VALUES (?)", [name])?;
            }
        }

        Ok(())
    }

    /// Record an event; entry point, version and platform come from the service
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO sys_logs (
                id, timestamp, run_id, entry_point, app_version, platform,
                event, backend, command, error_kind, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                generate_id(),
                now_ms(),
                &self.run_id,
                self.entry_point.as_str(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.backend,
                &event.command,
                &event.error_kind,
                &event.error_message,
            ],
        )?;

        Ok(())
    }

    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    /// Log a CLI command execution
    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    pub fn log_error(&self, event: &str, kind: &str, message: &str) -> Result<()> {
        self.log(LogEvent::new(event).with_error_kind(kind).with_error(message))
    }

    fn query(&self, filter: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let sql = format!("{SELECT_COLUMNS} {filter} ORDER BY timestamp DESC, id DESC LIMIT ?");
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([limit as i64], LogEntry::from_row)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    /// Most recent entries first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("", limit)
    }

    /// Entries that carry an error
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("WHERE error_message IS NOT NULL OR error_kind IS NOT NULL", limit)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete logs older than the given unix timestamp in milliseconds
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    /// Copy the logs database to `output_path` for troubleshooting
    pub fn export(&self, output_path: &Path) -> Result<PathBuf> {
        let conn = self.conn()?;
        conn.execute_batch("CHECKPOINT")?;
        std::fs::copy(&self.db_path, output_path)?;
        Ok(output_path.to_path_buf())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}
