//! SQLite database connection and schema management
//!
//! Single-connection wrapper shared by every component. WAL mode lets
//! leaderboard/calendar reads proceed alongside progression writes; the
//! mutex serializes writers so row-level races (double lesson completion,
//! concurrent same-day activity) cannot interleave.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{EngineError, Result};

/// Database wrapper shared by all engine components
#[derive(Clone)]
pub struct EngineDb {
    conn: Arc<Mutex<Connection>>,
}

impl EngineDb {
    /// Open or create the engine database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::StorageUnavailable(format!(
                    "Cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path)?;

        // WAL for concurrent readers alongside the single writer
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and ephemeral deployments
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Get a reference to the connection. All component reads and writes
    /// go through this guard.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("Engine DB lock poisoned")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()?;
        Ok(())
    }

    /// Run any pending migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);

        // Migration 2: per-award day bucket for windowed XP queries
        if version < 2 {
            let has_day_bucket: bool = conn
                .prepare(
                    "SELECT COUNT(*) FROM pragma_table_info('xp_events') WHERE name = 'day_bucket'",
                )
                .and_then(|mut s| s.query_row([], |r| r.get::<_, i32>(0)))
                .map(|c| c > 0)
                .unwrap_or(false);

            if !has_day_bucket {
                conn.execute_batch(
                    r#"
                    ALTER TABLE xp_events ADD COLUMN day_bucket TEXT NOT NULL DEFAULT '';
                    CREATE INDEX IF NOT EXISTS idx_xp_day ON xp_events(day_bucket);
                    "#,
                )?;
            }

            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
        }

        Ok(())
    }

    /// Delete all progress and gamification data (reset to empty state)
    pub fn reset_all(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            r#"
            DELETE FROM content_progress;
            DELETE FROM course_enrollments;
            DELETE FROM lesson_progress;
            DELETE FROM user_streaks;
            DELETE FROM xp_events;
            DELETE FROM activity_days;
            "#,
        )?;
        Ok(())
    }
}

/// SQL schema for the engine database
const SCHEMA_SQL: &str = r#"
-- Fractional progress per (user, content)
CREATE TABLE IF NOT EXISTS content_progress (
    user_id TEXT NOT NULL,
    content_id TEXT NOT NULL,
    progress_percent REAL NOT NULL DEFAULT 0,
    last_position TEXT,
    time_spent_seconds INTEGER NOT NULL DEFAULT 0,
    started_at INTEGER NOT NULL,
    last_viewed_at INTEGER NOT NULL,
    completed_at INTEGER,
    PRIMARY KEY (user_id, content_id)
);
CREATE INDEX IF NOT EXISTS idx_content_user ON content_progress(user_id);

-- One enrollment row per (user, course), created once
CREATE TABLE IF NOT EXISTS course_enrollments (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    course_id TEXT NOT NULL,
    progress_percent INTEGER NOT NULL DEFAULT 0,
    current_lesson_id TEXT,
    enrolled_at INTEGER NOT NULL,
    completed_at INTEGER,
    UNIQUE (user_id, course_id)
);
CREATE INDEX IF NOT EXISTS idx_enroll_user ON course_enrollments(user_id);

-- Terminal completion flag per (user, lesson)
CREATE TABLE IF NOT EXISTS lesson_progress (
    user_id TEXT NOT NULL,
    lesson_id TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    completed_at INTEGER,
    PRIMARY KEY (user_id, lesson_id)
);

-- Daily-activity streak, exactly one row per user
CREATE TABLE IF NOT EXISTS user_streaks (
    user_id TEXT PRIMARY KEY,
    current_streak INTEGER NOT NULL DEFAULT 0,
    longest_streak INTEGER NOT NULL DEFAULT 0,
    last_active_day TEXT,
    updated_at INTEGER
);

-- Append-only XP award ledger; totals and windows are derived on read
CREATE TABLE IF NOT EXISTS xp_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    amount INTEGER NOT NULL,
    reason TEXT NOT NULL,
    occurred_at INTEGER NOT NULL,
    day_bucket TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_xp_user ON xp_events(user_id);
CREATE INDEX IF NOT EXISTS idx_xp_day ON xp_events(day_bucket);

-- Per-day qualifying-event counts, raw material for the heatmap
CREATE TABLE IF NOT EXISTS activity_days (
    user_id TEXT NOT NULL,
    day_bucket TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, day_bucket)
);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (2);
"#;
