//! Progress Tracker
//!
//! Records fractional completion and time-spent for a single piece of
//! content per user. Progress is keyed by content id and deliberately not
//! validated against the catalog: scroll-tick updates are too frequent for
//! a catalog round-trip, and unknown ids are filtered at render time.

use rusqlite::{OptionalExtension, params};

use crate::day;
use crate::db::EngineDb;
use crate::error::{EngineError, Result};
use crate::models::ContentProgress;

/// Result of one progress write, with the facts the engine facade needs
/// to decide which events to emit.
#[derive(Debug, Clone)]
pub struct ProgressWrite {
    pub progress: ContentProgress,
    /// This write pushed the stored percent to 100 for the first time
    pub newly_completed: bool,
    /// This write counts as learning activity (percent > 0)
    pub activity: bool,
}

/// Records content progress to the database
#[derive(Clone)]
pub struct ProgressTracker {
    db: EngineDb,
}

impl ProgressTracker {
    pub fn new(db: EngineDb) -> Self {
        Self { db }
    }

    /// Upsert progress for (user, content).
    ///
    /// `percent` is clamped to [0,100]; the stored percent never
    /// decreases, so a lower report after completion is accepted without
    /// clearing `completed_at`. `time_spent_delta_secs` is additive.
    pub fn update_progress(
        &self,
        user_id: &str,
        content_id: &str,
        percent: f64,
        time_spent_delta_secs: i64,
        position: Option<serde_json::Value>,
    ) -> Result<ProgressWrite> {
        if !percent.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "progress percent must be finite, got {percent}"
            )));
        }
        if time_spent_delta_secs < 0 {
            return Err(EngineError::InvalidInput(format!(
                "time spent delta must be >= 0, got {time_spent_delta_secs}"
            )));
        }
        let clamped = percent.clamp(0.0, 100.0);
        let now = day::now_ms();
        let position_json = position
            .as_ref()
            .map(|p| serde_json::to_string(p).unwrap_or_default());

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                "SELECT progress_percent, time_spent_seconds, started_at, completed_at
                 FROM content_progress WHERE user_id = ?1 AND content_id = ?2",
                params![user_id, content_id],
                |r| {
                    Ok((
                        r.get::<_, f64>(0)?,
                        r.get::<_, i64>(1)?,
                        r.get::<_, i64>(2)?,
                        r.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .optional()?;

        let (stored_percent, time_spent, started_at, prior_completed_at) = match existing {
            Some((p, t, s, c)) => (p.max(clamped), t + time_spent_delta_secs, s, c),
            None => (clamped, time_spent_delta_secs, now, None),
        };

        let newly_completed = prior_completed_at.is_none() && stored_percent >= 100.0;
        let completed_at = prior_completed_at.or(if newly_completed { Some(now) } else { None });

        tx.execute(
            r#"INSERT INTO content_progress
               (user_id, content_id, progress_percent, last_position,
                time_spent_seconds, started_at, last_viewed_at, completed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               ON CONFLICT(user_id, content_id) DO UPDATE SET
                   progress_percent = ?3,
                   last_position = COALESCE(?4, last_position),
                   time_spent_seconds = ?5,
                   last_viewed_at = ?7,
                   completed_at = ?8"#,
            params![
                user_id,
                content_id,
                stored_percent,
                position_json,
                time_spent,
                started_at,
                now,
                completed_at,
            ],
        )?;
        tx.commit()?;

        Ok(ProgressWrite {
            progress: ContentProgress {
                user_id: user_id.to_string(),
                content_id: content_id.to_string(),
                progress_percent: stored_percent,
                last_position: position,
                time_spent_seconds: time_spent as u64,
                started_at,
                last_viewed_at: now,
                completed_at,
            },
            newly_completed,
            activity: clamped > 0.0,
        })
    }

    /// Read back stored progress, None when the user never touched the
    /// content.
    pub fn get_progress(&self, user_id: &str, content_id: &str) -> Result<Option<ContentProgress>> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT progress_percent, last_position, time_spent_seconds,
                        started_at, last_viewed_at, completed_at
                 FROM content_progress WHERE user_id = ?1 AND content_id = ?2",
                params![user_id, content_id],
                |r| {
                    Ok(ContentProgress {
                        user_id: user_id.to_string(),
                        content_id: content_id.to_string(),
                        progress_percent: r.get(0)?,
                        last_position: r
                            .get::<_, Option<String>>(1)?
                            .and_then(|s| serde_json::from_str(&s).ok()),
                        time_spent_seconds: r.get::<_, i64>(2)? as u64,
                        started_at: r.get(3)?,
                        last_viewed_at: r.get(4)?,
                        completed_at: r.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
