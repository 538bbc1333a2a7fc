//! Streak Ledger
//!
//! Maintains current/longest daily-activity streak per user from
//! "activity occurred today" signals. Decisions compare calendar days
//! only; same-day repeats never double-increment. Every call also bumps
//! the per-day activity counter that feeds the heatmap.

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};

use crate::day;
use crate::db::EngineDb;
use crate::error::Result;
use crate::models::{StreakUpdate, UserStreak};

/// Streak reads and the daily-activity update
#[derive(Clone)]
pub struct StreakLedger {
    db: EngineDb,
}

impl StreakLedger {
    pub fn new(db: EngineDb) -> Self {
        Self { db }
    }

    /// Record that qualifying activity happened on `today`.
    ///
    /// Three-way branch against the stored last-active day:
    /// same day is a no-op for the streak, exactly one day later extends
    /// it, anything else (or no prior record) restarts it at 1. The whole
    /// read-then-write runs in one transaction under the connection lock,
    /// so concurrent same-day signals cannot produce a lost update.
    pub fn record_activity(&self, user_id: &str, today: NaiveDate) -> Result<StreakUpdate> {
        let today_bucket = day::format_day(today);
        let now = day::now_ms();

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        // Heatmap counter increments on every qualifying event, including
        // same-day repeats the streak ignores.
        tx.execute(
            r#"INSERT INTO activity_days (user_id, day_bucket, count)
               VALUES (?1, ?2, 1)
               ON CONFLICT(user_id, day_bucket) DO UPDATE SET count = count + 1"#,
            params![user_id, today_bucket],
        )?;

        let existing = tx
            .query_row(
                "SELECT current_streak, longest_streak, last_active_day
                 FROM user_streaks WHERE user_id = ?1",
                params![user_id],
                |r| {
                    Ok((
                        r.get::<_, u32>(0)?,
                        r.get::<_, u32>(1)?,
                        r.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let (current, longest, last_day) = existing.unwrap_or((0, 0, None));
        let last_date = last_day.as_deref().and_then(day::parse_day);

        let update = match last_date {
            Some(last) if last == today => {
                tx.commit()?;
                return Ok(StreakUpdate::AlreadyCounted);
            }
            Some(last) if day::days_between(last, today) == 1 => {
                StreakUpdate::Extended { current: current + 1 }
            }
            _ => StreakUpdate::Started,
        };

        let new_current = match update {
            StreakUpdate::Extended { current } => current,
            _ => 1,
        };
        let new_longest = longest.max(new_current);

        tx.execute(
            r#"INSERT INTO user_streaks
               (user_id, current_streak, longest_streak, last_active_day, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(user_id) DO UPDATE SET
                   current_streak = ?2, longest_streak = ?3,
                   last_active_day = ?4, updated_at = ?5"#,
            params![user_id, new_current, new_longest, today_bucket, now],
        )?;
        tx.commit()?;

        Ok(update)
    }

    /// Current streak state; zeros for users with no recorded activity.
    pub fn get_streak(&self, user_id: &str) -> Result<UserStreak> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT current_streak, longest_streak, last_active_day
                 FROM user_streaks WHERE user_id = ?1",
                params![user_id],
                |r| {
                    Ok(UserStreak {
                        user_id: user_id.to_string(),
                        current_streak: r.get(0)?,
                        longest_streak: r.get(1)?,
                        last_active_day: r.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(row.unwrap_or_else(|| UserStreak {
            user_id: user_id.to_string(),
            ..UserStreak::default()
        }))
    }
}
