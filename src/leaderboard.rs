//! Leaderboard & Activity Aggregator
//!
//! Read-only display aggregates over the XP ledger and the per-day
//! activity counters. These queries perform no writes and may be served
//! with bounded staleness; they are never the source of truth.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{OptionalExtension, params};

use crate::day;
use crate::db::EngineDb;
use crate::error::Result;
use crate::models::{
    ActivityCalendar, ActivityDay, LeaderboardEntry, LeaderboardPage, LeaderboardPeriod,
};
use crate::xp::LevelCurve;

/// Ranked standings and heatmap queries
#[derive(Clone)]
pub struct ActivityAggregator {
    db: EngineDb,
    curve: LevelCurve,
}

impl ActivityAggregator {
    pub fn new(db: EngineDb, curve: LevelCurve) -> Self {
        Self { db, curve }
    }

    /// Top `limit` users by XP summed over `period`, plus the requesting
    /// user's own rank computed independently of the page cutoff.
    ///
    /// Ties order by ascending user id; ranks are 1-based row positions
    /// with no gaps.
    pub fn leaderboard(
        &self,
        period: LeaderboardPeriod,
        limit: u32,
        current_user: &str,
    ) -> Result<LeaderboardPage> {
        self.leaderboard_at(period, limit, current_user, day::today())
    }

    /// `leaderboard` with an explicit "now" day, for windowed tests.
    pub fn leaderboard_at(
        &self,
        period: LeaderboardPeriod,
        limit: u32,
        current_user: &str,
        now: NaiveDate,
    ) -> Result<LeaderboardPage> {
        let cutoff = period.days().map(|d| day::trailing_window_start(now, d));
        let conn = self.db.conn();

        let mut entries = Vec::new();
        {
            // Secondary sort key makes tie order deterministic
            let (sql, params_vec): (&str, Vec<&dyn rusqlite::ToSql>) = match &cutoff {
                Some(c) => (
                    "SELECT user_id, SUM(amount) AS xp FROM xp_events
                     WHERE day_bucket >= ?1
                     GROUP BY user_id ORDER BY xp DESC, user_id ASC LIMIT ?2",
                    vec![c, &limit],
                ),
                None => (
                    "SELECT user_id, SUM(amount) AS xp FROM xp_events
                     GROUP BY user_id ORDER BY xp DESC, user_id ASC LIMIT ?1",
                    vec![&limit],
                ),
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params_vec.as_slice(), |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as u64))
            })?;

            for (i, row) in rows.enumerate() {
                let (user_id, xp) = row?;
                entries.push(LeaderboardEntry {
                    rank: i as u32 + 1,
                    level: self.curve.level_for_xp(xp),
                    is_current_user: user_id == current_user,
                    user_id,
                    xp,
                });
            }
        }

        let current_user_rank = self.rank_of(&conn, current_user, cutoff.as_deref())?;

        Ok(LeaderboardPage {
            entries,
            current_user_rank,
        })
    }

    /// Rank of one user in the window, independent of any page cutoff.
    /// None when the user has no XP in the window.
    fn rank_of(
        &self,
        conn: &rusqlite::Connection,
        user_id: &str,
        cutoff: Option<&str>,
    ) -> Result<Option<u32>> {
        let my_xp: Option<u64> = match cutoff {
            Some(c) => conn
                .query_row(
                    "SELECT SUM(amount) FROM xp_events WHERE user_id = ?1 AND day_bucket >= ?2",
                    params![user_id, c],
                    |r| r.get::<_, Option<i64>>(0),
                )
                .optional()?
                .flatten()
                .map(|v| v as u64),
            None => conn
                .query_row(
                    "SELECT SUM(amount) FROM xp_events WHERE user_id = ?1",
                    params![user_id],
                    |r| r.get::<_, Option<i64>>(0),
                )
                .optional()?
                .flatten()
                .map(|v| v as u64),
        };
        let Some(my_xp) = my_xp else {
            return Ok(None);
        };

        // Users strictly ahead: higher XP, or equal XP with the winning
        // (smaller) user id.
        let ahead: i64 = match cutoff {
            Some(c) => conn.query_row(
                "SELECT COUNT(*) FROM (
                     SELECT user_id, SUM(amount) AS xp FROM xp_events
                     WHERE day_bucket >= ?1 GROUP BY user_id
                 ) WHERE xp > ?2 OR (xp = ?2 AND user_id < ?3)",
                params![c, my_xp as i64, user_id],
                |r| r.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM (
                     SELECT user_id, SUM(amount) AS xp FROM xp_events GROUP BY user_id
                 ) WHERE xp > ?1 OR (xp = ?1 AND user_id < ?2)",
                params![my_xp as i64, user_id],
                |r| r.get(0),
            )?,
        };

        Ok(Some(ahead as u32 + 1))
    }

    /// Week-aligned activity grid for one year: from the Sunday on or
    /// before Jan 1 through the Saturday on or after Dec 31. Padding days
    /// outside the year carry count 0 and are excluded from the
    /// statistics.
    pub fn activity_calendar(&self, user_id: &str, year: i32) -> Result<ActivityCalendar> {
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| crate::error::EngineError::InvalidInput(format!("bad year {year}")))?;
        let dec31 = NaiveDate::from_ymd_opt(year, 12, 31).expect("valid end of year");
        let start = day::sunday_on_or_before(jan1);
        let end = day::saturday_on_or_after(dec31);

        let counts: HashMap<String, u32> = {
            let conn = self.db.conn();
            let mut stmt = conn.prepare(
                "SELECT day_bucket, count FROM activity_days
                 WHERE user_id = ?1 AND day_bucket BETWEEN ?2 AND ?3",
            )?;
            let rows = stmt.query_map(
                params![user_id, day::format_day(jan1), day::format_day(dec31)],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as u32)),
            )?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        let mut days = Vec::new();
        let mut total_contributions = 0u64;
        let mut active_days = 0u32;
        let mut max_streak = 0u32;
        let mut run = 0u32;

        let mut date = start;
        while date <= end {
            let in_year = date.year() == year;
            let bucket = day::format_day(date);
            let count = if in_year {
                counts.get(&bucket).copied().unwrap_or(0)
            } else {
                0
            };

            if in_year {
                total_contributions += count as u64;
                if count > 0 {
                    active_days += 1;
                    run += 1;
                    max_streak = max_streak.max(run);
                } else {
                    run = 0;
                }
            }

            days.push(ActivityDay {
                date: bucket,
                count,
                in_year,
            });
            date += Duration::days(1);
        }

        Ok(ActivityCalendar {
            year,
            days,
            total_contributions,
            active_days,
            max_streak_within_year: max_streak,
        })
    }
}
