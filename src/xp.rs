//! XP & Leveling Ledger
//!
//! XP accrues as an append-only log of awards; total, weekly and monthly
//! figures are all derived from the log on read. Level is a pure function
//! of total XP over a strictly increasing cumulative threshold table.

use chrono::NaiveDate;
use rusqlite::params;

use crate::day;
use crate::db::EngineDb;
use crate::error::{EngineError, Result};
use crate::models::{XpAward, XpSummary};

/// One step of the level curve.
#[derive(Debug, Clone)]
pub struct LevelBand {
    pub level: u32,
    /// Cumulative XP required to reach this level
    pub xp_required: u64,
    pub title: &'static str,
}

/// Default curve: early levels come fast, later ones stretch out.
static DEFAULT_CURVE: &[LevelBand] = &[
    LevelBand { level: 1, xp_required: 0, title: "Newcomer" },
    LevelBand { level: 2, xp_required: 50, title: "Beginner" },
    LevelBand { level: 3, xp_required: 150, title: "Student" },
    LevelBand { level: 4, xp_required: 300, title: "Student" },
    LevelBand { level: 5, xp_required: 500, title: "Learner" },
    LevelBand { level: 6, xp_required: 750, title: "Learner" },
    LevelBand { level: 7, xp_required: 1000, title: "Scholar" },
    LevelBand { level: 8, xp_required: 1400, title: "Scholar" },
    LevelBand { level: 9, xp_required: 1900, title: "Scholar" },
    LevelBand { level: 10, xp_required: 2500, title: "Expert" },
    LevelBand { level: 11, xp_required: 3200, title: "Expert" },
    LevelBand { level: 12, xp_required: 4000, title: "Expert" },
    LevelBand { level: 13, xp_required: 5000, title: "Mentor" },
    LevelBand { level: 14, xp_required: 6500, title: "Mentor" },
    LevelBand { level: 15, xp_required: 8000, title: "Master" },
    LevelBand { level: 16, xp_required: 10000, title: "Master" },
    LevelBand { level: 17, xp_required: 12500, title: "Master" },
    LevelBand { level: 18, xp_required: 15000, title: "Sage" },
    LevelBand { level: 19, xp_required: 18000, title: "Sage" },
    LevelBand { level: 20, xp_required: 22000, title: "Legend" },
];

/// Monotonic XP-to-level curve. The default table is the crate's fixed
/// curve; custom tables exist for deployments that tune leveling.
#[derive(Debug, Clone)]
pub struct LevelCurve {
    bands: Vec<LevelBand>,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            bands: DEFAULT_CURVE.to_vec(),
        }
    }
}

impl LevelCurve {
    /// Build a curve from ascending cumulative thresholds, where
    /// `thresholds[0]` belongs to level 1 and must be 0.
    pub fn from_thresholds(thresholds: &[u64]) -> Result<Self> {
        if thresholds.first() != Some(&0) {
            return Err(EngineError::InvalidInput(
                "level curve must start at threshold 0".to_string(),
            ));
        }
        if !thresholds.windows(2).all(|w| w[0] < w[1]) {
            return Err(EngineError::InvalidInput(
                "level curve thresholds must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            bands: thresholds
                .iter()
                .enumerate()
                .map(|(i, &xp)| LevelBand {
                    level: i as u32 + 1,
                    xp_required: xp,
                    title: "",
                })
                .collect(),
        })
    }

    /// Largest level whose threshold is <= `total_xp`.
    pub fn band_for_xp(&self, total_xp: u64) -> &LevelBand {
        self.bands
            .iter()
            .rev()
            .find(|b| total_xp >= b.xp_required)
            .unwrap_or(&self.bands[0])
    }

    pub fn level_for_xp(&self, total_xp: u64) -> u32 {
        self.band_for_xp(total_xp).level
    }

    /// Threshold of the level after `level`, None at the top.
    pub fn next_threshold(&self, level: u32) -> Option<u64> {
        self.bands
            .iter()
            .find(|b| b.level == level + 1)
            .map(|b| b.xp_required)
    }
}

/// Append-only XP ledger with derived summaries
#[derive(Clone)]
pub struct XpLedger {
    db: EngineDb,
    curve: LevelCurve,
}

impl XpLedger {
    pub fn new(db: EngineDb, curve: LevelCurve) -> Self {
        Self { db, curve }
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    /// Append one XP award. `amount` must be positive; there is no
    /// deduction path. `level_up` reports whether the award crossed at
    /// least one level boundary, never how many.
    pub fn award_xp(
        &self,
        user_id: &str,
        amount: u32,
        reason: &str,
        occurred_at: i64,
    ) -> Result<XpAward> {
        if amount == 0 {
            return Err(EngineError::InvalidInput(
                "XP award amount must be > 0".to_string(),
            ));
        }

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let old_total = Self::total_in_tx(&tx, user_id)?;
        tx.execute(
            r#"INSERT INTO xp_events (user_id, amount, reason, occurred_at, day_bucket)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![user_id, amount, reason, occurred_at, day::day_bucket(occurred_at)],
        )?;
        tx.commit()?;

        let new_total = old_total + amount as u64;
        let old_level = self.curve.level_for_xp(old_total);
        let new_level = self.curve.level_for_xp(new_total);

        Ok(XpAward {
            new_total,
            level: new_level,
            level_up: new_level > old_level,
        })
    }

    /// Snapshot of a user's XP standing as of `now` (calendar day for the
    /// trailing windows). Weekly and monthly sums are recomputed per read.
    pub fn summary(&self, user_id: &str, now: NaiveDate) -> Result<XpSummary> {
        let conn = self.db.conn();

        let total: u64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM xp_events WHERE user_id = ?1",
            params![user_id],
            |r| r.get::<_, i64>(0).map(|v| v as u64),
        )?;

        let window_sum = |days: i64| -> Result<u64> {
            let cutoff = day::trailing_window_start(now, days);
            let sum: i64 = conn.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM xp_events
                 WHERE user_id = ?1 AND day_bucket >= ?2",
                params![user_id, cutoff],
                |r| r.get(0),
            )?;
            Ok(sum as u64)
        };
        let weekly_xp = window_sum(7)?;
        let monthly_xp = window_sum(30)?;

        let band = self.curve.band_for_xp(total);
        let (xp_to_next_level, progress_to_next_level) = match self.curve.next_threshold(band.level)
        {
            Some(next) => {
                let span = next - band.xp_required;
                let into = total - band.xp_required;
                (next - total, ((100 * into) / span) as u8)
            }
            None => (0, 100),
        };

        Ok(XpSummary {
            user_id: user_id.to_string(),
            total_xp: total,
            level: band.level,
            title: band.title.to_string(),
            xp_to_next_level,
            progress_to_next_level,
            weekly_xp,
            monthly_xp,
        })
    }

    fn total_in_tx(tx: &rusqlite::Transaction<'_>, user_id: &str) -> Result<u64> {
        let total: i64 = tx.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM xp_events WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(total as u64)
    }
}
