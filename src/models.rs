//! Data models for the progress and gamification engine
//!
//! Stored records mirror the database rows; derived records are computed
//! per query and never written back.

use serde::{Deserialize, Serialize};

/// Per-user fractional progress on a single piece of content.
/// One row per (user, content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentProgress {
    pub user_id: String,
    pub content_id: String,
    /// 0.0 ..= 100.0, monotonically non-decreasing
    pub progress_percent: f64,
    /// Opaque resume position (e.g. scroll offset, video timestamp)
    pub last_position: Option<serde_json::Value>,
    pub time_spent_seconds: u64,
    // Timestamps (ms since epoch)
    pub started_at: i64,
    pub last_viewed_at: i64,
    pub completed_at: Option<i64>,
}

impl ContentProgress {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Enrollment state for a (user, course) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    NotEnrolled,
    Enrolled,
    Completed,
}

/// Completion state for a (user, lesson) pair. `Completed` is terminal;
/// there is no uncompletion transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonState {
    Incomplete,
    Completed,
}

/// The record that a user has opted into a course. One row per
/// (user, course), created once; `progress_percent` is always recomputed
/// from lesson completions and cached here as a read optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseEnrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    /// round(100 * completed_lessons / total_lessons)
    pub progress_percent: u8,
    pub current_lesson_id: Option<String>,
    pub enrolled_at: i64,
    pub completed_at: Option<i64>,
}

impl CourseEnrollment {
    pub fn state(&self) -> EnrollmentState {
        if self.completed_at.is_some() {
            EnrollmentState::Completed
        } else {
            EnrollmentState::Enrolled
        }
    }
}

/// Per-lesson completion row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonProgress {
    pub user_id: String,
    pub lesson_id: String,
    pub state: LessonState,
    pub completed_at: Option<i64>,
}

/// Outcome of a `complete_lesson` call.
#[derive(Debug, Clone)]
pub struct LessonCompletion {
    pub enrollment: CourseEnrollment,
    /// Total XP granted by this call (0 when already completed or when
    /// the XP side effect failed)
    pub xp_awarded: u32,
    /// Whether this call's XP crossed a level boundary
    pub level_up: bool,
    /// This completion brought the containing section to 100%
    pub section_completed: bool,
    /// This completion brought the course to 100%
    pub course_completed: bool,
    /// The lesson was already complete; nothing changed
    pub already_completed: bool,
}

/// Daily-activity streak state. Exactly one row per user;
/// `longest_streak >= current_streak` always holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStreak {
    pub user_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Day bucket of the most recent counted activity
    pub last_active_day: Option<String>,
}

/// Result of recording one day's activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakUpdate {
    /// Activity already counted for this day
    AlreadyCounted,
    /// Streak continued from yesterday
    Extended { current: u32 },
    /// Gap of more than one day, or first activity ever
    Started,
}

/// Snapshot of a user's XP standing, recomputed on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpSummary {
    pub user_id: String,
    pub total_xp: u64,
    pub level: u32,
    pub title: String,
    /// XP still needed to reach the next level (0 at the top level)
    pub xp_to_next_level: u64,
    /// 0..=100 within the current level band
    pub progress_to_next_level: u8,
    /// Sum of awards in the trailing 7 calendar days
    pub weekly_xp: u64,
    /// Sum of awards in the trailing 30 calendar days
    pub monthly_xp: u64,
}

/// Outcome of a single XP award.
#[derive(Debug, Clone)]
pub struct XpAward {
    pub new_total: u64,
    pub level: u32,
    /// The award crossed at least one level boundary
    pub level_up: bool,
}

/// Time window a leaderboard is summed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    Weekly,
    Monthly,
    AllTime,
}

impl LeaderboardPeriod {
    /// Trailing window length in days, None for all-time.
    pub fn days(&self) -> Option<i64> {
        match self {
            Self::Weekly => Some(7),
            Self::Monthly => Some(30),
            Self::AllTime => None,
        }
    }
}

/// One ranked row. Derived per query, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub rank: u32,
    pub xp: u64,
    pub level: u32,
    pub is_current_user: bool,
}

/// A leaderboard page plus the requester's own standing, which is
/// computed independently of the page cutoff.
#[derive(Debug, Clone)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    /// None when the requester has no XP in the window
    pub current_user_rank: Option<u32>,
}

/// One cell of the activity calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDay {
    /// Day bucket, "YYYY-MM-DD"
    pub date: String,
    pub count: u32,
    /// False for the week-alignment padding days outside the target year
    pub in_year: bool,
}

/// Week-aligned activity grid for one year, plus display statistics
/// computed over the in-year days only.
#[derive(Debug, Clone)]
pub struct ActivityCalendar {
    pub year: i32,
    pub days: Vec<ActivityDay>,
    pub total_contributions: u64,
    pub active_days: u32,
    /// Longest run of consecutive active days within the year. Display
    /// statistic only; the authoritative cross-year figure lives in
    /// `UserStreak.longest_streak`.
    pub max_streak_within_year: u32,
}
