//! LearnTrack - progress, streak and gamification engine
//!
//! Turns raw learning events (a page viewed, a lesson finished, a course
//! enrolled) into durable progress state, activity streaks, XP, levels and
//! leaderboard rankings. Content, identity and rendering live elsewhere:
//! the engine reads course structure through [`catalog::CourseCatalog`],
//! resolves the requesting user through [`catalog::IdentityProvider`], and
//! emits [`events::EngineEvent`]s that a notifier may subscribe to.
//!
//! # Usage
//!
//! ```ignore
//! let engine = Engine::new(EngineConfig::default(), catalog, identity)?;
//!
//! engine.enroll("user-1", "rust-101")?;
//! let done = engine.complete_lesson("user-1", "rust-101", "lesson-3")?;
//! if done.level_up {
//!     // show the toast
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod course;
pub mod day;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod models;
pub mod progress;
pub mod streak;
pub mod xp;

pub use catalog::{CourseCatalog, CourseStructure, IdentityProvider, Lesson, LessonNavigation, Section};
pub use config::{EngineConfig, XpRewards};
pub use db::EngineDb;
pub use engine::Engine;
pub use error::{EngineError, EntityKind, Result};
pub use events::{EngineEvent, EventSink, MemorySink, NullSink};
pub use models::{
    ActivityCalendar, ActivityDay, ContentProgress, CourseEnrollment, EnrollmentState,
    LeaderboardEntry, LeaderboardPage, LeaderboardPeriod, LessonCompletion, LessonProgress,
    LessonState, StreakUpdate, UserStreak, XpAward, XpSummary,
};
pub use xp::{LevelBand, LevelCurve};
