//! Engine facade
//!
//! Wires the five components together and owns the side-effect policy:
//! progression writes commit first, then streak and XP updates run as
//! best-effort follow-ups whose failures are logged and swallowed. The
//! primary result always reflects the committed write; a failed side
//! effect shows up as `xp_awarded = 0` / no streak movement, never as an
//! error to the caller.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::catalog::{CourseCatalog, IdentityProvider, LessonNavigation};
use crate::config::EngineConfig;
use crate::course::{CompletionWrite, CourseProgression};
use crate::day;
use crate::db::EngineDb;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventSink, LevelUp, NullSink};
use crate::leaderboard::ActivityAggregator;
use crate::models::{
    ActivityCalendar, ContentProgress, CourseEnrollment, LeaderboardPage, LeaderboardPeriod,
    LessonCompletion, StreakUpdate, UserStreak, XpAward, XpSummary,
};
use crate::progress::ProgressTracker;
use crate::streak::StreakLedger;
use crate::xp::{LevelCurve, XpLedger};

/// Central entry point for progress, streak and gamification operations
#[derive(Clone)]
pub struct Engine {
    db: EngineDb,
    config: EngineConfig,
    identity: Arc<dyn IdentityProvider>,
    sink: Arc<dyn EventSink>,
    progress: ProgressTracker,
    courses: CourseProgression,
    streaks: StreakLedger,
    xp: XpLedger,
    aggregator: ActivityAggregator,
}

impl Engine {
    /// Open the engine with the database location from `config`.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn CourseCatalog>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let db = EngineDb::open(&config.resolved_db_path())?;
        Ok(Self::with_db(db, config, catalog, identity))
    }

    /// Build the engine over an already-open database.
    pub fn with_db(
        db: EngineDb,
        config: EngineConfig,
        catalog: Arc<dyn CourseCatalog>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let curve = LevelCurve::default();
        Self {
            progress: ProgressTracker::new(db.clone()),
            courses: CourseProgression::new(db.clone(), catalog),
            streaks: StreakLedger::new(db.clone()),
            xp: XpLedger::new(db.clone(), curve.clone()),
            aggregator: ActivityAggregator::new(db.clone(), curve),
            db,
            identity,
            sink: Arc::new(NullSink),
            config,
        }
    }

    /// Replace the event sink (notifier subscription point).
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the level curve on the XP ledger and aggregator.
    pub fn with_curve(mut self, curve: LevelCurve) -> Self {
        self.xp = XpLedger::new(self.db.clone(), curve.clone());
        self.aggregator = ActivityAggregator::new(self.db.clone(), curve);
        self
    }

    // ========================================
    // PROGRESS TRACKER
    // ========================================

    /// Record fractional progress on a piece of content.
    ///
    /// Any positive percent also counts as learning activity for the
    /// streak ledger; that update is best-effort and never fails the
    /// progress write.
    pub fn update_progress(
        &self,
        user_id: &str,
        content_id: &str,
        percent: f64,
        time_spent_delta_secs: i64,
        position: Option<serde_json::Value>,
    ) -> Result<ContentProgress> {
        let write =
            self.progress
                .update_progress(user_id, content_id, percent, time_spent_delta_secs, position)?;

        if write.newly_completed {
            self.sink.publish(&EngineEvent::ContentCompleted {
                user_id: user_id.to_string(),
                content_id: content_id.to_string(),
            });
        }
        if write.activity {
            self.record_activity_best_effort(user_id, day::today());
        }

        Ok(write.progress)
    }

    pub fn get_progress(&self, user_id: &str, content_id: &str) -> Result<Option<ContentProgress>> {
        self.progress.get_progress(user_id, content_id)
    }

    // ========================================
    // COURSE PROGRESSION
    // ========================================

    /// Idempotent enrollment into a course.
    pub fn enroll(&self, user_id: &str, course_id: &str) -> Result<CourseEnrollment> {
        self.courses.enroll(user_id, course_id)
    }

    /// Complete a lesson and run the gamification follow-ups.
    ///
    /// A repeat completion returns the unchanged enrollment with
    /// `already_completed = true` and no awards.
    pub fn complete_lesson(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<LessonCompletion> {
        let write = self.courses.complete_lesson(user_id, course_id, lesson_id)?;

        if write.already_completed {
            return Ok(LessonCompletion {
                enrollment: write.enrollment,
                xp_awarded: 0,
                level_up: false,
                section_completed: false,
                course_completed: false,
                already_completed: true,
            });
        }

        self.sink.publish(&EngineEvent::LessonCompleted {
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
        });
        if let Some(section_id) = &write.section_id {
            self.sink.publish(&EngineEvent::SectionCompleted {
                user_id: user_id.to_string(),
                section_id: section_id.clone(),
            });
        }
        if write.course_completed {
            self.sink.publish(&EngineEvent::CourseCompleted {
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
            });
        }

        self.record_activity_best_effort(user_id, day::today());
        let (xp_awarded, level_up) = self.award_completion_xp(user_id, lesson_id, &write);

        Ok(LessonCompletion {
            section_completed: write.section_completed,
            course_completed: write.course_completed,
            enrollment: write.enrollment,
            xp_awarded,
            level_up,
            already_completed: false,
        })
    }

    /// Previous/next lesson around a target, in flattened course order.
    pub fn get_course_navigation(
        &self,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<LessonNavigation> {
        self.courses.navigation(course_id, lesson_id)
    }

    /// Content-gating check: free lessons need no enrollment.
    pub fn can_view_lesson(&self, user_id: &str, course_id: &str, lesson_id: &str) -> Result<bool> {
        self.courses.can_view_lesson(user_id, course_id, lesson_id)
    }

    pub fn get_enrollment(&self, user_id: &str, course_id: &str) -> Result<Option<CourseEnrollment>> {
        self.courses.get_enrollment(user_id, course_id)
    }

    // ========================================
    // STREAKS & XP
    // ========================================

    /// Record that qualifying activity happened on `today`. Direct entry
    /// point for callers that track activity sources the engine does not
    /// see (e.g. live sessions); progression writes call this internally.
    pub fn record_activity(&self, user_id: &str, today: NaiveDate) -> Result<StreakUpdate> {
        let update = self.streaks.record_activity(user_id, today)?;
        if let StreakUpdate::Extended { current } = update {
            self.sink.publish(&EngineEvent::StreakExtended {
                user_id: user_id.to_string(),
                current,
            });
        }
        Ok(update)
    }

    pub fn get_streak(&self, user_id: &str) -> Result<UserStreak> {
        self.streaks.get_streak(user_id)
    }

    /// Append an XP award outside the lesson-completion path (e.g. a
    /// promotional grant). `amount` must be positive.
    pub fn award_xp(
        &self,
        user_id: &str,
        amount: u32,
        reason: &str,
        occurred_at: i64,
    ) -> Result<XpAward> {
        let award = self.xp.award_xp(user_id, amount, reason, occurred_at)?;
        self.sink.publish(&EngineEvent::XpAwarded {
            user_id: user_id.to_string(),
            amount,
            reason: reason.to_string(),
        });
        Ok(award)
    }

    pub fn get_xp_summary(&self, user_id: &str) -> Result<XpSummary> {
        self.xp.summary(user_id, day::today())
    }

    // ========================================
    // LEADERBOARD & CALENDAR
    // ========================================

    /// Ranked standings over the period, for the authenticated user.
    pub fn get_leaderboard(&self, period: LeaderboardPeriod, limit: u32) -> Result<LeaderboardPage> {
        let current_user = self
            .identity
            .current_user_id()
            .ok_or(EngineError::Unauthorized)?;
        let limit = limit.min(self.config.leaderboard_max_limit);
        self.aggregator.leaderboard(period, limit, &current_user)
    }

    pub fn get_activity_calendar(&self, user_id: &str, year: i32) -> Result<ActivityCalendar> {
        self.aggregator.activity_calendar(user_id, year)
    }

    // ========================================
    // SIDE EFFECTS
    // ========================================

    /// Streak update triggered from inside another operation. Failures
    /// must not roll back the progression write, so they are logged and
    /// dropped here.
    fn record_activity_best_effort(&self, user_id: &str, today: NaiveDate) {
        match self.streaks.record_activity(user_id, today) {
            Ok(StreakUpdate::Extended { current }) => {
                self.sink.publish(&EngineEvent::StreakExtended {
                    user_id: user_id.to_string(),
                    current,
                });
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, error = %e, "streak update failed"),
        }
        self.sink.publish(&EngineEvent::ActivityOccurred {
            user_id: user_id.to_string(),
            day: today,
        });
    }

    /// Award the lesson XP plus section/course bonuses. Each award is its
    /// own atomic append; one failing leaves the others applied and is
    /// only logged.
    fn award_completion_xp(
        &self,
        user_id: &str,
        lesson_id: &str,
        write: &CompletionWrite,
    ) -> (u32, bool) {
        let now = day::now_ms();
        let rewards = &self.config.xp;

        let mut planned: Vec<(u32, String)> = vec![(
            rewards.lesson_completed,
            format!("lesson_completed:{lesson_id}"),
        )];
        if write.section_completed {
            let section = write.section_id.as_deref().unwrap_or("?");
            planned.push((
                rewards.section_completed,
                format!("section_completed:{section}"),
            ));
        }
        if write.course_completed {
            planned.push((
                rewards.course_completed,
                format!("course_completed:{}", write.enrollment.course_id),
            ));
        }

        let mut total = 0u32;
        let mut level_up = false;
        let mut level_before = None;
        for (amount, reason) in planned {
            match self.xp.award_xp(user_id, amount, &reason, now) {
                Ok(award) => {
                    total += amount;
                    self.sink.publish(&EngineEvent::XpAwarded {
                        user_id: user_id.to_string(),
                        amount,
                        reason,
                    });
                    if award.level_up {
                        level_up = true;
                        let old = level_before.unwrap_or(award.level - 1);
                        self.sink.publish(&EngineEvent::LevelUp(LevelUp {
                            user_id: user_id.to_string(),
                            old_level: old,
                            new_level: award.level,
                            new_title: self
                                .xp
                                .curve()
                                .band_for_xp(award.new_total)
                                .title
                                .to_string(),
                        }));
                    }
                    level_before = Some(award.level);
                }
                Err(e) => warn!(user_id, error = %e, "XP award failed"),
            }
        }

        (total, level_up)
    }
}
