//! Course Progression State Machine
//!
//! Per (user, course) the states are `NotEnrolled -> Enrolled ->
//! Completed`; per (user, lesson) `Incomplete -> Completed` with no
//! uncompletion transition. The enrollment percentage is always derived
//! from the lesson-completion set at write time and cached on the
//! enrollment row purely as a read optimization.

use std::collections::HashSet;
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::catalog::{CourseCatalog, CourseStructure, LessonNavigation, resolve_navigation};
use crate::day;
use crate::db::EngineDb;
use crate::error::{EngineError, EntityKind, Result};
use crate::models::{CourseEnrollment, EnrollmentState, LessonProgress, LessonState};

/// Result of flipping one lesson to `Completed`, before any XP or streak
/// side effects run.
#[derive(Debug, Clone)]
pub struct CompletionWrite {
    pub enrollment: CourseEnrollment,
    /// The lesson was already complete; nothing was written
    pub already_completed: bool,
    /// This write brought the containing section to 100%
    pub section_completed: bool,
    /// Id of the section that just completed
    pub section_id: Option<String>,
    /// This write brought the course to 100% (fires exactly once)
    pub course_completed: bool,
}

/// Enrollment and lesson-completion writes over the store, with course
/// structure supplied by the catalog.
#[derive(Clone)]
pub struct CourseProgression {
    db: EngineDb,
    catalog: Arc<dyn CourseCatalog>,
}

impl CourseProgression {
    pub fn new(db: EngineDb, catalog: Arc<dyn CourseCatalog>) -> Self {
        Self { db, catalog }
    }

    /// Enroll a user into a course. Idempotent: an existing enrollment is
    /// returned unchanged, with its original `enrolled_at`.
    ///
    /// An empty course still enrolls, with no current-lesson pointer.
    pub fn enroll(&self, user_id: &str, course_id: &str) -> Result<CourseEnrollment> {
        let course = self.catalog.course_structure(course_id)?;

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        if let Some(existing) = Self::read_enrollment(&tx, user_id, course_id)? {
            return Ok(existing);
        }

        let enrollment = CourseEnrollment {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            progress_percent: 0,
            current_lesson_id: course.first_lesson().map(|l| l.id.clone()),
            enrolled_at: day::now_ms(),
            completed_at: None,
        };

        tx.execute(
            r#"INSERT INTO course_enrollments
               (id, user_id, course_id, progress_percent, current_lesson_id, enrolled_at, completed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                enrollment.id,
                enrollment.user_id,
                enrollment.course_id,
                enrollment.progress_percent,
                enrollment.current_lesson_id,
                enrollment.enrolled_at,
                enrollment.completed_at,
            ],
        )?;
        tx.commit()?;

        tracing::debug!(user_id, course_id, "enrolled");
        Ok(enrollment)
    }

    /// Flip a lesson to `Completed` and recompute the enrollment.
    ///
    /// Requires an existing enrollment regardless of the lesson's free
    /// flag. Repeat completion of the same lesson short-circuits before
    /// any recompute: the second call changes nothing and the caller must
    /// not award XP for it. The whole write is one transaction, so the
    /// lesson flag and the cached percentage can never diverge.
    pub fn complete_lesson(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<CompletionWrite> {
        let course = self.catalog.course_structure(course_id)?;
        if course.find_lesson(lesson_id).is_none() {
            return Err(EngineError::not_found(EntityKind::Lesson, lesson_id));
        }

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let mut enrollment =
            Self::read_enrollment(&tx, user_id, course_id)?.ok_or(EngineError::NotEnrolled {
                user: user_id.to_string(),
                course: course_id.to_string(),
            })?;

        if Self::read_lesson_state(&tx, user_id, lesson_id)? == LessonState::Completed {
            return Ok(CompletionWrite {
                enrollment,
                already_completed: true,
                section_completed: false,
                section_id: None,
                course_completed: false,
            });
        }

        let now = day::now_ms();
        tx.execute(
            r#"INSERT INTO lesson_progress (user_id, lesson_id, completed, completed_at)
               VALUES (?1, ?2, 1, ?3)
               ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                   completed = 1,
                   completed_at = COALESCE(completed_at, ?3)"#,
            params![user_id, lesson_id, now],
        )?;

        let completed_set = Self::completed_lesson_ids(&tx, user_id)?;
        let flat = course.flattened_lessons();
        let total = flat.len();
        let done = flat
            .iter()
            .filter(|l| completed_set.contains(&l.id))
            .count();
        let percent = ((100.0 * done as f64) / total as f64).round() as u8;

        let next = flat
            .iter()
            .position(|l| l.id == lesson_id)
            .and_then(|i| flat.get(i + 1));
        enrollment.current_lesson_id =
            Some(next.map_or_else(|| lesson_id.to_string(), |l| l.id.clone()));
        enrollment.progress_percent = percent;

        let course_completed = percent >= 100 && enrollment.completed_at.is_none();
        if course_completed {
            enrollment.completed_at = Some(now);
        }

        tx.execute(
            r#"UPDATE course_enrollments
               SET progress_percent = ?1, current_lesson_id = ?2, completed_at = ?3
               WHERE id = ?4"#,
            params![
                enrollment.progress_percent,
                enrollment.current_lesson_id,
                enrollment.completed_at,
                enrollment.id,
            ],
        )?;
        tx.commit()?;

        let section = course.section_of(lesson_id);
        let section_completed = section
            .map(|s| s.lessons.iter().all(|l| completed_set.contains(&l.id)))
            .unwrap_or(false);

        tracing::debug!(user_id, course_id, lesson_id, percent, "lesson completed");

        Ok(CompletionWrite {
            enrollment,
            already_completed: false,
            section_completed,
            section_id: section_completed.then(|| section.unwrap().id.clone()),
            course_completed,
        })
    }

    /// Current enrollment state for (user, course).
    pub fn enrollment_state(&self, user_id: &str, course_id: &str) -> Result<EnrollmentState> {
        Ok(self
            .get_enrollment(user_id, course_id)?
            .map_or(EnrollmentState::NotEnrolled, |e| e.state()))
    }

    pub fn get_enrollment(&self, user_id: &str, course_id: &str) -> Result<Option<CourseEnrollment>> {
        let conn = self.db.conn();
        Self::read_enrollment(&conn, user_id, course_id)
    }

    /// Completion state for one lesson.
    pub fn lesson_progress(&self, user_id: &str, lesson_id: &str) -> Result<LessonProgress> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT completed, completed_at FROM lesson_progress
                 WHERE user_id = ?1 AND lesson_id = ?2",
                params![user_id, lesson_id],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, Option<i64>>(1)?)),
            )
            .optional()?;

        let (completed, completed_at) = row.unwrap_or((0, None));
        Ok(LessonProgress {
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
            state: if completed != 0 {
                LessonState::Completed
            } else {
                LessonState::Incomplete
            },
            completed_at,
        })
    }

    /// Previous/next lessons around `lesson_id`, pure over the catalog.
    pub fn navigation(&self, course_id: &str, lesson_id: &str) -> Result<LessonNavigation> {
        let course = self.catalog.course_structure(course_id)?;
        resolve_navigation(&course, lesson_id)
    }

    /// Content-gating rule: free lessons are viewable by anyone, paid
    /// lessons require an enrollment row. This is not authorization.
    pub fn can_view_lesson(&self, user_id: &str, course_id: &str, lesson_id: &str) -> Result<bool> {
        let course = self.catalog.course_structure(course_id)?;
        let lesson = course
            .find_lesson(lesson_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Lesson, lesson_id))?;

        if lesson.is_free {
            return Ok(true);
        }
        Ok(self.get_enrollment(user_id, course_id)?.is_some())
    }

    /// Course structure pass-through, for callers that already hold a
    /// progression handle.
    pub fn course_structure(&self, course_id: &str) -> Result<CourseStructure> {
        self.catalog.course_structure(course_id)
    }

    fn read_enrollment(
        conn: &Connection,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseEnrollment>> {
        let row = conn
            .query_row(
                "SELECT id, progress_percent, current_lesson_id, enrolled_at, completed_at
                 FROM course_enrollments WHERE user_id = ?1 AND course_id = ?2",
                params![user_id, course_id],
                |r| {
                    Ok(CourseEnrollment {
                        id: r.get(0)?,
                        user_id: user_id.to_string(),
                        course_id: course_id.to_string(),
                        progress_percent: r.get::<_, i64>(1)? as u8,
                        current_lesson_id: r.get(2)?,
                        enrolled_at: r.get(3)?,
                        completed_at: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn read_lesson_state(conn: &Connection, user_id: &str, lesson_id: &str) -> Result<LessonState> {
        let completed: Option<i64> = conn
            .query_row(
                "SELECT completed FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2",
                params![user_id, lesson_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(if completed.unwrap_or(0) != 0 {
            LessonState::Completed
        } else {
            LessonState::Incomplete
        })
    }

    fn completed_lesson_ids(conn: &Connection, user_id: &str) -> Result<HashSet<String>> {
        let mut stmt = conn
            .prepare("SELECT lesson_id FROM lesson_progress WHERE user_id = ?1 AND completed = 1")?;
        let ids = stmt
            .query_map(params![user_id], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }
}
