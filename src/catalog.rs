//! Catalog and identity collaborators
//!
//! The engine never owns course structure or authentication. It reads
//! immutable structural facts (section/lesson ordering, free flags) from a
//! [`CourseCatalog`] and resolves the requesting user through an
//! [`IdentityProvider`]. Navigation over the structure is a pure function
//! of the flattened lesson list, recomputed per request.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EntityKind, Result};

/// A single lesson as the catalog describes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    /// Ordering key within the section, ascending
    pub order: u32,
    /// Free lessons are viewable without enrollment
    pub is_free: bool,
}

/// A section groups lessons; sections order ascending within a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub lessons: Vec<Lesson>,
}

/// Immutable structure of one course. Sections and lessons are expected
/// in catalog order (ascending `order`); [`CourseStructure::normalize`]
/// enforces it for providers that cannot guarantee it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseStructure {
    pub course_id: String,
    pub sections: Vec<Section>,
}

impl CourseStructure {
    /// Sort sections and lessons by their `order` keys.
    pub fn normalize(&mut self) {
        self.sections.sort_by_key(|s| s.order);
        for section in &mut self.sections {
            section.lessons.sort_by_key(|l| l.order);
        }
    }

    /// All lessons in section-then-lesson order. This flattened list is
    /// the single ordering every progression decision uses.
    pub fn flattened_lessons(&self) -> Vec<&Lesson> {
        self.sections
            .iter()
            .flat_map(|s| s.lessons.iter())
            .collect()
    }

    pub fn total_lessons(&self) -> usize {
        self.sections.iter().map(|s| s.lessons.len()).sum()
    }

    /// The first lesson in catalog order, if the course has any.
    pub fn first_lesson(&self) -> Option<&Lesson> {
        self.sections.iter().flat_map(|s| s.lessons.iter()).next()
    }

    /// The section containing the given lesson.
    pub fn section_of(&self, lesson_id: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.lessons.iter().any(|l| l.id == lesson_id))
    }

    pub fn find_lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.sections
            .iter()
            .flat_map(|s| s.lessons.iter())
            .find(|l| l.id == lesson_id)
    }
}

/// Previous/next lessons around a target, in flattened course order.
#[derive(Debug, Clone)]
pub struct LessonNavigation {
    pub previous: Option<Lesson>,
    pub next: Option<Lesson>,
}

/// Resolve navigation for `lesson_id` within `course`.
///
/// The first lesson has no previous, the last has no next; a lesson id
/// absent from the course is `NotFound`.
pub fn resolve_navigation(course: &CourseStructure, lesson_id: &str) -> Result<LessonNavigation> {
    let flat = course.flattened_lessons();
    let idx = flat
        .iter()
        .position(|l| l.id == lesson_id)
        .ok_or_else(|| EngineError::not_found(EntityKind::Lesson, lesson_id))?;

    Ok(LessonNavigation {
        previous: idx.checked_sub(1).map(|i| flat[i].clone()),
        next: flat.get(idx + 1).map(|l| (*l).clone()),
    })
}

/// Read-only view of the course catalog.
pub trait CourseCatalog: Send + Sync {
    /// Structure for one course, sections and lessons in catalog order.
    /// Unknown course ids are `NotFound`.
    fn course_structure(&self, course_id: &str) -> Result<CourseStructure>;
}

/// Supplies the authenticated user for operations that need "who is
/// asking" rather than an explicit user id parameter.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}
