//! Error taxonomy for engine operations
//!
//! Progression-critical operations surface these directly; side-effect
//! failures (streak, XP) are logged and swallowed by the engine facade
//! and never reach the caller.

/// What kind of entity a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Content,
    Course,
    Section,
    Lesson,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Course => "course",
            Self::Section => "section",
            Self::Lesson => "lesson",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for all engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No authenticated user")]
    Unauthorized,

    #[error("Unknown {kind}: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("User {user} is not enrolled in course {course}")]
    NotEnrolled { user: String, course: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Concurrent write conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl EngineError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True for errors a caller may retry without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::StorageUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
