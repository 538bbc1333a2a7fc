//! Engine events
//!
//! Progression writes emit events after their transaction commits. A
//! notifier (toast layer, email pipeline) subscribes through [`EventSink`];
//! the engine itself never sends notifications. Sink failures are the
//! sink's problem: dispatch is infallible from the engine's point of view.

use chrono::NaiveDate;

/// A level up crossing.
#[derive(Debug, Clone)]
pub struct LevelUp {
    pub user_id: String,
    pub old_level: u32,
    pub new_level: u32,
    pub new_title: String,
}

/// Everything observable that can happen during an engine write.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A qualifying learning action happened on `day`
    ActivityOccurred { user_id: String, day: NaiveDate },
    /// Content progress first reached 100%
    ContentCompleted { user_id: String, content_id: String },
    LessonCompleted { user_id: String, lesson_id: String },
    SectionCompleted { user_id: String, section_id: String },
    CourseCompleted { user_id: String, course_id: String },
    StreakExtended { user_id: String, current: u32 },
    XpAwarded {
        user_id: String,
        amount: u32,
        reason: String,
    },
    LevelUp(LevelUp),
}

/// Consumer of engine events. Implementations must not block the caller
/// for long; the engine dispatches synchronously after commit.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &EngineEvent);
}

/// Default sink that drops every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &EngineEvent) {}
}

/// Test/debug sink that records events in memory.
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events.lock().expect("sink lock"))
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &EngineEvent) {
        self.events.lock().expect("sink lock").push(event.clone());
    }
}
