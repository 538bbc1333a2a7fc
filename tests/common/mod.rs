//! Shared test utilities for engine integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use learntrack::{
    CourseCatalog, CourseStructure, Engine, EngineConfig, EngineDb, EngineError, EntityKind,
    IdentityProvider, Lesson, Result, Section,
};

/// Catalog backed by a fixed in-memory map of courses
pub struct MapCatalog {
    courses: HashMap<String, CourseStructure>,
}

impl MapCatalog {
    pub fn new(courses: Vec<CourseStructure>) -> Self {
        Self {
            courses: courses
                .into_iter()
                .map(|c| (c.course_id.clone(), c))
                .collect(),
        }
    }
}

impl CourseCatalog for MapCatalog {
    fn course_structure(&self, course_id: &str) -> Result<CourseStructure> {
        self.courses
            .get(course_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                kind: EntityKind::Course,
                id: course_id.to_string(),
            })
    }
}

/// Identity provider whose user can be swapped mid-test
#[derive(Default)]
pub struct TestIdentity {
    user: Mutex<Option<String>>,
}

impl TestIdentity {
    pub fn new(user: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            user: Mutex::new(user.map(str::to_string)),
        })
    }

    pub fn set_user(&self, user: Option<&str>) {
        *self.user.lock().unwrap() = user.map(str::to_string);
    }
}

impl IdentityProvider for TestIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user.lock().unwrap().clone()
    }
}

pub fn lesson(id: &str, order: u32, is_free: bool) -> Lesson {
    Lesson {
        id: id.to_string(),
        title: format!("Lesson {id}"),
        order,
        is_free,
    }
}

pub fn section(id: &str, order: u32, lessons: Vec<Lesson>) -> Section {
    Section {
        id: id.to_string(),
        title: format!("Section {id}"),
        order,
        lessons,
    }
}

/// A course with two sections: [l1, l2] and [l3, l4]. l1 is free.
pub fn sample_course(course_id: &str) -> CourseStructure {
    CourseStructure {
        course_id: course_id.to_string(),
        sections: vec![
            section(
                "s1",
                1,
                vec![lesson("l1", 1, true), lesson("l2", 2, false)],
            ),
            section(
                "s2",
                2,
                vec![lesson("l3", 1, false), lesson("l4", 2, false)],
            ),
        ],
    }
}

/// Engine over an in-memory database, default config, with the sample
/// course and the given authenticated user.
pub fn test_engine(current_user: Option<&str>) -> (Engine, Arc<TestIdentity>) {
    // RUST_LOG=debug surfaces engine traces during test runs
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let identity = TestIdentity::new(current_user);
    let catalog = Arc::new(MapCatalog::new(vec![
        sample_course("rust-101"),
        CourseStructure {
            course_id: "empty-course".to_string(),
            sections: vec![],
        },
    ]));
    let engine = Engine::with_db(
        EngineDb::open_in_memory().expect("open in-memory db"),
        EngineConfig::default(),
        catalog,
        identity.clone(),
    );
    (engine, identity)
}
