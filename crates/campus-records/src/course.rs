//! Courses table.

use crate::resource::{blank_fields, Draft, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course row. `id` is the course code chosen by the administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub program: String,
    pub semester: i32,
    pub credits: i32,
    #[serde(rename = "type")]
    pub course_type: String,
    pub faculty: String,
    pub theory_hours: i32,
    pub practical_hours: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for a course. Carries `id` because courses are keyed by code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub id: String,
    pub name: String,
    pub program: String,
    #[serde(default = "default_semester")]
    pub semester: i32,
    #[serde(default = "default_credits")]
    pub credits: i32,
    #[serde(rename = "type")]
    pub course_type: String,
    pub faculty: String,
    #[serde(default)]
    pub theory_hours: i32,
    #[serde(default)]
    pub practical_hours: i32,
}

fn default_semester() -> i32 {
    1
}

fn default_credits() -> i32 {
    1
}

/// Partial update for a course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoursePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<i32>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub course_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theory_hours: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practical_hours: Option<i32>,
}

impl Draft for CourseDraft {
    fn missing_fields(&self) -> Vec<&'static str> {
        blank_fields(&[
            ("id", self.id.as_str()),
            ("name", self.name.as_str()),
            ("program", self.program.as_str()),
            ("type", self.course_type.as_str()),
            ("faculty", self.faculty.as_str()),
        ])
    }
}

impl Resource for Course {
    type Draft = CourseDraft;
    type Patch = CoursePatch;

    const TABLE: &'static str = "courses";
    const LABEL: &'static str = "Course";
    const COLLECTION_LABEL: &'static str = "courses";
    const DELETED_LABEL: &'static str = "Course";
    const AUTO_KEYED: bool = false;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}
