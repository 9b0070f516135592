//! Students table.

use crate::resource::{blank_fields, Draft, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A student row. `student_id` is the enrolment number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub student_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub program: String,
    pub semester: i32,
    pub batch: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDraft {
    pub student_id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub program: String,
    #[serde(default = "default_semester")]
    pub semester: i32,
    pub batch: String,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_semester() -> i32 {
    1
}

fn default_status() -> String {
    "Active".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Draft for StudentDraft {
    fn missing_fields(&self) -> Vec<&'static str> {
        blank_fields(&[
            ("student_id", self.student_id.as_str()),
            ("name", self.name.as_str()),
            ("email", self.email.as_str()),
            ("program", self.program.as_str()),
            ("batch", self.batch.as_str()),
        ])
    }
}

impl Resource for Student {
    type Draft = StudentDraft;
    type Patch = StudentPatch;

    const TABLE: &'static str = "students";
    const LABEL: &'static str = "Student";
    const COLLECTION_LABEL: &'static str = "students";
    const DELETED_LABEL: &'static str = "Student";
    const AUTO_KEYED: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}
