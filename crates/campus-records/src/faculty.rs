//! Faculty table.

use crate::resource::{blank_fields, Draft, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status assigned to new faculty members.
const DEFAULT_STATUS: &str = "Active";

/// A faculty member. `id` is a server-assigned uuid; `faculty_id` is the
/// staff number shown to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faculty {
    pub id: String,
    pub faculty_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub department: String,
    pub designation: String,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub qualification: Option<String>,
    pub experience_years: i32,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacultyDraft {
    pub faculty_id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub department: String,
    pub designation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualification: Option<String>,
    #[serde(default)]
    pub experience_years: i32,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacultyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Draft for FacultyDraft {
    fn missing_fields(&self) -> Vec<&'static str> {
        blank_fields(&[
            ("faculty_id", self.faculty_id.as_str()),
            ("name", self.name.as_str()),
            ("email", self.email.as_str()),
            ("department", self.department.as_str()),
            ("designation", self.designation.as_str()),
        ])
    }
}

impl Resource for Faculty {
    type Draft = FacultyDraft;
    type Patch = FacultyPatch;

    const TABLE: &'static str = "faculty";
    const LABEL: &'static str = "Faculty";
    const COLLECTION_LABEL: &'static str = "faculty";
    const DELETED_LABEL: &'static str = "Faculty member";
    const AUTO_KEYED: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}
