//! The `Resource` trait tying a record type to its table and wording.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An insert payload that can check its own required fields.
pub trait Draft: Serialize + fmt::Debug + Send + Sync {
    /// Names of required columns that are missing or blank.
    fn missing_fields(&self) -> Vec<&'static str>;
}

/// A row type stored in one remote table.
pub trait Resource:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Insert payload.
    type Draft: Draft;
    /// Partial update payload.
    type Patch: Serialize + fmt::Debug + Send + Sync;

    /// Remote table name.
    const TABLE: &'static str;
    /// Singular label used in notification titles ("Course Added").
    const LABEL: &'static str;
    /// Lower-case collection label used in error messages ("Failed to load courses.").
    const COLLECTION_LABEL: &'static str;
    /// Subject of the delete notification ("Course has been removed.").
    const DELETED_LABEL: &'static str;
    /// Whether the server assigns `id` on insert.
    const AUTO_KEYED: bool;

    /// Stable primary key.
    fn id(&self) -> &str;

    /// Human-facing name used in notifications.
    fn display_name(&self) -> &str;
}

/// The four resource tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Course,
    Faculty,
    Student,
    Room,
}

impl ResourceKind {
    /// All kinds, in dashboard order.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Course,
        ResourceKind::Faculty,
        ResourceKind::Student,
        ResourceKind::Room,
    ];

    /// Remote table name.
    pub fn table(self) -> &'static str {
        match self {
            ResourceKind::Course => crate::Course::TABLE,
            ResourceKind::Faculty => crate::Faculty::TABLE,
            ResourceKind::Student => crate::Student::TABLE,
            ResourceKind::Room => crate::Room::TABLE,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Returned when parsing an unknown resource name.
#[derive(Debug, Clone, Error)]
#[error("unknown resource '{0}' (expected courses, faculty, students, or rooms)")]
pub struct UnknownResource(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "course" | "courses" => Ok(ResourceKind::Course),
            "faculty" => Ok(ResourceKind::Faculty),
            "student" | "students" => Ok(ResourceKind::Student),
            "room" | "rooms" => Ok(ResourceKind::Room),
            _ => Err(UnknownResource(s.to_string())),
        }
    }
}

/// Collects the names of blank required string fields.
pub(crate) fn blank_fields(fields: &[(&'static str, &str)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}
