//! Row types for the campus administration tables.
//!
//! Each table gets three shapes:
//!
//! - the record, exactly as `list` returns it and change events carry it
//! - the draft, the insert payload (no server-owned columns)
//! - the patch, a partial update where absent fields are left alone
//!
//! Serde field names are the column names, so a record survives an
//! edit-and-save round trip without losing fields.

mod course;
mod faculty;
mod resource;
mod room;
mod student;

pub use course::{Course, CourseDraft, CoursePatch};
pub use faculty::{Faculty, FacultyDraft, FacultyPatch};
pub use resource::{Draft, Resource, ResourceKind, UnknownResource};
pub use room::{Room, RoomDraft, RoomPatch};
pub use student::{Student, StudentDraft, StudentPatch};
