//! Change events as delivered to subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What happened to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// Map a Postgres change type (`INSERT`, `UPDATE`, `DELETE`).
    pub fn from_postgres(change_type: &str) -> Option<Self> {
        match change_type {
            "INSERT" => Some(ChangeKind::Inserted),
            "UPDATE" => Some(ChangeKind::Updated),
            "DELETE" => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Inserted => "inserted",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// One committed row change.
///
/// `record` is the post-image (`Null` for deletes) and `old_record` the
/// pre-image. With the default replica identity a delete pre-image only
/// carries the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub kind: ChangeKind,
    pub table: String,
    #[serde(default)]
    pub record: Value,
    #[serde(default)]
    pub old_record: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_timestamp: Option<String>,
}

impl RowChange {
    pub fn inserted(table: impl Into<String>, record: Value) -> Self {
        Self {
            kind: ChangeKind::Inserted,
            table: table.into(),
            record,
            old_record: Value::Null,
            commit_timestamp: None,
        }
    }

    pub fn updated(table: impl Into<String>, record: Value, old_record: Value) -> Self {
        Self {
            kind: ChangeKind::Updated,
            table: table.into(),
            record,
            old_record,
            commit_timestamp: None,
        }
    }

    pub fn deleted(table: impl Into<String>, old_record: Value) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            table: table.into(),
            record: Value::Null,
            old_record,
            commit_timestamp: None,
        }
    }

    /// The row snapshot that identifies the change: post-image for
    /// inserts and updates, pre-image for deletes.
    pub fn row(&self) -> &Value {
        match self.kind {
            ChangeKind::Inserted | ChangeKind::Updated => &self.record,
            ChangeKind::Deleted => &self.old_record,
        }
    }

    /// Primary key of the changed row, if present as a string or number.
    pub fn row_id(&self) -> Option<String> {
        match self.row().get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Health of a subscription's underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeStatus {
    /// Connecting or re-joining the channel.
    Connecting,
    /// Channel joined; changes are flowing.
    Subscribed,
    /// Connection lost. Changes committed until the next `Subscribed` are missed.
    Disconnected,
    /// The subscription ended (unsubscribed or reconnects exhausted).
    Closed,
}

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Change(RowChange),
    Status(RealtimeStatus),
}
