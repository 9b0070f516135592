//! Supabase Realtime (Phoenix channel) protocol messages.

use crate::{ChangeKind, RowChange, StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Topic used for connection-level heartbeats.
pub(crate) const PHOENIX_TOPIC: &str = "phoenix";

pub(crate) const EVENT_JOIN: &str = "phx_join";
pub(crate) const EVENT_LEAVE: &str = "phx_leave";
pub(crate) const EVENT_REPLY: &str = "phx_reply";
pub(crate) const EVENT_ERROR: &str = "phx_error";
pub(crate) const EVENT_CLOSE: &str = "phx_close";
pub(crate) const EVENT_HEARTBEAT: &str = "heartbeat";
pub(crate) const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub(crate) const EVENT_SYSTEM: &str = "system";

/// A message sent to/from the Realtime server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    /// Channel topic for a table subscription.
    pub fn topic_for(table: &str) -> String {
        format!("realtime:{}-changes", table)
    }

    /// Create a `phx_join` asking for every change on `public.{table}`.
    pub fn join(topic: &str, table: &str, access_token: &str, msg_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_JOIN.to_string(),
            payload: serde_json::json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [
                        { "event": "*", "schema": "public", "table": table }
                    ],
                    "private": false
                },
                "access_token": access_token
            }),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(msg_ref.to_string()),
        }
    }

    /// Create a `phx_leave` for the topic.
    pub fn leave(topic: &str, msg_ref: &str, join_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: serde_json::json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(join_ref.to_string()),
        }
    }

    /// Create a connection heartbeat.
    pub fn heartbeat(msg_ref: &str) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: serde_json::json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    /// Reply status (`ok` / `error`) for a `phx_reply`.
    pub fn reply_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Human-readable reason attached to an error reply.
    pub fn reply_reason(&self) -> String {
        self.payload
            .get("response")
            .and_then(|response| response.get("reason"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.payload.to_string())
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// The `data` object of a `postgres_changes` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostgresChangeData {
    #[serde(rename = "type")]
    pub change_type: String,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
    #[serde(default)]
    pub errors: Option<Value>,
}

impl PostgresChangeData {
    /// Extract the change data from a `postgres_changes` message payload.
    pub fn from_payload(payload: &Value) -> StreamResult<Self> {
        let data = payload
            .get("data")
            .ok_or_else(|| StreamError::InvalidPayload("missing data".to_string()))?;
        Ok(serde_json::from_value(data.clone())?)
    }

    /// Convert into a [`RowChange`].
    pub fn into_row_change(self) -> StreamResult<RowChange> {
        if let Some(errors) = self.errors.as_ref().filter(|errors| !errors.is_null()) {
            return Err(StreamError::InvalidPayload(format!(
                "server reported errors: {}",
                errors
            )));
        }

        let kind = ChangeKind::from_postgres(&self.change_type).ok_or_else(|| {
            StreamError::InvalidPayload(format!("unknown change type {}", self.change_type))
        })?;

        Ok(RowChange {
            kind,
            table: self.table,
            record: self.record.unwrap_or(Value::Null),
            old_record: self.old_record.unwrap_or(Value::Null),
            commit_timestamp: self.commit_timestamp,
        })
    }
}
