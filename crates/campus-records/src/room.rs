//! Rooms table.

use crate::resource::{blank_fields, Draft, Resource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub room_number: String,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub capacity: i32,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDraft {
    pub room_number: String,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    #[serde(default)]
    pub capacity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "Available".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Draft for RoomDraft {
    fn missing_fields(&self) -> Vec<&'static str> {
        blank_fields(&[
            ("room_number", self.room_number.as_str()),
            ("name", self.name.as_str()),
            ("type", self.room_type.as_str()),
        ])
    }
}

impl Resource for Room {
    type Draft = RoomDraft;
    type Patch = RoomPatch;

    const TABLE: &'static str = "rooms";
    const LABEL: &'static str = "Room";
    const COLLECTION_LABEL: &'static str = "rooms";
    const DELETED_LABEL: &'static str = "Room";
    const AUTO_KEYED: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn facilities_default_to_empty() {
        let room: Room = serde_json::from_value(json!({
            "id": "r-1",
            "room_number": "101",
            "name": "Smart Classroom",
            "type": "Classroom",
            "capacity": 40,
            "status": "Available"
        }))
        .unwrap();

        assert!(room.facilities.is_empty());
        assert_eq!(room.room_type, "Classroom");
    }

    #[test]
    fn patch_replaces_facilities_array() {
        let patch = RoomPatch {
            facilities: Some(vec!["Projector".into(), "Smart Board".into()]),
            status: Some("Maintenance".into()),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({
                "facilities": ["Projector", "Smart Board"],
                "status": "Maintenance"
            })
        );
    }

    #[test]
    fn draft_defaults_status_available() {
        let draft: RoomDraft = serde_json::from_value(json!({
            "room_number": "L2",
            "name": "Physics Lab",
            "type": "Laboratory",
            "capacity": 30
        }))
        .unwrap();

        assert_eq!(draft.status, "Available");
        assert!(draft.missing_fields().is_empty());
    }
}
