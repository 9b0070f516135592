//! The local collection and the events that mutate it.

use campus_records::Resource;
use change_stream::{ChangeKind, RowChange};
use thiserror::Error;

/// A row change decoded into the store's record type.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<R> {
    Inserted(R),
    Updated(R),
    /// Deletes carry only the key; the pre-image may hold nothing else.
    Deleted { id: String },
}

/// Why a row change could not become a [`ChangeEvent`].
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("change for table {actual} delivered to {expected}")]
    WrongTable { expected: String, actual: String },

    #[error("row does not decode: {0}")]
    Row(#[from] serde_json::Error),

    #[error("delete pre-image has no id")]
    MissingId,
}

impl<R: Resource> ChangeEvent<R> {
    pub fn from_row_change(change: &RowChange) -> Result<Self, EventDecodeError> {
        if change.table != R::TABLE {
            return Err(EventDecodeError::WrongTable {
                expected: R::TABLE.to_string(),
                actual: change.table.clone(),
            });
        }
        match change.kind {
            ChangeKind::Inserted => Ok(Self::Inserted(serde_json::from_value(
                change.record.clone(),
            )?)),
            ChangeKind::Updated => Ok(Self::Updated(serde_json::from_value(
                change.record.clone(),
            )?)),
            ChangeKind::Deleted => change
                .row_id()
                .map(|id| Self::Deleted { id })
                .ok_or(EventDecodeError::MissingId),
        }
    }

    /// Key of the affected row.
    pub fn id(&self) -> &str {
        match self {
            Self::Inserted(record) | Self::Updated(record) => record.id(),
            Self::Deleted { id } => id,
        }
    }
}

/// What [`LocalCollection::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new record was appended.
    Appended,
    /// An existing record was replaced.
    Replaced,
    /// A record was removed.
    Removed,
    /// Nothing changed (duplicate insert, or update/delete of an absent id).
    Unchanged,
}

/// Records held by one store, at most one per id.
///
/// Load order is kept; inserts append at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCollection<R> {
    records: Vec<R>,
}

impl<R> Default for LocalCollection<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R: Resource> LocalCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a bulk-loaded row set. Repeated ids keep
    /// their first occurrence.
    pub fn replace_all(&mut self, rows: Vec<R>) {
        self.records.clear();
        for row in rows {
            if self.position(row.id()).is_none() {
                self.records.push(row);
            }
        }
    }

    /// Apply one change event.
    pub fn apply(&mut self, event: ChangeEvent<R>) -> Applied {
        match event {
            ChangeEvent::Inserted(record) => {
                if self.position(record.id()).is_some() {
                    Applied::Unchanged
                } else {
                    self.records.push(record);
                    Applied::Appended
                }
            }
            ChangeEvent::Updated(record) => match self.position(record.id()) {
                Some(index) => {
                    self.records[index] = record;
                    Applied::Replaced
                }
                None => Applied::Unchanged,
            },
            ChangeEvent::Deleted { id } => match self.position(&id) {
                Some(index) => {
                    self.records.remove(index);
                    Applied::Removed
                }
                None => Applied::Unchanged,
            },
        }
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.position(id).map(|index| &self.records[index])
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_records::{Course, Room};
    use serde_json::json;
    use std::collections::HashSet;

    fn course(id: &str, name: &str) -> Course {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "program": "BSc CS",
            "semester": 1,
            "credits": 3,
            "type": "Core",
            "faculty": "Dr. Rao",
            "theory_hours": 3,
            "practical_hours": 0
        }))
        .unwrap()
    }

    fn ids(collection: &LocalCollection<Course>) -> Vec<&str> {
        collection.records().iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut collection = LocalCollection::new();
        assert_eq!(
            collection.apply(ChangeEvent::Inserted(course("C3", "Foo"))),
            Applied::Appended
        );
        assert_eq!(
            collection.apply(ChangeEvent::Inserted(course("C3", "Foo"))),
            Applied::Unchanged
        );
        assert_eq!(ids(&collection), vec!["C3"]);
    }

    #[test]
    fn update_replaces_in_place() {
        let mut collection = LocalCollection::new();
        collection.replace_all(vec![course("C2", "A"), course("C1", "Foo")]);

        assert_eq!(
            collection.apply(ChangeEvent::Updated(course("C1", "Bar"))),
            Applied::Replaced
        );
        assert_eq!(ids(&collection), vec!["C2", "C1"]);
        assert_eq!(collection.get("C1").unwrap().name, "Bar");
    }

    #[test]
    fn update_of_absent_row_is_a_no_op() {
        let mut collection = LocalCollection::new();
        collection.replace_all(vec![course("C1", "Foo")]);

        assert_eq!(
            collection.apply(ChangeEvent::Updated(course("C9", "Ghost"))),
            Applied::Unchanged
        );
        assert_eq!(ids(&collection), vec!["C1"]);
    }

    #[test]
    fn delete_of_absent_row_is_a_no_op() {
        let mut collection = LocalCollection::new();
        collection.replace_all(vec![course("C1", "Foo")]);

        assert_eq!(
            collection.apply(ChangeEvent::Deleted { id: "C2".into() }),
            Applied::Unchanged
        );
        assert_eq!(
            collection.apply(ChangeEvent::Deleted { id: "C1".into() }),
            Applied::Removed
        );
        assert!(collection.is_empty());
    }

    #[test]
    fn replace_all_drops_repeated_ids() {
        let mut collection = LocalCollection::new();
        collection.replace_all(vec![course("C1", "First"), course("C1", "Second")]);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get("C1").unwrap().name, "First");
    }

    #[test]
    fn ids_stay_unique_under_any_sequence() {
        let mut collection = LocalCollection::new();
        let script = [
            ChangeEvent::Inserted(course("A", "1")),
            ChangeEvent::Inserted(course("B", "1")),
            ChangeEvent::Inserted(course("A", "2")),
            ChangeEvent::Updated(course("B", "2")),
            ChangeEvent::Deleted { id: "A".into() },
            ChangeEvent::Inserted(course("A", "3")),
            ChangeEvent::Updated(course("C", "1")),
            ChangeEvent::Inserted(course("B", "3")),
            ChangeEvent::Deleted { id: "Z".into() },
        ];
        for event in script {
            collection.apply(event);
            let unique: HashSet<_> = ids(&collection).into_iter().collect();
            assert_eq!(unique.len(), collection.len());
        }
        assert_eq!(ids(&collection), vec!["B", "A"]);
        assert_eq!(collection.get("B").unwrap().name, "2");
    }

    #[test]
    fn decodes_row_changes() {
        let insert = RowChange::inserted(
            "courses",
            serde_json::to_value(course("C3", "Foo")).unwrap(),
        );
        assert_eq!(
            ChangeEvent::<Course>::from_row_change(&insert).unwrap(),
            ChangeEvent::Inserted(course("C3", "Foo"))
        );

        let delete = RowChange::deleted("courses", json!({ "id": "C3" }));
        let event = ChangeEvent::<Course>::from_row_change(&delete).unwrap();
        assert_eq!(event.id(), "C3");
    }

    #[test]
    fn rejects_undecodable_and_foreign_changes() {
        let bad = RowChange::inserted("courses", json!({ "id": "C1" }));
        assert!(matches!(
            ChangeEvent::<Course>::from_row_change(&bad),
            Err(EventDecodeError::Row(_))
        ));

        let foreign = RowChange::inserted("rooms", json!({ "id": "r-1" }));
        assert!(matches!(
            ChangeEvent::<Course>::from_row_change(&foreign),
            Err(EventDecodeError::WrongTable { .. })
        ));

        let keyless = RowChange::deleted("rooms", json!({}));
        assert!(matches!(
            ChangeEvent::<Room>::from_row_change(&keyless),
            Err(EventDecodeError::MissingId)
        ));
    }
}
