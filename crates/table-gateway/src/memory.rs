//! In-process table store.
//!
//! Behaves like the hosted database for the pieces callers depend on:
//! primary key and unique checks, not-null columns, server-assigned ids
//! and timestamps, newest-first listing, and a change feed.

use crate::{GatewayError, GatewayResult, TableGateway};
use async_trait::async_trait;
use change_stream::{MemoryChangeHub, RowChange};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Column rules for one memory table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    /// Assign a uuid `id` when the insert omits one.
    pub auto_keyed: bool,
    /// Columns that must be present and non-null.
    pub required: Vec<String>,
    /// Columns whose non-null values must be unique (besides `id`).
    pub unique: Vec<String>,
}

impl TableSchema {
    /// Client-keyed table with no extra rules.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_keyed(mut self) -> Self {
        self.auto_keyed = true;
        self
    }

    pub fn required(mut self, columns: &[&str]) -> Self {
        self.required = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    schema: TableSchema,
    /// Creation order, oldest first.
    rows: Vec<Map<String, Value>>,
}

impl MemoryTable {
    fn position(&self, id: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id))
    }

    fn check_required(&self, row: &Map<String, Value>) -> GatewayResult<()> {
        for column in &self.schema.required {
            if row.get(column).map_or(true, Value::is_null) {
                return Err(GatewayError::Constraint(format!(
                    "null value in column \"{}\" violates not-null constraint",
                    column
                )));
            }
        }
        Ok(())
    }

    /// Unique checks against every row except the one at `skip`.
    fn check_unique(&self, row: &Map<String, Value>, skip: Option<usize>) -> GatewayResult<()> {
        let columns = std::iter::once("id").chain(self.schema.unique.iter().map(String::as_str));
        for column in columns {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let duplicate = self
                .rows
                .iter()
                .enumerate()
                .any(|(index, other)| Some(index) != skip && other.get(column) == Some(value));
            if duplicate {
                return Err(GatewayError::Constraint(format!(
                    "duplicate key value violates unique constraint: Key ({})=({}) already exists",
                    column,
                    display_value(value)
                )));
            }
        }
        Ok(())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn into_object(value: Value) -> GatewayResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::Constraint(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Table gateway over in-process tables.
///
/// Tables are created on first use with a client-keyed schema unless
/// defined up front with [`MemoryGateway::define_table`].
#[derive(Clone, Default)]
pub struct MemoryGateway {
    tables: Arc<Mutex<HashMap<String, MemoryTable>>>,
    hub: Option<MemoryChangeHub>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish every committed change to `hub`.
    pub fn with_hub(hub: MemoryChangeHub) -> Self {
        Self {
            hub: Some(hub),
            ..Self::default()
        }
    }

    /// Create or redefine a table. Existing rows are kept.
    pub fn define_table(&self, table: &str, schema: TableSchema) {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .schema = schema;
    }

    /// Insert rows directly, bypassing checks and the change feed.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.lock();
        let entry = tables.entry(table.to_string()).or_default();
        entry
            .rows
            .extend(rows.into_iter().filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            }));
    }

    /// Current rows in creation order, oldest first.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Make every call fail as if the network were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> GatewayResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn publish(&self, change: RowChange) {
        if let Some(hub) = &self.hub {
            hub.publish(change);
        }
    }
}

#[async_trait]
impl TableGateway for MemoryGateway {
    async fn list(&self, table: &str) -> GatewayResult<Vec<Value>> {
        self.check_available()?;
        let tables = self.tables.lock();
        Ok(tables
            .get(table)
            .map(|t| t.rows.iter().rev().cloned().map(Value::Object).collect())
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, fields: Value) -> GatewayResult<()> {
        self.check_available()?;
        let mut row = into_object(fields)?;
        row.remove("created_at");
        row.remove("updated_at");

        let mut tables = self.tables.lock();
        let entry = tables.entry(table.to_string()).or_default();

        if entry.schema.auto_keyed && row.get("id").map_or(true, Value::is_null) {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if row.get("id").map_or(true, Value::is_null) {
            return Err(GatewayError::Constraint(
                "null value in column \"id\" violates not-null constraint".to_string(),
            ));
        }
        entry.check_required(&row)?;
        entry.check_unique(&row, None)?;

        let now = now_timestamp();
        row.insert("created_at".to_string(), now.clone());
        row.insert("updated_at".to_string(), now);
        entry.rows.push(row.clone());

        // Published under the lock so subscribers see commit order.
        self.publish(RowChange::inserted(table, Value::Object(row)));
        debug!(table = %table, "memory insert committed");
        Ok(())
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> GatewayResult<()> {
        self.check_available()?;
        let patch = into_object(patch)?;

        let mut tables = self.tables.lock();
        let not_found = || GatewayError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        };
        let entry = tables.get_mut(table).ok_or_else(not_found)?;
        let index = entry.position(id).ok_or_else(not_found)?;

        let mut row = entry.rows[index].clone();
        for (column, value) in patch {
            if column != "created_at" && column != "updated_at" {
                row.insert(column, value);
            }
        }
        if row.get("id").map_or(true, Value::is_null) {
            return Err(GatewayError::Constraint(
                "null value in column \"id\" violates not-null constraint".to_string(),
            ));
        }
        entry.check_required(&row)?;
        entry.check_unique(&row, Some(index))?;
        row.insert("updated_at".to_string(), now_timestamp());
        entry.rows[index] = row.clone();

        let mut old = Map::new();
        old.insert("id".to_string(), Value::String(id.to_string()));
        self.publish(RowChange::updated(table, Value::Object(row), Value::Object(old)));
        debug!(table = %table, id = %id, "memory update committed");
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> GatewayResult<()> {
        self.check_available()?;
        let mut tables = self.tables.lock();
        let not_found = || GatewayError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        };
        let entry = tables.get_mut(table).ok_or_else(not_found)?;
        let index = entry.position(id).ok_or_else(not_found)?;
        entry.rows.remove(index);

        // Default replica identity: the pre-image only carries the key.
        let mut old = Map::new();
        old.insert("id".to_string(), Value::String(id.to_string()));
        self.publish(RowChange::deleted(table, Value::Object(old)));
        debug!(table = %table, id = %id, "memory delete committed");
        Ok(())
    }
}

impl std::fmt::Debug for MemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGateway")
            .field("publishes", &self.hub.is_some())
            .finish_non_exhaustive()
    }
}
