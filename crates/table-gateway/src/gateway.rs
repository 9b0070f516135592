//! The table gateway trait.

use crate::GatewayResult;
use async_trait::async_trait;
use serde_json::Value;

/// Request/response access to remote tables.
///
/// Rows are JSON objects whose keys are column names. The mutating calls
/// only report success or failure.
#[async_trait]
pub trait TableGateway: Send + Sync {
    /// All rows of `table`, most recently created first.
    async fn list(&self, table: &str) -> GatewayResult<Vec<Value>>;

    /// Insert one row. Fails with `Constraint` on a missing required field
    /// or a duplicated unique key.
    async fn insert(&self, table: &str, fields: Value) -> GatewayResult<()>;

    /// Apply a partial update to the row with `id`.
    async fn update(&self, table: &str, id: &str, patch: Value) -> GatewayResult<()>;

    /// Delete the row with `id`. Deleting a missing row is `NotFound`.
    async fn delete(&self, table: &str, id: &str) -> GatewayResult<()>;
}
