//! Remote table access.
//!
//! [`TableGateway`] is the request/response side of a table: list, insert,
//! update and delete rows as JSON objects. None of the mutating calls
//! return the written row; callers learn about committed writes through
//! the change stream.
//!
//! Two implementations are provided:
//! - [`SupabaseGateway`] talks to PostgREST over HTTPS
//! - [`MemoryGateway`] keeps tables in process and publishes every commit
//!   to a [`change_stream::MemoryChangeHub`]

mod error;
mod gateway;
mod memory;
mod supabase;

pub use error::{ErrorCategory, GatewayError, GatewayResult};
pub use gateway::TableGateway;
pub use memory::{MemoryGateway, TableSchema};
pub use supabase::SupabaseGateway;
