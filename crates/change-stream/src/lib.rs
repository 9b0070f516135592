//! Row-level change subscriptions.
//!
//! This crate provides:
//! - [`ChangeStream`], the subscribe side of a table: every committed
//!   insert, update, or delete on the table arrives as a [`RowChange`]
//! - [`RealtimeClient`], a Supabase Realtime (Phoenix channel) WebSocket
//!   client with heartbeat and reconnect-with-backoff
//! - [`MemoryChangeHub`], an in-process broadcast hub fed by an in-memory
//!   table store
//!
//! Delivery is at-least-once within a connection. Changes committed while a
//! connection is down are not replayed; the gap is reported through
//! [`RealtimeStatus::Disconnected`].

mod error;
mod event;
mod memory;
mod messages;
mod realtime;
mod subscription;

pub use error::{StreamError, StreamResult};
pub use event::{ChangeKind, RealtimeStatus, RowChange, StreamItem};
pub use memory::MemoryChangeHub;
pub use messages::{PhoenixMessage, PostgresChangeData};
pub use realtime::{RealtimeClient, RealtimeConfig};
pub use subscription::{ChangeStream, Subscription};
