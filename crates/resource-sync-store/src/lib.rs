//! Live, locally held collections of remote table rows.
//!
//! A [`ResourceStore`] bulk-loads one table, subscribes to its change
//! stream, and keeps a [`LocalCollection`] in step with every committed
//! insert, update and delete. Mutations go to the remote table only; the
//! collection changes when the resulting change event arrives.
//!
//! Every outcome is reported through a [`Notifier`].

mod collection;
mod notification;
mod store;

pub use collection::{Applied, ChangeEvent, EventDecodeError, LocalCollection};
pub use notification::{
    ChannelNotifier, Notification, NotificationKind, Notifier, Operation, TracingNotifier,
};
pub use store::{LoadStatus, MutationStatus, ResourceStore, StoreSnapshot};

pub use change_stream::RealtimeStatus;
pub use table_gateway::ErrorCategory;
