//! Configuration, paths, and logging shared by the campus sync crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, RealtimeSettings, DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SUPABASE_ANON_KEY, DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, LogOptions};
pub use paths::Paths;
