//! Logging initialization.
//!
//! Every binary calls [`init_logging`] once at startup and then uses the
//! standard `tracing` macros. Logs go to stderr in compact form and,
//! optionally, to an append-only JSONL file that can be tailed with `jq`.

use crate::{CoreResult, Paths};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Options for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Default level filter, overridden by `RUST_LOG`.
    pub level: String,
    /// JSONL file to append to, if any.
    pub log_file: Option<PathBuf>,
}

impl LogOptions {
    /// Stderr-only logging at the given level.
    pub fn stderr(level: &str) -> Self {
        Self {
            level: level.to_string(),
            log_file: None,
        }
    }

    /// Stderr logging plus the JSONL file under `paths`.
    pub fn with_file(level: &str, paths: &Paths) -> Self {
        Self {
            level: level.to_string(),
            log_file: Some(paths.log_file()),
        }
    }
}

/// Append-only file writer, flushed per write so each line lands whole.
#[derive(Clone)]
struct LineFlushedWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl LineFlushedWriter {
    fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for LineFlushedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for LineFlushedWriter {
    type Writer = LineFlushedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber.
///
/// Returns an error only when the log file cannot be opened. Calling this
/// twice is harmless: the second subscriber is rejected and ignored.
pub fn init_logging(options: &LogOptions) -> CoreResult<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_writer(io::stderr)
        .with_filter(env_filter(&options.level));

    let file_layer = match &options.log_file {
        Some(path) => {
            let writer = LineFlushedWriter::open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(writer)
                    .with_filter(env_filter(&options.level)),
            )
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            level = %options.level,
            log_file = ?options.log_file,
            "logging initialized"
        );
    }

    Ok(())
}
