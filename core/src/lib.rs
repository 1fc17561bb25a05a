//! NjConsole Core - Logging core for the NjConsole developer console
//!
//! This crate records log messages into a fixed-memory, thread-safe history
//! that a console UI can browse, pin and export.
//!
//! # Architecture
//!
//! - [`TaggedValue`] - Allocation-light log argument with a canonical text form
//! - [`ObjectRefPool`] - Per-thread pool of weak-reference cells for object arguments
//! - [`LogRecordBuilder`] - Not-yet-committed record, built on the stack
//! - [`LogEntry`] - One stored message, overwritten in place as the ring wraps
//! - [`LogHistory`] - Ring buffer with a backlog that preserves pinned history
//! - [`Logger`] / [`LogChannel`] - Front end with handler fan-out and named channels
//! - [`ExternalLogLayer`] - `tracing` layer feeding host events into the history

mod macros;

pub mod builder;
pub mod channel;
pub mod config;
pub mod entry;
pub mod error;
pub mod export;
pub mod external;
pub mod history;
pub mod level;
pub mod logger;
pub mod object_ref;
pub mod value;

/// Whether the debug log tier is compiled in
///
/// True in builds with debug assertions, or with the `force-debug-logs`
/// feature. Checked as a constant so disabled calls are removed entirely.
pub const DEBUG_LOGS_ENABLED: bool = cfg!(any(debug_assertions, feature = "force-debug-logs"));

// Re-export core types
pub use builder::LogRecordBuilder;
pub use channel::{LogChannel, MAX_CHANNEL_VALUES};
pub use config::LogConfig;
pub use entry::{LogEntry, MAX_VALUES, StackTrace};
pub use error::LogError;
pub use export::export_as_text;
pub use external::ExternalLogLayer;
pub use history::{BacklogPin, DEFAULT_HISTORY_CAPACITY, HistoryStats, LogHistory};
pub use level::{LogLevel, LogOptions};
pub use logger::{LogHandler, Logger, MAX_HANDLERS};
pub use object_ref::{LogObject, OBJECT_REF_POOL_DEPTH, ObjectRefPool, WeakRef};
pub use value::{Color, DateKind, LogStr, TaggedValue, ValueTag};
