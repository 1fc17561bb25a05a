//! Log entries
//!
//! A [`LogEntry`] is one slot of the history ring. Slots are allocated once
//! and overwritten in place by [`LogEntry::set`] every time the ring wraps,
//! so an entry's value array is fixed at [`MAX_VALUES`].

mod line;

use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Local};

use crate::builder::LogRecordBuilder;
use crate::level::{LogLevel, LogOptions};
use crate::object_ref::{LogObject, ObjectRefPool, WeakRef};
use crate::value::{TaggedValue, ValueTag};

/// Values a single entry can hold, channel name included
pub const MAX_VALUES: usize = 6;

/// Stack trace attached to an entry
#[derive(Debug)]
pub enum StackTrace {
    /// Trace supplied as text, e.g. by an external log source
    Formatted(String),
    /// Trace captured in-process
    Captured(Backtrace),
}

impl StackTrace {
    /// Capture the current thread's stack, regardless of `RUST_BACKTRACE`
    pub fn capture() -> Self {
        StackTrace::Captured(Backtrace::force_capture())
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackTrace::Formatted(text) => f.write_str(text),
            StackTrace::Captured(backtrace) => write!(f, "{backtrace}"),
        }
    }
}

/// Write position stamped onto a slot by the writer that filled it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SlotStamp {
    pub(crate) generation: u64,
    pub(crate) index: usize,
}

/// One recorded log message
pub struct LogEntry {
    values: [TaggedValue; MAX_VALUES],
    count: usize,
    options: LogOptions,
    stack_trace: Option<Arc<StackTrace>>,
    context: Option<WeakRef>,
    timestamp: DateTime<Local>,
    cached_line: OnceLock<Arc<str>>,
    pub(crate) stamp: Option<SlotStamp>,
}

impl Default for LogEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEntry {
    /// Create an empty slot
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|_| TaggedValue::NONE),
            count: 0,
            options: LogOptions::empty(),
            stack_trace: None,
            context: None,
            timestamp: DateTime::<Local>::default(),
            cached_line: OnceLock::new(),
            stamp: None,
        }
    }

    /// Overwrite this entry with a committed record
    ///
    /// Pooled cells held by the previous contents are returned before the
    /// new values are installed. Plain object arguments are downgraded to
    /// weak references; errors and explicit strong references stay strong.
    ///
    /// # Panics
    ///
    /// Panics if the record holds more than [`MAX_VALUES`] values.
    pub fn set(&mut self, record: LogRecordBuilder) {
        let LogRecordBuilder {
            values,
            options,
            stack_trace,
            context,
        } = record;
        assert!(
            values.len() <= MAX_VALUES,
            "a log entry holds at most {MAX_VALUES} values, got {}",
            values.len()
        );

        self.release_refs();

        self.count = values.len();
        for (slot, value) in self.values.iter_mut().zip(values) {
            *slot = value.into_stored();
        }
        self.options = options;
        self.stack_trace = stack_trace;
        self.context = context.map(|context| ObjectRefPool::acquire(Some(&context)));
        self.timestamp = Local::now();
        self.cached_line = OnceLock::new();
    }

    /// Independent snapshot of this entry
    ///
    /// Values are copied (weak references take their own cells); the stack
    /// trace is shared.
    pub fn copy(&self) -> Self {
        Self {
            values: self.values.clone(),
            count: self.count,
            options: self.options,
            stack_trace: self.stack_trace.clone(),
            context: self.context.clone(),
            timestamp: self.timestamp,
            cached_line: self.cached_line.clone(),
            stamp: self.stamp,
        }
    }

    /// Return every pooled cell and empty the value array
    pub(crate) fn release_refs(&mut self) {
        for value in &mut self.values[..self.count] {
            value.release();
        }
        self.count = 0;
        if let Some(context) = self.context.take() {
            ObjectRefPool::release(context);
        }
    }

    /// Populated values, channel name included
    pub fn values(&self) -> &[TaggedValue] {
        &self.values[..self.count]
    }

    /// Values after the channel name
    pub fn message_values(&self) -> &[TaggedValue] {
        let values = self.values();
        if self.options.has_channel() && !values.is_empty() {
            &values[1..]
        } else {
            values
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn options(&self) -> LogOptions {
        self.options
    }

    pub fn level(&self) -> LogLevel {
        self.options.level()
    }

    pub fn has_channel(&self) -> bool {
        self.options.has_channel()
    }

    pub fn is_from_external(&self) -> bool {
        self.options.is_from_external()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn stack_trace(&self) -> Option<&StackTrace> {
        self.stack_trace.as_deref()
    }

    /// External context object, if one was attached and is still alive
    pub fn context(&self) -> Option<Arc<dyn LogObject>> {
        self.context.as_ref().and_then(WeakRef::upgrade)
    }

    /// Channel name, or `""` when the entry has no channel
    pub fn channel_name(&self) -> &str {
        if !self.options.has_channel() {
            return "";
        }
        self.values()
            .first()
            .and_then(TaggedValue::as_str)
            .unwrap_or_default()
    }

    /// Last error value, if the entry logged one
    pub fn error(&self) -> Option<&Arc<dyn Error + Send + Sync>> {
        self.values().iter().rev().find_map(TaggedValue::as_error)
    }

    /// Single-line display string with markup, formatted once and cached
    ///
    /// A lone string value without a channel is returned unchanged.
    pub fn line_string(&self) -> Arc<str> {
        Arc::clone(self.cached_line.get_or_init(|| {
            if let [value] = self.values() {
                if !self.options.has_channel() && value.tag() == ValueTag::String {
                    if let Some(text) = value.as_log_str() {
                        return text.to_shared();
                    }
                }
            }
            Arc::from(line::compose(self, true))
        }))
    }

    /// Single-line display string without markup (not cached)
    pub fn plain_string(&self) -> String {
        line::compose(self, false)
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEntry")
            .field("level", &self.level())
            .field("channel", &self.channel_name())
            .field("values", &self.values())
            .field("timestamp", &self.timestamp)
            .field("stamp", &self.stamp)
            .finish()
    }
}
