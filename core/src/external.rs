//! Capture of `tracing` events as external log entries
//!
//! [`ExternalLogLayer`] is a tracing Layer that records events from the
//! host application's own logging into a [`Logger`], flagged with
//! [`LogOptions::FROM_EXTERNAL`]. The event target becomes the channel.
//! Events emitted by this crate are ignored so diagnostics about the history
//! never feed back into it.

use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::builder::LogRecordBuilder;
use crate::level::{LogLevel, LogOptions};
use crate::logger::Logger;
use crate::value::LogStr;

/// Target prefix of this crate's own diagnostics
const OWN_TARGET: &str = "njconsole_core";

/// A tracing Layer that stores events in a [`Logger`]'s history.
pub struct ExternalLogLayer {
    /// `None` writes to [`Logger::global`]
    logger: Option<Arc<Logger>>,
    min_level: LogLevel,
}

impl Default for ExternalLogLayer {
    fn default() -> Self {
        Self {
            logger: None,
            min_level: LogLevel::Debug,
        }
    }
}

impl ExternalLogLayer {
    /// Layer writing to the process-wide logger
    pub fn global() -> Self {
        Self::default()
    }

    /// Layer writing to a specific logger
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger: Some(logger),
            ..Self::default()
        }
    }

    /// Ignore events below `level`
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    fn logger(&self) -> &Logger {
        match &self.logger {
            Some(logger) => logger,
            None => Logger::global(),
        }
    }
}

impl<S: Subscriber> Layer<S> for ExternalLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if target.starts_with(OWN_TARGET) {
            return;
        }
        let level = map_level(metadata.level());
        if level < self.min_level {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecordBuilder::new(
            (LogOptions::HAS_CHANNEL | LogOptions::FROM_EXTERNAL).with_level(level),
        );
        record.push(LogStr::Static(target));
        if !visitor.message.is_empty() {
            record.push(visitor.message);
        }
        if !visitor.fields.is_empty() {
            record.push(visitor.fields);
        }
        self.logger().log(record);
    }
}

fn map_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        Level::INFO => LogLevel::Info,
        Level::DEBUG | Level::TRACE => LogLevel::Debug,
    }
}

/// Visitor that splits an event into its message and `name=value` fields.
#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: String,
}

impl EventVisitor {
    fn field_separator(&mut self) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.field_separator();
            let _ = write!(self.fields, "{}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.field_separator();
            let _ = write!(self.fields, "{}={}", field.name(), value);
        }
    }
}
