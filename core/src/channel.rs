//! Named log channels
//!
//! A [`LogChannel`] is a stateless handle that prefixes every record with
//! its name and forwards it to a [`Logger`]. Channels are cheap enough to
//! declare as constants:
//!
//! ```
//! use njconsole_core::{LogChannel, TaggedValue};
//!
//! const NET: LogChannel<'static> = LogChannel::new("Net");
//! NET.info([TaggedValue::from("connected to"), TaggedValue::from("lobby-3")]);
//! ```

use std::error::Error;
use std::sync::Arc;

use crate::DEBUG_LOGS_ENABLED;
use crate::builder::LogRecordBuilder;
use crate::entry::{MAX_VALUES, StackTrace};
use crate::level::{LogLevel, LogOptions};
use crate::logger::Logger;
use crate::value::{LogStr, TaggedValue};

/// Caller values accepted per channel record; the name takes the first slot
pub const MAX_CHANNEL_VALUES: usize = MAX_VALUES - 1;

/// Named front end over a [`Logger`]
#[derive(Clone)]
pub struct LogChannel<'l> {
    name: LogStr,
    logger: Option<&'l Logger>,
}

impl LogChannel<'static> {
    /// Channel writing to the process-wide logger
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: LogStr::Static(name),
            logger: None,
        }
    }
}

impl<'l> LogChannel<'l> {
    /// Channel writing to a specific logger
    pub fn with_logger(name: impl Into<LogStr>, logger: &'l Logger) -> Self {
        Self {
            name: name.into(),
            logger: Some(logger),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    fn logger(&self) -> &Logger {
        match self.logger {
            Some(logger) => logger,
            None => Logger::global(),
        }
    }

    /// Build a channel record: name first, then the caller's values
    ///
    /// # Panics
    ///
    /// Panics if more than `limit` values are supplied.
    fn record(
        &self,
        options: LogOptions,
        level: LogLevel,
        values: impl IntoIterator<Item = TaggedValue>,
        limit: usize,
    ) -> LogRecordBuilder {
        let mut record = LogRecordBuilder::new((options | LogOptions::HAS_CHANNEL).with_level(level));
        record.push(self.name.clone());
        record.values.extend(values);
        assert!(
            record.len() - 1 <= limit,
            "channel `{}` accepts at most {limit} values, got {}",
            self.name(),
            record.len() - 1
        );
        record
    }

    /// Log at an explicit level with extra options
    ///
    /// Level bits in `options` are replaced by `level`; the channel bit is
    /// always set.
    pub fn log(
        &self,
        level: LogLevel,
        options: LogOptions,
        values: impl IntoIterator<Item = TaggedValue>,
    ) -> usize {
        let record = self.record(options, level, values, MAX_CHANNEL_VALUES);
        self.logger().log(record)
    }

    /// Log at debug level
    ///
    /// Compiled out unless debug assertions or the `force-debug-logs`
    /// feature are enabled; returns `None` when skipped. Use
    /// [`nj_debug!`](crate::nj_debug) to also skip evaluating the arguments.
    #[inline(always)]
    pub fn debug(&self, values: impl IntoIterator<Item = TaggedValue>) -> Option<usize> {
        if DEBUG_LOGS_ENABLED {
            Some(self.log(LogLevel::Debug, LogOptions::empty(), values))
        } else {
            None
        }
    }

    pub fn info(&self, values: impl IntoIterator<Item = TaggedValue>) -> usize {
        self.log(LogLevel::Info, LogOptions::empty(), values)
    }

    pub fn warn(&self, values: impl IntoIterator<Item = TaggedValue>) -> usize {
        self.log(LogLevel::Warning, LogOptions::empty(), values)
    }

    pub fn error(&self, values: impl IntoIterator<Item = TaggedValue>) -> usize {
        self.log(LogLevel::Error, LogOptions::empty(), values)
    }

    /// Log an error at exception level
    ///
    /// The error is appended after the caller's values (at most four). A
    /// stack trace is captured if the configured policy asks for one.
    pub fn exception(
        &self,
        error: Arc<dyn Error + Send + Sync>,
        values: impl IntoIterator<Item = TaggedValue>,
    ) -> usize {
        let mut record = self.record(
            LogOptions::empty(),
            LogLevel::Exception,
            values,
            MAX_CHANNEL_VALUES - 1,
        );
        record.push(TaggedValue::from_error(error));
        self.logger().log(record)
    }

    /// Like [`exception`](Self::exception), with the trace the error was
    /// raised with instead of a freshly captured one
    pub fn exception_with_trace(
        &self,
        error: Arc<dyn Error + Send + Sync>,
        trace: StackTrace,
        values: impl IntoIterator<Item = TaggedValue>,
    ) -> usize {
        let mut record = self
            .record(
                LogOptions::empty(),
                LogLevel::Exception,
                values,
                MAX_CHANNEL_VALUES - 1,
            )
            .with_stack_trace(trace);
        record.push(TaggedValue::from_error(error));
        self.logger().log(record)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;
    use crate::config::LogConfig;

    #[derive(Debug)]
    struct Disconnected;
    impl fmt::Display for Disconnected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("peer disconnected")
        }
    }
    impl Error for Disconnected {}

    fn logger() -> Logger {
        Logger::new(&LogConfig {
            history_capacity: 16,
            ..LogConfig::default()
        })
    }

    #[test]
    fn test_channel_prefixes_name_and_sets_level() {
        let logger = logger();
        let net = LogChannel::with_logger("Net", &logger);

        let index = net.warn([TaggedValue::from("latency"), TaggedValue::from(250)]);
        let entry = logger.history().get_log(index).unwrap();

        assert_eq!(entry.level(), LogLevel::Warning);
        assert!(entry.has_channel());
        assert_eq!(entry.channel_name(), "Net");
        assert_eq!(&*entry.line_string(), "[Net] latency 250");
    }

    #[test]
    fn test_log_replaces_level_bits_in_options() {
        let logger = logger();
        let ui = LogChannel::with_logger("UI", &logger);

        let index = ui.log(
            LogLevel::Info,
            LogOptions::FORCE_STACK_TRACE.with_level(LogLevel::Exception),
            [TaggedValue::from("opened")],
        );
        let entry = logger.history().get_log(index).unwrap();
        assert_eq!(entry.level(), LogLevel::Info);
        assert!(entry.options().contains(LogOptions::FORCE_STACK_TRACE));
        assert!(entry.stack_trace().is_some());
    }

    #[test]
    fn test_channel_accepts_five_values() {
        let logger = logger();
        let ch = LogChannel::with_logger("Full", &logger);
        let index = ch.info((1..=5i32).map(TaggedValue::from));
        assert_eq!(logger.history().get_log(index).unwrap().count(), 6);
    }

    #[test]
    #[should_panic(expected = "at most 5 values")]
    fn test_channel_rejects_six_values() {
        let logger = logger();
        LogChannel::with_logger("Full", &logger).info((1..=6i32).map(TaggedValue::from));
    }

    #[test]
    fn test_exception_appends_error_last() {
        let logger = logger();
        let net = LogChannel::with_logger("Net", &logger);

        let index = net.exception(Arc::new(Disconnected), [TaggedValue::from("send failed")]);
        let entry = logger.history().get_log(index).unwrap();

        assert_eq!(entry.level(), LogLevel::Exception);
        assert_eq!(entry.plain_string(), "[Net] send failed peer disconnected");
        assert_eq!(entry.error().unwrap().to_string(), "peer disconnected");
        assert!(entry.stack_trace().is_some());
    }

    #[test]
    #[should_panic(expected = "at most 4 values")]
    fn test_exception_rejects_five_values() {
        let logger = logger();
        LogChannel::with_logger("Net", &logger)
            .exception(Arc::new(Disconnected), (1..=5i32).map(TaggedValue::from));
    }

    #[test]
    fn test_exception_with_trace_keeps_supplied_trace() {
        let logger = logger();
        let net = LogChannel::with_logger("Net", &logger);

        let index = net.exception_with_trace(
            Arc::new(Disconnected),
            StackTrace::Formatted("at socket::send".into()),
            [],
        );
        let entry = logger.history().get_log(index).unwrap();
        assert_eq!(entry.stack_trace().unwrap().to_string(), "at socket::send");
    }

    #[test]
    fn test_exception_trace_respects_level_policy() {
        let logger = logger();
        logger.set_stack_trace_level(LogLevel::Exception);
        let net = LogChannel::with_logger("Net", &logger);

        let error = net.error([TaggedValue::from("retrying")]);
        let exception = net.exception(Arc::new(Disconnected), []);

        let history = logger.history();
        assert!(history.get_log(error).unwrap().stack_trace().is_none());
        assert!(history.get_log(exception).unwrap().stack_trace().is_some());
    }

    #[test]
    fn test_debug_follows_build_flag() {
        let logger = logger();
        let ch = LogChannel::with_logger("Dbg", &logger);
        let result = ch.debug([TaggedValue::from("tick")]);

        assert_eq!(result.is_some(), DEBUG_LOGS_ENABLED);
        assert_eq!(logger.history().head(), usize::from(DEBUG_LOGS_ENABLED));
    }
}
