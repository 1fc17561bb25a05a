//! Logger front end and handler dispatch
//!
//! [`Logger`] owns the history and the registered [`LogHandler`]s. Every
//! committed record is stored first, then handed to the handlers on the
//! calling thread in registration order.

use std::cell::Cell;
use std::error::Error;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use smallvec::SmallVec;
use tracing::{debug, error};

use crate::builder::LogRecordBuilder;
use crate::config::{self, LogConfig};
use crate::entry::{LogEntry, StackTrace};
use crate::history::LogHistory;
use crate::level::LogLevel;
use crate::value::TaggedValue;

/// Maximum number of registered handlers
pub const MAX_HANDLERS: usize = 16;

/// Receives every committed log entry
///
/// Handlers run synchronously on the logging thread after the entry is
/// stored, without any history lock held. An entry logged from inside a
/// handler is stored but not dispatched again.
pub trait LogHandler: Send + Sync {
    /// Called for every committed entry with its absolute history index
    fn on_log(&self, index: usize, entry: &LogEntry);

    /// Called after [`on_log`](Self::on_log) for exception entries
    fn on_exception(&self, _error: &(dyn Error + Send + Sync + 'static), _entry: &LogEntry) {}
}

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as dispatching until dropped
struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Option<Self> {
        DISPATCHING
            .try_with(|flag| (!flag.replace(true)).then_some(DispatchGuard))
            .ok()
            .flatten()
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        let _ = DISPATCHING.try_with(|flag| flag.set(false));
    }
}

type HandlerList = SmallVec<[Arc<dyn LogHandler>; MAX_HANDLERS]>;

/// Logging front end: history plus handler fan-out
pub struct Logger {
    history: LogHistory,
    handlers: RwLock<HandlerList>,
    stack_trace_level: AtomicU8,
}

static GLOBAL: OnceLock<Logger> = OnceLock::new();

impl Default for Logger {
    fn default() -> Self {
        Self::new(&LogConfig::default())
    }
}

impl Logger {
    pub fn new(config: &LogConfig) -> Self {
        Self {
            history: LogHistory::with_backlog_shrink_threshold(
                config.clamped_history_capacity(),
                config.backlog_shrink_threshold,
            ),
            handlers: RwLock::new(SmallVec::new()),
            stack_trace_level: AtomicU8::new(config.stack_trace_level as u8),
        }
    }

    /// Process-wide logger, created from the on-disk config on first use
    pub fn global() -> &'static Logger {
        GLOBAL.get_or_init(|| Logger::new(&config::load()))
    }

    /// Install the process-wide logger with an explicit config
    ///
    /// Returns `false` if the global logger already exists.
    pub fn init_global(config: &LogConfig) -> bool {
        let mut installed = false;
        GLOBAL.get_or_init(|| {
            installed = true;
            Logger::new(config)
        });
        installed
    }

    pub fn history(&self) -> &LogHistory {
        &self.history
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Register a handler
    ///
    /// # Panics
    ///
    /// Panics once [`MAX_HANDLERS`] are already registered. The ceiling is
    /// small on purpose: hitting it means handlers are being registered in
    /// a loop.
    pub fn add_handler(&self, handler: Arc<dyn LogHandler>) {
        let count = {
            let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
            if handlers.len() < MAX_HANDLERS {
                handlers.push(handler);
                Some(handlers.len())
            } else {
                None
            }
        };
        let Some(count) = count else {
            error!(limit = MAX_HANDLERS, "too many log handlers registered");
            panic!("too many log handlers registered (limit is {MAX_HANDLERS})");
        };
        debug!(count, "log handler registered");
    }

    /// Unregister a handler by identity; returns whether it was found
    pub fn remove_handler(&self, handler: &Arc<dyn LogHandler>) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        before != handlers.len()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // =========================================================================
    // Stack trace policy
    // =========================================================================

    /// Minimum level that captures a stack trace
    pub fn stack_trace_level(&self) -> LogLevel {
        LogLevel::from_bits(self.stack_trace_level.load(Ordering::Relaxed))
    }

    pub fn set_stack_trace_level(&self, level: LogLevel) {
        self.stack_trace_level.store(level as u8, Ordering::Relaxed);
    }

    fn apply_stack_trace_policy(&self, record: &mut LogRecordBuilder) {
        let options = record.options;
        if !options.includes_stack_trace(self.stack_trace_level()) {
            record.stack_trace = None;
        } else if record.stack_trace.is_none() {
            record.stack_trace = Some(Arc::new(StackTrace::capture()));
        }
    }

    // =========================================================================
    // Logging
    // =========================================================================

    /// Store a record and notify handlers; returns the history index
    ///
    /// # Panics
    ///
    /// Panics if the record holds more than
    /// [`MAX_VALUES`](crate::MAX_VALUES) values.
    pub fn log(&self, mut record: LogRecordBuilder) -> usize {
        self.apply_stack_trace_policy(&mut record);

        let Some(_guard) = DispatchGuard::enter() else {
            return self.history.add(record);
        };
        let handlers: HandlerList = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if handlers.is_empty() {
            return self.history.add(record);
        }

        let (index, committed) = self.history.commit(record);
        if let Some(entry) = committed {
            dispatch(&handlers, index, &entry);
        }
        index
    }

    /// Log values at `level` without a channel
    pub fn log_values(
        &self,
        level: LogLevel,
        values: impl IntoIterator<Item = TaggedValue>,
    ) -> usize {
        self.log(LogRecordBuilder::from_values(values).with_level(level))
    }
}

fn dispatch(handlers: &[Arc<dyn LogHandler>], index: usize, entry: &LogEntry) {
    for handler in handlers {
        handler.on_log(index, entry);
    }
    if entry.options().level() != LogLevel::Exception {
        return;
    }
    if let Some(err) = entry.error() {
        for handler in handlers {
            handler.on_exception(err.as_ref(), entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::level::LogOptions;
    use crate::object_ref::{LogObject, OBJECT_REF_POOL_DEPTH, ObjectRefPool, WeakRef};

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<(usize, String)>>,
        exceptions: Mutex<Vec<String>>,
    }

    impl LogHandler for Recorder {
        fn on_log(&self, index: usize, entry: &LogEntry) {
            self.lines
                .lock()
                .unwrap()
                .push((index, entry.plain_string()));
        }

        fn on_exception(&self, error: &(dyn Error + Send + Sync + 'static), _entry: &LogEntry) {
            self.exceptions.lock().unwrap().push(error.to_string());
        }
    }

    /// Logs again from inside its callback
    struct Echo {
        logger: Arc<Logger>,
        calls: AtomicUsize,
    }

    impl LogHandler for Echo {
        fn on_log(&self, _index: usize, _entry: &LogEntry) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.logger
                .log_values(LogLevel::Info, [TaggedValue::from("echo")]);
        }
    }

    struct Silent;
    impl LogHandler for Silent {
        fn on_log(&self, _index: usize, _entry: &LogEntry) {}
    }

    struct Enemy;
    impl LogObject for Enemy {}

    #[derive(Debug)]
    struct Boom;
    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }
    impl Error for Boom {}

    fn small_logger() -> Logger {
        Logger::new(&LogConfig {
            history_capacity: 8,
            ..LogConfig::default()
        })
    }

    #[test]
    fn test_handlers_run_in_registration_order_after_storage() {
        let logger = small_logger();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        logger.add_handler(first.clone());
        logger.add_handler(second.clone());

        let index = logger.log_values(LogLevel::Info, [TaggedValue::from("hello")]);

        assert_eq!(*first.lines.lock().unwrap(), vec![(index, "hello".to_string())]);
        assert_eq!(*second.lines.lock().unwrap(), vec![(index, "hello".to_string())]);
        assert_eq!(logger.history().head(), 1);
    }

    #[test]
    fn test_handler_limit_accepts_max() {
        let logger = small_logger();
        for _ in 0..MAX_HANDLERS {
            logger.add_handler(Arc::new(Recorder::default()));
        }
        assert_eq!(logger.handler_count(), MAX_HANDLERS);
    }

    #[test]
    #[should_panic(expected = "too many log handlers registered (limit is 16)")]
    fn test_handler_past_limit_panics() {
        let logger = small_logger();
        for _ in 0..=MAX_HANDLERS {
            logger.add_handler(Arc::new(Recorder::default()));
        }
    }

    #[test]
    fn test_dispatch_keeps_object_cells_pooled() {
        let seeded: Vec<WeakRef> = (0..OBJECT_REF_POOL_DEPTH)
            .map(|_| ObjectRefPool::acquire(None))
            .collect();
        drop(seeded);
        assert_eq!(ObjectRefPool::available(), OBJECT_REF_POOL_DEPTH);

        let logger = small_logger();
        logger.add_handler(Arc::new(Silent));
        let enemy = Arc::new(Enemy);
        let log_enemy = || {
            logger.log_values(
                LogLevel::Info,
                [TaggedValue::from("hit"), TaggedValue::from(Arc::clone(&enemy))],
            )
        };

        // Filling the ring parks one cell in each of the 8 slots
        for _ in 0..8 {
            log_enemy();
        }
        assert_eq!(ObjectRefPool::available(), OBJECT_REF_POOL_DEPTH - 8);

        // Overwrites hand the old cell back for every new one taken
        for _ in 0..32 {
            log_enemy();
        }
        assert_eq!(ObjectRefPool::available(), OBJECT_REF_POOL_DEPTH - 8);
    }

    #[test]
    fn test_remove_handler() {
        let logger = small_logger();
        let recorder = Arc::new(Recorder::default());
        let handler: Arc<dyn LogHandler> = recorder.clone();
        logger.add_handler(Arc::clone(&handler));

        assert!(logger.remove_handler(&handler));
        assert!(!logger.remove_handler(&handler));
        logger.log_values(LogLevel::Info, [TaggedValue::from("unseen")]);
        assert!(recorder.lines.lock().unwrap().is_empty());
    }

    #[test]
    fn test_exception_handlers_receive_error() {
        let logger = small_logger();
        let recorder = Arc::new(Recorder::default());
        logger.add_handler(recorder.clone());

        logger.log(
            LogRecordBuilder::from_values([
                TaggedValue::from("failed"),
                TaggedValue::from_error(Arc::new(Boom)),
            ])
            .with_level(LogLevel::Exception),
        );
        logger.log_values(LogLevel::Error, [TaggedValue::from_error(Arc::new(Boom))]);

        assert_eq!(*recorder.exceptions.lock().unwrap(), vec!["boom".to_string()]);
        assert_eq!(recorder.lines.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_logging_from_handler_is_stored_not_redispatched() {
        let logger = Arc::new(small_logger());
        let echo = Arc::new(Echo {
            logger: Arc::clone(&logger),
            calls: AtomicUsize::new(0),
        });
        let handler: Arc<dyn LogHandler> = echo.clone();
        logger.add_handler(Arc::clone(&handler));

        logger.log_values(LogLevel::Info, [TaggedValue::from("first")]);

        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
        assert_eq!(logger.history().head(), 2);

        // Dispatch is re-enabled once the outer call returns
        logger.log_values(LogLevel::Info, [TaggedValue::from("second")]);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
        logger.remove_handler(&handler);
    }

    #[test]
    fn test_stack_trace_policy() {
        let logger = small_logger();
        assert_eq!(logger.stack_trace_level(), LogLevel::Error);

        let info = logger.log_values(LogLevel::Info, [TaggedValue::from("a")]);
        let error = logger.log_values(LogLevel::Error, [TaggedValue::from("b")]);
        let forced = logger.log(
            LogRecordBuilder::from_values([TaggedValue::from("c")])
                .with_options(LogOptions::FORCE_STACK_TRACE.with_level(LogLevel::Debug)),
        );
        let suppressed = logger.log(
            LogRecordBuilder::from_values([TaggedValue::from("d")])
                .with_options(LogOptions::FORCE_NO_STACK_TRACE.with_level(LogLevel::Exception))
                .with_stack_trace(StackTrace::Formatted("given".into())),
        );

        let has_trace = |index| {
            logger
                .history()
                .with_log(index, |entry| entry.stack_trace().is_some())
                .unwrap()
        };
        assert!(!has_trace(info));
        assert!(has_trace(error));
        assert!(has_trace(forced));
        assert!(!has_trace(suppressed));

        logger.set_stack_trace_level(LogLevel::Debug);
        let info = logger.log_values(LogLevel::Info, [TaggedValue::from("e")]);
        assert!(has_trace(info));
    }

    #[test]
    fn test_supplied_stack_trace_is_kept() {
        let logger = small_logger();
        let index = logger.log(
            LogRecordBuilder::from_values([TaggedValue::from("x")])
                .with_level(LogLevel::Error)
                .with_stack_trace(StackTrace::Formatted("at remote".into())),
        );
        let trace = logger
            .history()
            .with_log(index, |entry| entry.stack_trace().map(ToString::to_string))
            .unwrap();
        assert_eq!(trace.as_deref(), Some("at remote"));
    }
}
