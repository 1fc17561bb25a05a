//! Logging macros
//!
//! Each macro takes a [`LogChannel`](crate::LogChannel) followed by up to five
//! values convertible into [`TaggedValue`](crate::TaggedValue).

/// Log at debug level; compiled out together with its arguments in release
/// builds without the `force-debug-logs` feature
#[macro_export]
macro_rules! nj_debug {
    ($channel:expr $(, $value:expr)* $(,)?) => {
        if $crate::DEBUG_LOGS_ENABLED {
            let _ = $channel.debug([$($crate::TaggedValue::from($value)),*]);
        }
    };
}

/// Log at info level
#[macro_export]
macro_rules! nj_info {
    ($channel:expr $(, $value:expr)* $(,)?) => {
        $channel.info([$($crate::TaggedValue::from($value)),*])
    };
}

/// Log at warning level
#[macro_export]
macro_rules! nj_warn {
    ($channel:expr $(, $value:expr)* $(,)?) => {
        $channel.warn([$($crate::TaggedValue::from($value)),*])
    };
}

/// Log at error level
#[macro_export]
macro_rules! nj_error {
    ($channel:expr $(, $value:expr)* $(,)?) => {
        $channel.error([$($crate::TaggedValue::from($value)),*])
    };
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::{DEBUG_LOGS_ENABLED, LogChannel, LogConfig, LogLevel, Logger};

    #[test]
    fn test_level_macros() {
        let logger = Logger::new(&LogConfig::default());
        let ch = LogChannel::with_logger("Game", &logger);

        let info = nj_info!(ch, "score", 1200u32);
        let warn = nj_warn!(ch, "slow frame", 21.5f32);
        let error = nj_error!(ch, "missing asset");

        let history = logger.history();
        assert_eq!(
            history.get_log(info).unwrap().plain_string(),
            "[Game] score 1200"
        );
        assert_eq!(history.get_log(warn).unwrap().level(), LogLevel::Warning);
        assert_eq!(
            history.get_log(warn).unwrap().plain_string(),
            "[Game] slow frame 21.500"
        );
        assert_eq!(history.get_log(error).unwrap().level(), LogLevel::Error);
    }

    #[test]
    fn test_debug_macro_skips_argument_evaluation_when_disabled() {
        let logger = Logger::new(&LogConfig::default());
        let ch = LogChannel::with_logger("Game", &logger);
        let evaluated = Cell::new(false);
        let probe = || {
            evaluated.set(true);
            "tick"
        };

        nj_debug!(ch, probe());

        assert_eq!(evaluated.get(), DEBUG_LOGS_ENABLED);
        assert_eq!(logger.history().head(), usize::from(DEBUG_LOGS_ENABLED));
    }
}
