//! Log levels and the per-entry options word

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Severity of a log entry
///
/// Stored in the low three bits of [`LogOptions`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    #[default]
    Info = 1,
    Warning = 2,
    Error = 3,
    Exception = 4,
}

impl LogLevel {
    /// All levels, lowest severity first
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Exception,
    ];

    /// Decode a level from its three-bit representation
    ///
    /// Values above `Exception` saturate to `Exception`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            3 => LogLevel::Error,
            _ => LogLevel::Exception,
        }
    }

    /// Upper-case display name used in exported text
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Exception => "EXCEPTION",
        }
    }
}

bitflags! {
    /// Flags word carried by every entry and record builder
    ///
    /// Bits 0-2 hold the [`LogLevel`]; use [`LogOptions::level`] and
    /// [`LogOptions::with_level`] rather than touching them directly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LogOptions: u16 {
        /// Mask over the three level bits
        const LEVEL_MASK = 0b0000_0111;
        /// The first value is the channel name
        const HAS_CHANNEL = 1 << 3;
        /// Always attach a stack trace
        const FORCE_STACK_TRACE = 1 << 4;
        /// Never attach a stack trace (wins over `FORCE_STACK_TRACE`)
        const FORCE_NO_STACK_TRACE = 1 << 5;
        /// Entry was captured from the host's own logging system
        const FROM_EXTERNAL = 1 << 6;
    }
}

impl LogOptions {
    /// Level stored in the low bits
    pub fn level(self) -> LogLevel {
        LogLevel::from_bits((self.bits() & Self::LEVEL_MASK.bits()) as u8)
    }

    /// Copy of these options with the level bits replaced
    pub fn with_level(self, level: LogLevel) -> Self {
        Self::from_bits_retain((self.bits() & !Self::LEVEL_MASK.bits()) | level as u16)
    }

    /// Whether the first value is a channel name
    pub fn has_channel(self) -> bool {
        self.contains(Self::HAS_CHANNEL)
    }

    /// Whether the entry came from the host's logging system
    pub fn is_from_external(self) -> bool {
        self.contains(Self::FROM_EXTERNAL)
    }

    /// Stack-trace policy for an entry carrying these options
    ///
    /// Included when forced or when the level reaches `min_level`;
    /// `FORCE_NO_STACK_TRACE` always wins.
    pub fn includes_stack_trace(self, min_level: LogLevel) -> bool {
        if self.contains(Self::FORCE_NO_STACK_TRACE) {
            return false;
        }
        self.contains(Self::FORCE_STACK_TRACE) || self.level() >= min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trips_through_options() {
        for level in LogLevel::ALL {
            let options = LogOptions::HAS_CHANNEL.with_level(level);
            assert_eq!(options.level(), level);
            assert!(options.has_channel());
        }
    }

    #[test]
    fn test_with_level_replaces_previous_level() {
        let options = LogOptions::empty()
            .with_level(LogLevel::Exception)
            .with_level(LogLevel::Info);
        assert_eq!(options.level(), LogLevel::Info);
    }

    #[test]
    fn test_out_of_range_bits_saturate() {
        assert_eq!(LogLevel::from_bits(7), LogLevel::Exception);
        assert_eq!(LogOptions::LEVEL_MASK.level(), LogLevel::Exception);
    }

    #[test]
    fn test_stack_trace_policy() {
        let info = LogOptions::empty().with_level(LogLevel::Info);
        let error = LogOptions::empty().with_level(LogLevel::Error);

        assert!(!info.includes_stack_trace(LogLevel::Error));
        assert!(error.includes_stack_trace(LogLevel::Error));
        assert!((info | LogOptions::FORCE_STACK_TRACE).includes_stack_trace(LogLevel::Error));
        assert!(!(error | LogOptions::FORCE_NO_STACK_TRACE).includes_stack_trace(LogLevel::Error));
        assert!(
            !(info | LogOptions::FORCE_STACK_TRACE | LogOptions::FORCE_NO_STACK_TRACE)
                .includes_stack_trace(LogLevel::Debug)
        );
    }
}
