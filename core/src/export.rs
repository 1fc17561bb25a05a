//! Log history export utilities
//!
//! Formats visible history entries as plain text for copy-paste or saving.

use std::fmt::Write;

use crate::entry::LogEntry;
use crate::history::LogHistory;

/// Export visible entries, oldest first, as plain text
///
/// `max_count` keeps only the newest entries; `None` exports everything
/// still visible.
///
/// Output format:
/// ```text
/// 13:14:05.120 [INFO] [Net] connected lobby-3
/// 13:14:06.002 [ERROR] [Net] send failed peer disconnected
///     0: njconsole::net::send
///     1: ...
/// ```
pub fn export_as_text(history: &LogHistory, max_count: Option<usize>) -> String {
    export_filtered(history, max_count, |_| true)
}

/// Export visible entries accepted by `filter`
///
/// `max_count` applies before filtering: it bounds the window of recent
/// entries that are considered.
pub fn export_filtered(
    history: &LogHistory,
    max_count: Option<usize>,
    filter: impl Fn(&LogEntry) -> bool,
) -> String {
    let mut output = String::new();
    history.for_each_oldest_to_newest(max_count, |_, entry| {
        if filter(entry) {
            write_entry(&mut output, entry);
        }
    });
    output
}

/// Format a single entry as one line plus an indented stack trace
pub fn format_entry(entry: &LogEntry) -> String {
    let mut output = String::new();
    write_entry(&mut output, entry);
    output
}

fn write_entry(output: &mut String, entry: &LogEntry) {
    // Writing into a String cannot fail.
    let _ = writeln!(
        output,
        "{} [{}] {}",
        entry.timestamp().format("%H:%M:%S%.3f"),
        entry.level().name(),
        entry.plain_string()
    );
    if let Some(trace) = entry.stack_trace() {
        for line in trace.to_string().lines().filter(|line| !line.trim().is_empty()) {
            let _ = writeln!(output, "    {}", line.trim_end());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LogRecordBuilder;
    use crate::entry::StackTrace;
    use crate::level::LogLevel;
    use crate::value::TaggedValue;

    fn history_with(lines: &[(&'static str, LogLevel)]) -> LogHistory {
        let history = LogHistory::new(8);
        for (text, level) in lines {
            history.add(LogRecordBuilder::from_values([TaggedValue::from(*text)]).with_level(*level));
        }
        history
    }

    /// Drop the leading `HH:MM:SS.fff ` timestamp
    fn strip_time(text: &str) -> Vec<&str> {
        text.lines()
            .map(|line| if line.starts_with(' ') { line } else { &line[13..] })
            .collect()
    }

    #[test]
    fn test_export_lines_oldest_first() {
        let history = history_with(&[
            ("boot", LogLevel::Info),
            ("low memory", LogLevel::Warning),
            ("crash", LogLevel::Error),
        ]);

        let text = export_as_text(&history, None);
        assert_eq!(
            strip_time(&text),
            vec!["[INFO] boot", "[WARN] low memory", "[ERROR] crash"]
        );
    }

    #[test]
    fn test_export_max_count_keeps_newest() {
        let history = history_with(&[
            ("a", LogLevel::Info),
            ("b", LogLevel::Info),
            ("c", LogLevel::Info),
        ]);
        let text = export_as_text(&history, Some(2));
        assert_eq!(strip_time(&text), vec!["[INFO] b", "[INFO] c"]);
    }

    #[test]
    fn test_export_filtered_by_level() {
        let history = history_with(&[
            ("a", LogLevel::Debug),
            ("b", LogLevel::Warning),
            ("c", LogLevel::Info),
        ]);
        let text = export_filtered(&history, None, |entry| entry.level() >= LogLevel::Warning);
        assert_eq!(strip_time(&text), vec!["[WARN] b"]);
    }

    #[test]
    fn test_export_indents_stack_trace() {
        let history = LogHistory::new(4);
        history.add(
            LogRecordBuilder::from_values([TaggedValue::from("failed")])
                .with_level(LogLevel::Error)
                .with_stack_trace(StackTrace::Formatted("at load\n\nat main\n".into())),
        );

        let text = export_as_text(&history, None);
        assert_eq!(
            strip_time(&text),
            vec!["[ERROR] failed", "    at load", "    at main"]
        );
    }

    #[test]
    fn test_export_empty_history() {
        assert_eq!(export_as_text(&LogHistory::new(4), None), "");
    }

    #[test]
    fn test_timestamp_prefix_shape() {
        let history = history_with(&[("x", LogLevel::Info)]);
        let line = format_entry(&history.get_log(0).unwrap());
        let bytes = line.as_bytes();
        assert_eq!(bytes[2], b':');
        assert_eq!(bytes[5], b':');
        assert_eq!(bytes[8], b'.');
        assert_eq!(bytes[12], b' ');
    }
}
