//! Not-yet-committed log records
//!
//! A [`LogRecordBuilder`] carries values from the call site to
//! [`LogHistory::add`](crate::LogHistory::add). Its values are held inline,
//! so building a record of up to [`MAX_VALUES`] arguments never allocates.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::entry::{MAX_VALUES, StackTrace};
use crate::level::{LogLevel, LogOptions};
use crate::object_ref::LogObject;
use crate::value::TaggedValue;

/// Transient record passed by value into the history
///
/// Holding more than [`MAX_VALUES`] values is allowed while building, but
/// committing such a record is a contract violation and panics.
#[derive(Default)]
pub struct LogRecordBuilder {
    pub(crate) values: SmallVec<[TaggedValue; MAX_VALUES]>,
    pub(crate) options: LogOptions,
    pub(crate) stack_trace: Option<Arc<StackTrace>>,
    pub(crate) context: Option<Arc<dyn LogObject>>,
}

impl LogRecordBuilder {
    /// Create an empty record with the given options
    pub fn new(options: LogOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Create an info-level record from a list of values
    pub fn from_values(values: impl IntoIterator<Item = TaggedValue>) -> Self {
        Self {
            values: values.into_iter().collect(),
            options: LogOptions::empty().with_level(LogLevel::Info),
            ..Self::default()
        }
    }

    /// Append a value
    pub fn push(&mut self, value: impl Into<TaggedValue>) -> &mut Self {
        self.values.push(value.into());
        self
    }

    /// Append a value, builder style
    pub fn with_value(mut self, value: impl Into<TaggedValue>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn with_options(mut self, options: LogOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the level bits, keeping the other options
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.options = self.options.with_level(level);
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: StackTrace) -> Self {
        self.stack_trace = Some(Arc::new(stack_trace));
        self
    }

    /// Attach an external context object; the entry keeps it weakly
    pub fn with_context(mut self, context: Arc<dyn LogObject>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn values(&self) -> &[TaggedValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn options(&self) -> LogOptions {
        self.options
    }

    pub fn level(&self) -> LogLevel {
        self.options.level()
    }

    pub fn stack_trace(&self) -> Option<&StackTrace> {
        self.stack_trace.as_deref()
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_values_inline() {
        let record = LogRecordBuilder::from_values([
            TaggedValue::from("a"),
            TaggedValue::from(1),
            TaggedValue::from(true),
        ]);
        assert_eq!(record.len(), 3);
        assert_eq!(record.level(), LogLevel::Info);
        assert!(!record.values.spilled());
    }

    #[test]
    fn test_builder_chain() {
        let record = LogRecordBuilder::new(LogOptions::HAS_CHANNEL)
            .with_level(LogLevel::Warning)
            .with_value("net")
            .with_value(42)
            .with_stack_trace(StackTrace::Formatted("at main".into()));

        assert_eq!(record.level(), LogLevel::Warning);
        assert!(record.options().has_channel());
        assert_eq!(record.values()[0].as_str(), Some("net"));
        assert!(record.stack_trace().is_some());
        assert!(!record.has_context());
    }
}
