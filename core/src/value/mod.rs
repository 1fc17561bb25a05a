//! Tagged log values
//!
//! A [`TaggedValue`] encodes one log argument as a tag, a 64-bit payload and
//! an optional reference slot. Numbers, booleans, colors, date-times and
//! durations live entirely in the payload, so building them never touches
//! the heap. Strings, errors and objects occupy the reference slot.

mod format;

use std::error::Error;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};

pub use format::LARGE_FLOAT_LIMIT;

use crate::object_ref::{LogObject, ObjectRefPool, WeakRef};

/// Decimals written for float values unless overridden
pub const DEFAULT_DECIMALS: u8 = 3;

/// Largest decimal count a float value can request
pub const MAX_DECIMALS: u8 = 9;

/// Format byte bit requesting thousands separators on integers
const GROUPED: u8 = 0x80;

/// Kind of a tagged value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ValueTag {
    #[default]
    None,
    String,
    Int,
    Uint,
    Long,
    ULong,
    Float,
    Double,
    DateTime,
    TimeSpan,
    Object,
    Bool,
    WeakRef,
    StrongRef,
    Color,
}

impl ValueTag {
    /// Whether values of this tag refer to an object or error
    pub fn is_object_like(&self) -> bool {
        matches!(self, ValueTag::Object | ValueTag::WeakRef | ValueTag::StrongRef)
    }

    /// Whether values of this tag populate the reference slot
    pub fn uses_ref_slot(&self) -> bool {
        matches!(
            self,
            ValueTag::String
                | ValueTag::DateTime
                | ValueTag::Object
                | ValueTag::WeakRef
                | ValueTag::StrongRef
        )
    }

    /// Get a human-readable tag name
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueTag::None => "none",
            ValueTag::String => "string",
            ValueTag::Int => "i32",
            ValueTag::Uint => "u32",
            ValueTag::Long => "i64",
            ValueTag::ULong => "u64",
            ValueTag::Float => "f32",
            ValueTag::Double => "f64",
            ValueTag::DateTime => "datetime",
            ValueTag::TimeSpan => "timespan",
            ValueTag::Object => "object",
            ValueTag::Bool => "bool",
            ValueTag::WeakRef => "weak",
            ValueTag::StrongRef => "strong",
            ValueTag::Color => "color",
        }
    }
}

/// RGBA color, packed as `0xRRGGBBAA` in a value payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0, 255);
    pub const YELLOW: Color = Color::new(255, 235, 4, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Pack into `0xRRGGBBAA`
    pub const fn to_rgba(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    /// Unpack from `0xRRGGBBAA`
    pub const fn from_rgba(rgba: u32) -> Self {
        let [r, g, b, a] = rgba.to_be_bytes();
        Self { r, g, b, a }
    }
}

/// Which clock a date-time value was read from
///
/// Rendered as the date/time separator: `L`, `U` or `T` (unspecified).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateKind {
    Local,
    Utc,
    Unspecified,
}

impl DateKind {
    pub fn separator(&self) -> char {
        match self {
            DateKind::Local => 'L',
            DateKind::Utc => 'U',
            DateKind::Unspecified => 'T',
        }
    }
}

/// String payload: borrowed for `'static` text, shared otherwise
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogStr {
    Static(&'static str),
    Shared(Arc<str>),
}

impl LogStr {
    pub fn as_str(&self) -> &str {
        match self {
            LogStr::Static(s) => s,
            LogStr::Shared(s) => s,
        }
    }

    /// Shared form of this string; allocates only for `Static`
    pub fn to_shared(&self) -> Arc<str> {
        match self {
            LogStr::Static(s) => Arc::from(*s),
            LogStr::Shared(s) => Arc::clone(s),
        }
    }
}

impl Deref for LogStr {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for LogStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&'static str> for LogStr {
    fn from(value: &'static str) -> Self {
        LogStr::Static(value)
    }
}

impl From<String> for LogStr {
    fn from(value: String) -> Self {
        LogStr::Shared(Arc::from(value))
    }
}

impl From<Arc<str>> for LogStr {
    fn from(value: Arc<str>) -> Self {
        LogStr::Shared(value)
    }
}

/// Reference slot of a tagged value
#[derive(Clone, Default)]
enum RefSlot {
    #[default]
    Empty,
    Str(LogStr),
    DateKind(DateKind),
    Object(Arc<dyn LogObject>),
    Error(Arc<dyn Error + Send + Sync>),
    Weak(WeakRef),
}

/// One log argument
///
/// Cloning is cheap: payload values copy, strings and strong references bump
/// a reference count, and weak references take a second pooled cell.
#[derive(Clone, Default)]
pub struct TaggedValue {
    tag: ValueTag,
    format: u8,
    payload: u64,
    slot: RefSlot,
}

impl TaggedValue {
    /// Empty value
    pub const NONE: TaggedValue = TaggedValue {
        tag: ValueTag::None,
        format: 0,
        payload: 0,
        slot: RefSlot::Empty,
    };

    const fn scalar(tag: ValueTag, payload: u64) -> Self {
        Self {
            tag,
            format: 0,
            payload,
            slot: RefSlot::Empty,
        }
    }

    /// Copy a borrowed string into a shared value
    pub fn text(value: &str) -> Self {
        Self::from(LogStr::Shared(Arc::from(value)))
    }

    /// Object argument; stored entries keep it only weakly
    pub fn object(object: Arc<dyn LogObject>) -> Self {
        Self {
            tag: ValueTag::Object,
            format: 0,
            payload: 0,
            slot: RefSlot::Object(object),
        }
    }

    /// Weakly referenced object, through a pooled cell
    pub fn weak(object: &Arc<dyn LogObject>) -> Self {
        Self {
            tag: ValueTag::WeakRef,
            format: 0,
            payload: 0,
            slot: RefSlot::Weak(ObjectRefPool::acquire(Some(object))),
        }
    }

    /// Strongly referenced object; stored entries keep it alive
    pub fn strong(object: Arc<dyn LogObject>) -> Self {
        Self {
            tag: ValueTag::StrongRef,
            format: 0,
            payload: 0,
            slot: RefSlot::Object(object),
        }
    }

    /// Error argument; always retained strongly
    pub fn from_error(error: Arc<dyn Error + Send + Sync>) -> Self {
        Self {
            tag: ValueTag::Object,
            format: 0,
            payload: 0,
            slot: RefSlot::Error(error),
        }
    }

    /// Request `,` thousands separators; ignored for non-integer tags
    pub fn grouped(mut self) -> Self {
        if self.is_integer() {
            self.format |= GROUPED;
        }
        self
    }

    /// Override the decimal count of a float value (capped at [`MAX_DECIMALS`])
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        if matches!(self.tag, ValueTag::Float | ValueTag::Double) {
            self.format = decimals.min(MAX_DECIMALS);
        }
        self
    }

    pub fn tag(&self) -> ValueTag {
        self.tag
    }

    /// Raw 64-bit payload
    pub fn payload(&self) -> u64 {
        self.payload
    }

    pub fn is_none(&self) -> bool {
        self.tag == ValueTag::None
    }

    pub fn is_grouped(&self) -> bool {
        self.is_integer() && self.format & GROUPED != 0
    }

    /// Decimal count for float values
    pub fn decimals(&self) -> Option<u8> {
        matches!(self.tag, ValueTag::Float | ValueTag::Double).then_some(self.format)
    }

    /// Whether the reference slot is populated
    pub fn has_ref(&self) -> bool {
        !matches!(self.slot, RefSlot::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.slot {
            RefSlot::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_log_str(&self) -> Option<&LogStr> {
        match &self.slot {
            RefSlot::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&Arc<dyn Error + Send + Sync>> {
        match &self.slot {
            RefSlot::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn as_weak(&self) -> Option<&WeakRef> {
        match &self.slot {
            RefSlot::Weak(weak) => Some(weak),
            _ => None,
        }
    }

    /// The referenced object, if any and still alive
    pub fn object_ref(&self) -> Option<Arc<dyn LogObject>> {
        match &self.slot {
            RefSlot::Object(object) => Some(Arc::clone(object)),
            RefSlot::Weak(weak) => weak.upgrade(),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        (self.tag == ValueTag::Color).then(|| Color::from_rgba(self.payload as u32))
    }

    pub fn as_bool(&self) -> Option<bool> {
        (self.tag == ValueTag::Bool).then_some(self.payload != 0)
    }

    /// Integer tags widened to `i128`
    pub fn as_integer(&self) -> Option<i128> {
        match self.tag {
            ValueTag::Int | ValueTag::Long => Some(self.payload as i64 as i128),
            ValueTag::Uint | ValueTag::ULong => Some(self.payload as i128),
            _ => None,
        }
    }

    /// Float tags widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self.tag {
            ValueTag::Float => Some(f32::from_bits(self.payload as u32) as f64),
            ValueTag::Double => Some(f64::from_bits(self.payload)),
            _ => None,
        }
    }

    /// Render the canonical text form, appending to `out`
    pub fn fill(&self, out: &mut String) {
        // Writing into a String cannot fail.
        let _ = self.write_to(out);
    }

    /// Render the canonical text form into any writer
    ///
    /// Object text getters that panic are caught and rendered as an
    /// `<error: ...>` placeholder.
    pub fn write_to<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        match self.tag {
            ValueTag::None => Ok(()),
            ValueTag::String => out.write_str(self.as_str().unwrap_or_default()),
            ValueTag::Int | ValueTag::Long => {
                let value = self.payload as i64;
                format::write_integer(out, value < 0, value.unsigned_abs(), self.is_grouped())
            }
            ValueTag::Uint | ValueTag::ULong => {
                format::write_integer(out, false, self.payload, self.is_grouped())
            }
            ValueTag::Float => {
                let value = f32::from_bits(self.payload as u32) as f64;
                format::write_fixed(out, value, self.format as usize)
            }
            ValueTag::Double => {
                format::write_fixed(out, f64::from_bits(self.payload), self.format as usize)
            }
            ValueTag::DateTime => {
                let kind = match self.slot {
                    RefSlot::DateKind(kind) => kind,
                    _ => DateKind::Unspecified,
                };
                format::write_date_time(out, self.payload as i64, kind)
            }
            ValueTag::TimeSpan => format::write_time_span(out, self.payload as i64),
            ValueTag::Bool => out.write_str(if self.payload != 0 { "true" } else { "false" }),
            ValueTag::Color => format::write_color(out, Color::from_rgba(self.payload as u32)),
            ValueTag::Object | ValueTag::WeakRef | ValueTag::StrongRef => self.write_object(out),
        }
    }

    fn write_object<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        match &self.slot {
            RefSlot::Error(error) => match format::guarded_text(|| error.to_string()) {
                Ok(text) => out.write_str(&text),
                Err(message) => format::write_error_placeholder(out, &message),
            },
            RefSlot::Object(object) => write_live_object(out, object.as_ref()),
            RefSlot::Weak(weak) => match weak.upgrade() {
                Some(object) => write_live_object(out, object.as_ref()),
                None => format::write_null_object(out, weak.type_name()),
            },
            _ => format::write_null_object(out, None),
        }
    }

    /// Form stored in a log entry: plain object arguments become weak
    /// references, everything else is kept as is
    pub(crate) fn into_stored(self) -> Self {
        match self.slot {
            RefSlot::Object(object) if self.tag == ValueTag::Object => Self {
                tag: ValueTag::WeakRef,
                format: 0,
                payload: 0,
                slot: RefSlot::Weak(ObjectRefPool::acquire(Some(&object))),
            },
            slot => Self { slot, ..self },
        }
    }

    /// Reset to [`TaggedValue::NONE`], handing back any pooled cell
    pub(crate) fn release(&mut self) {
        if let RefSlot::Weak(weak) = std::mem::take(&mut self.slot) {
            ObjectRefPool::release(weak);
        }
        self.tag = ValueTag::None;
        self.format = 0;
        self.payload = 0;
    }

    fn is_integer(&self) -> bool {
        matches!(
            self.tag,
            ValueTag::Int | ValueTag::Uint | ValueTag::Long | ValueTag::ULong
        )
    }
}

fn write_live_object<W: fmt::Write>(out: &mut W, object: &dyn LogObject) -> fmt::Result {
    match format::guarded_text(|| object.log_text()) {
        Ok(text) => format::write_object_text(out, &text, Some(object.log_type_name())),
        Err(message) => format::write_error_placeholder(out, &message),
    }
}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

impl fmt::Debug for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedValue")
            .field("tag", &self.tag)
            .field("text", &format_args!("{self}"))
            .finish()
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for TaggedValue {
    fn from(value: bool) -> Self {
        Self::scalar(ValueTag::Bool, value as u64)
    }
}

impl From<i32> for TaggedValue {
    fn from(value: i32) -> Self {
        Self::scalar(ValueTag::Int, value as i64 as u64)
    }
}

impl From<u32> for TaggedValue {
    fn from(value: u32) -> Self {
        Self::scalar(ValueTag::Uint, value as u64)
    }
}

impl From<i64> for TaggedValue {
    fn from(value: i64) -> Self {
        Self::scalar(ValueTag::Long, value as u64)
    }
}

impl From<u64> for TaggedValue {
    fn from(value: u64) -> Self {
        Self::scalar(ValueTag::ULong, value)
    }
}

impl From<usize> for TaggedValue {
    fn from(value: usize) -> Self {
        Self::scalar(ValueTag::ULong, value as u64)
    }
}

impl From<f32> for TaggedValue {
    fn from(value: f32) -> Self {
        Self {
            format: DEFAULT_DECIMALS,
            ..Self::scalar(ValueTag::Float, value.to_bits() as u64)
        }
    }
}

impl From<f64> for TaggedValue {
    fn from(value: f64) -> Self {
        Self {
            format: DEFAULT_DECIMALS,
            ..Self::scalar(ValueTag::Double, value.to_bits())
        }
    }
}

impl From<Color> for TaggedValue {
    fn from(value: Color) -> Self {
        Self::scalar(ValueTag::Color, value.to_rgba() as u64)
    }
}

impl From<LogStr> for TaggedValue {
    fn from(value: LogStr) -> Self {
        Self {
            tag: ValueTag::String,
            format: 0,
            payload: 0,
            slot: RefSlot::Str(value),
        }
    }
}

impl From<&'static str> for TaggedValue {
    fn from(value: &'static str) -> Self {
        Self::from(LogStr::Static(value))
    }
}

impl From<String> for TaggedValue {
    fn from(value: String) -> Self {
        Self::from(LogStr::from(value))
    }
}

impl From<Arc<str>> for TaggedValue {
    fn from(value: Arc<str>) -> Self {
        Self::from(LogStr::Shared(value))
    }
}

impl From<NaiveDateTime> for TaggedValue {
    fn from(value: NaiveDateTime) -> Self {
        date_time(value, DateKind::Unspecified)
    }
}

impl From<DateTime<Local>> for TaggedValue {
    fn from(value: DateTime<Local>) -> Self {
        date_time(value.naive_local(), DateKind::Local)
    }
}

impl From<DateTime<Utc>> for TaggedValue {
    fn from(value: DateTime<Utc>) -> Self {
        date_time(value.naive_utc(), DateKind::Utc)
    }
}

impl From<TimeDelta> for TaggedValue {
    fn from(value: TimeDelta) -> Self {
        let micros = value.num_microseconds().unwrap_or(if value < TimeDelta::zero() {
            i64::MIN
        } else {
            i64::MAX
        });
        Self::scalar(ValueTag::TimeSpan, micros as u64)
    }
}

impl From<std::time::Duration> for TaggedValue {
    fn from(value: std::time::Duration) -> Self {
        let micros = i64::try_from(value.as_micros()).unwrap_or(i64::MAX);
        Self::scalar(ValueTag::TimeSpan, micros as u64)
    }
}

impl From<Arc<dyn LogObject>> for TaggedValue {
    fn from(value: Arc<dyn LogObject>) -> Self {
        Self::object(value)
    }
}

impl<T: LogObject> From<Arc<T>> for TaggedValue {
    fn from(value: Arc<T>) -> Self {
        Self::object(value)
    }
}

fn date_time(naive: NaiveDateTime, kind: DateKind) -> TaggedValue {
    TaggedValue {
        tag: ValueTag::DateTime,
        format: 0,
        payload: naive.and_utc().timestamp_micros() as u64,
        slot: RefSlot::DateKind(kind),
    }
}
