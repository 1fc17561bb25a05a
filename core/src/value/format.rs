//! Canonical text rendering for tagged values
//!
//! Every routine writes into a caller-supplied `fmt::Write` so that filling
//! a reused `String` never allocates beyond that buffer's growth.

use std::any::Any;
use std::fmt::{self, Write};
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, NaiveDateTime};

use super::{Color, DateKind};
use crate::object_ref::short_type_name;

/// Floats at or above this magnitude are written with plain `Display`
pub const LARGE_FLOAT_LIMIT: f64 = 1e15;

const MICROS_PER_MILLI: u64 = 1_000;
const MICROS_PER_SECOND: u64 = 1_000_000;
const SECONDS_PER_DAY: u64 = 86_400;

/// Write an unsigned magnitude, optionally with `,` thousands separators
pub(crate) fn write_integer<W: Write>(
    out: &mut W,
    negative: bool,
    magnitude: u64,
    grouped: bool,
) -> fmt::Result {
    if negative {
        out.write_char('-')?;
    }
    if !grouped {
        return write!(out, "{magnitude}");
    }

    let mut digits = [0u8; 20];
    let mut len = 0;
    let mut rest = magnitude;
    loop {
        digits[len] = b'0' + (rest % 10) as u8;
        len += 1;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        out.write_char(digits[i] as char)?;
        if i > 0 && i % 3 == 0 {
            out.write_char(',')?;
        }
    }
    Ok(())
}

/// Write a float with a fixed number of decimals
///
/// Non-finite and very large values fall back to raw `Display` output.
pub(crate) fn write_fixed<W: Write>(out: &mut W, value: f64, decimals: usize) -> fmt::Result {
    if !value.is_finite() || value.abs() >= LARGE_FLOAT_LIMIT {
        return write!(out, "{value}");
    }
    write!(out, "{value:.decimals$}")
}

/// Write a wall-clock reading as `YYYY-MM-DD{L|U|T}HH:MM:SS.fff`
pub(crate) fn write_date_time<W: Write>(out: &mut W, micros: i64, kind: DateKind) -> fmt::Result {
    match DateTime::from_timestamp_micros(micros).map(|utc| utc.naive_utc()) {
        Some(naive) => write_naive(out, &naive, kind),
        None => write!(out, "<invalid date: {micros}>"),
    }
}

fn write_naive<W: Write>(out: &mut W, naive: &NaiveDateTime, kind: DateKind) -> fmt::Result {
    write!(
        out,
        "{}{}{}",
        naive.format("%Y-%m-%d"),
        kind.separator(),
        naive.format("%H:%M:%S%.3f")
    )
}

/// Write a signed duration as `[-][d.]hh:mm:ss.fff`
pub(crate) fn write_time_span<W: Write>(out: &mut W, micros: i64) -> fmt::Result {
    if micros < 0 {
        out.write_char('-')?;
    }
    let total = micros.unsigned_abs();
    let millis = (total % MICROS_PER_SECOND) / MICROS_PER_MILLI;
    let seconds = total / MICROS_PER_SECOND;
    let days = seconds / SECONDS_PER_DAY;
    let hours = (seconds / 3600) % 24;
    let minutes = (seconds / 60) % 60;
    let secs = seconds % 60;
    if days > 0 {
        write!(out, "{days}.")?;
    }
    write!(out, "{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

/// Write a color as `#RRGGBBAA`
pub(crate) fn write_color<W: Write>(out: &mut W, color: Color) -> fmt::Result {
    write!(
        out,
        "#{:02X}{:02X}{:02X}{:02X}",
        color.r, color.g, color.b, color.a
    )
}

/// Write an object's text, shortening the two conventional default forms
///
/// - the bare type path becomes `[TypeName]`
/// - `"<name> (TypeName)"` becomes `[TypeName: name]`
pub(crate) fn write_object_text<W: Write>(
    out: &mut W,
    text: &str,
    full_type: Option<&'static str>,
) -> fmt::Result {
    let Some(full_type) = full_type else {
        return out.write_str(text);
    };
    let short = short_type_name(full_type);
    if text == full_type {
        return write!(out, "[{short}]");
    }
    let named = text.strip_suffix(')').and_then(|rest| {
        rest.strip_suffix(full_type)
            .or_else(|| rest.strip_suffix(short))
            .and_then(|rest| rest.strip_suffix(" ("))
    });
    match named {
        Some(name) => write!(out, "[{short}: {name}]"),
        None => out.write_str(text),
    }
}

/// Write the `null (TypeName)` placeholder for an absent or expired object
pub(crate) fn write_null_object<W: Write>(out: &mut W, full_type: Option<&str>) -> fmt::Result {
    match full_type {
        Some(full_type) => write!(out, "null ({})", short_type_name(full_type)),
        None => out.write_str("null"),
    }
}

/// Run a user-supplied text getter, turning a panic into an error placeholder
pub(crate) fn guarded_text(render: impl FnOnce() -> String) -> Result<String, String> {
    panic::catch_unwind(AssertUnwindSafe(render)).map_err(|payload| panic_message(&*payload))
}

/// Inline placeholder written in place of a value that failed to render
pub(crate) fn write_error_placeholder<W: Write>(out: &mut W, message: &str) -> fmt::Result {
    write!(out, "<error: {message}>")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "formatting panicked".to_string()
    }
}
