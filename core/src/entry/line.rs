//! Single-line composition of an entry's values
//!
//! Markup follows the console's rich-text conventions: `<color=#RRGGBBAA>`
//! spans and `<b>` for object references.

use std::fmt::Write;

use super::LogEntry;
use crate::value::TaggedValue;

const SWATCH: char = '■';

/// Compose the display line for `entry`
///
/// - a channel renders as a `[channel] ` prefix
/// - a leading color value colors the rest of the line
/// - any other color value renders as an inline swatch
/// - object-like values are bold
pub(super) fn compose(entry: &LogEntry, markup: bool) -> String {
    let mut out = String::with_capacity(64);

    if entry.has_channel() {
        if let Some(channel) = entry.values().first() {
            out.push('[');
            channel.fill(&mut out);
            out.push_str("] ");
        }
    }

    let values = entry.message_values();
    let mut color_open = false;
    let mut wrote_any = false;

    for (position, value) in values.iter().enumerate() {
        if let Some(color) = value.as_color() {
            if position == 0 && values.len() > 1 {
                if markup {
                    out.push_str("<color=");
                    value.fill(&mut out);
                    out.push('>');
                    color_open = true;
                }
                continue;
            }
            separate(&mut out, &mut wrote_any);
            if markup {
                let _ = write!(out, "<color=#{:08X}>{SWATCH}</color>", color.to_rgba());
            }
            value.fill(&mut out);
            continue;
        }

        separate(&mut out, &mut wrote_any);
        write_value(&mut out, value, markup);
    }

    if color_open {
        out.push_str("</color>");
    }
    out
}

fn separate(out: &mut String, wrote_any: &mut bool) {
    if *wrote_any {
        out.push(' ');
    }
    *wrote_any = true;
}

fn write_value(out: &mut String, value: &TaggedValue, markup: bool) {
    let bold = markup && value.tag().is_object_like();
    if bold {
        out.push_str("<b>");
    }
    value.fill(out);
    if bold {
        out.push_str("</b>");
    }
}
