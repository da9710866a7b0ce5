//! Per-type value codec.
//!
//! Every binding stores its value as one canonical string; these rules must
//! be reproduced exactly for saved data to round-trip:
//!
//! - `number`: decimal comma, rounded and zero-padded to the field's
//!   precision when one is set
//! - `date` / `time`: `dd.mm.yyyy` / `HH:MM`; invalid input is not applied
//! - `template-choice`: checked options joined by `" | "` in dictionary
//!   order, with a single-value fallback for data written before
//!   multi-select existed
//! - everything else: the raw string

use chrono::{NaiveDate, NaiveTime};

use protoform_model::{FieldDef, FieldType};

/// Delimiter between selected options of a template-choice value.
pub const TEMPLATE_MULTI_DELIM: &str = " | ";

const DATE_FORMAT: &str = "%d.%m.%Y";
const TIME_FORMAT: &str = "%H:%M";

/// Parse a decimal that may use a comma as the separator.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}

/// Render a decimal with a comma separator, zero-padded to `precision`
/// places when one is set.
pub fn format_decimal(value: f64, precision: Option<u32>) -> String {
    let rendered = match precision {
        Some(places) => format!("{value:.prec$}", prec = places as usize),
        None => format!("{value}"),
    };
    rendered.replace('.', ",")
}

/// Compute the canonical stored value for an edit. `current` is the value
/// the binding already holds; inputs that fail to parse for date/time
/// fields leave it in place.
pub fn apply(def: &FieldDef, options: &[String], current: &str, input: &str) -> String {
    match def.field_type {
        FieldType::Number => normalize_number(input, def.precision),
        FieldType::Date => match NaiveDate::parse_from_str(input.trim(), DATE_FORMAT) {
            Ok(date) => date.format(DATE_FORMAT).to_string(),
            Err(_) if input.trim().is_empty() => String::new(),
            Err(_) => current.to_string(),
        },
        FieldType::Time => match NaiveTime::parse_from_str(input.trim(), TIME_FORMAT) {
            Ok(time) => time.format(TIME_FORMAT).to_string(),
            Err(_) if input.trim().is_empty() => String::new(),
            Err(_) => current.to_string(),
        },
        FieldType::TemplateChoice => canonical_template_value(options, input),
        FieldType::String
        | FieldType::LongText
        | FieldType::Choice
        | FieldType::HiddenMarker
        | FieldType::Formula => input.to_string(),
    }
}

/// Round and re-render a numeric entry. Text that does not parse as a
/// number is kept verbatim so keystrokes are never lost; the range
/// validator skips it.
fn normalize_number(input: &str, precision: Option<u32>) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match parse_decimal(trimmed) {
        Some(value) => format_decimal(value, precision),
        None => input.to_string(),
    }
}

/// Re-derive which options are checked from a stored value and render the
/// canonical joined form. Options keep dictionary order regardless of the
/// order they appear in the input.
fn canonical_template_value(options: &[String], input: &str) -> String {
    let selected = split_template_value(input);
    options
        .iter()
        .filter(|option| selected.iter().any(|part| part == option.trim()))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(TEMPLATE_MULTI_DELIM)
}

/// Split a template-choice value into its selected options. Values written
/// before multi-select existed carry no delimiter and are treated as one
/// option.
pub fn split_template_value(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    if value.contains(TEMPLATE_MULTI_DELIM) {
        value
            .split(TEMPLATE_MULTI_DELIM)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![value.trim().to_string()]
    }
}
