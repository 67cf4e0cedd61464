//! Field deserializers for loosely typed client input: ids may arrive as
//! numbers or numeric strings, and blank values count as absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Integer from a JSON number or a string with a leading integer
/// (`"12"`, `" 7 "`, `"12abc"`). Fractions are truncated. Anything else is
/// treated as absent.
pub(crate) fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.as_ref().and_then(int_from_value))
}

/// Like [`int`], but zero is absent too, the way an identifier field is
/// either set or missing.
pub(crate) fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    Ok(int(deserializer)?.filter(|value| *value != 0))
}

/// Non-empty string. Numbers are accepted and rendered as text.
pub(crate) fn text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) if !value.is_empty() => Some(value),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

pub(crate) fn int_from_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number.as_f64().filter(|value| value.is_finite()).map(|value| value.trunc() as i64)
            })
            .and_then(|value| i32::try_from(value).ok()),
        Value::String(text) => leading_int(text),
        _ => None,
    }
}

fn leading_int(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().ok()?;
    i32::try_from(sign * magnitude).ok()
}
