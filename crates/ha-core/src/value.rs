//! Coercion helpers for loosely typed attribute values
//!
//! Integrations send the same attribute as a number, a numeric string or a
//! boolean depending on their age, so every read goes through these.

use serde_json::Value;

/// Read a number from a JSON number or a numeric string
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_f64(s),
        _ => None,
    }
}

/// Parse a trimmed string as a finite float
pub fn parse_f64(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read a boolean from a JSON bool, a number or an on/off style string
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => parse_bool(s),
        _ => None,
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Render a value as plain text: strings unquoted, everything else as JSON
pub fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Read a list of strings; non-string members are rendered as text
pub fn as_str_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(as_text).collect(),
        _ => Vec::new(),
    }
}

/// Number of digits after the decimal point in the textual form of a value
pub fn decimal_places(value: &Value) -> Option<u32> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            parse_f64(s)?;
            s.trim().to_string()
        }
        _ => return None,
    };
    if text.contains(['e', 'E']) {
        return None;
    }
    Some(
        text.split_once('.')
            .map(|(_, frac)| frac.trim_end_matches('0').len() as u32)
            .unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_f64() {
        assert_eq!(as_f64(&json!(12.5)), Some(12.5));
        assert_eq!(as_f64(&json!(" 7 ")), Some(7.0));
        assert_eq!(as_f64(&json!("warm")), None);
        assert_eq!(as_f64(&json!("NaN")), None);
        assert_eq!(as_f64(&json!(null)), None);
    }

    #[test]
    fn test_as_bool() {
        assert_eq!(as_bool(&json!(true)), Some(true));
        assert_eq!(as_bool(&json!("OFF")), Some(false));
        assert_eq!(as_bool(&json!(1)), Some(true));
        assert_eq!(as_bool(&json!("maybe")), None);
    }

    #[test]
    fn test_decimal_places() {
        assert_eq!(decimal_places(&json!(12.345)), Some(3));
        assert_eq!(decimal_places(&json!(20)), Some(0));
        assert_eq!(decimal_places(&json!("0.50")), Some(1));
        assert_eq!(decimal_places(&json!("abc")), None);
    }

    #[test]
    fn test_as_text() {
        assert_eq!(as_text(&json!("heat")), "heat");
        assert_eq!(as_text(&json!(3)), "3");
        assert_eq!(as_text(&json!(null)), "");
    }
}
