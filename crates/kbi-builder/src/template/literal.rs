//! Literal formatting for generated Python and YAML.
//!
//! Catalog scalars are emitted verbatim, the way a user would type them by
//! hand. Parameter strings are quoted only when a YAML loader would read
//! them back as something else.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;

use crate::db::models::ParameterValue;

/// Render a JSON value as a Python literal.
pub fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => python_string(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(python_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", python_string(k), python_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

// JSON string escapes are a subset of Python's.
fn python_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Render a scalar JSON value as an unquoted YAML scalar.
pub fn yaml_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(a) if a.is_empty() => "[]".to_string(),
        Value::Object(o) if o.is_empty() => "{}".to_string(),
        other => other.to_string(),
    }
}

fn is_block(value: &Value) -> bool {
    match value {
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => false,
    }
}

/// Render `key: value` as YAML lines at the given indentation.
///
/// Non-empty mappings and sequences become nested blocks indented by two
/// more spaces; everything else stays on the key's line.
pub fn yaml_field(key: &str, value: &Value, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    if !is_block(value) {
        return vec![format!("{}{}: {}", pad, key, yaml_scalar(value))];
    }

    let mut lines = vec![format!("{}{}:", pad, key)];
    lines.extend(yaml_block(value, indent + 2));
    lines
}

fn yaml_block(value: &Value, indent: usize) -> Vec<String> {
    match value {
        Value::Object(map) => map
            .iter()
            .flat_map(|(k, v)| yaml_field(k, v, indent))
            .collect(),
        Value::Array(items) => items.iter().flat_map(|v| yaml_item(v, indent)).collect(),
        other => vec![format!("{}{}", " ".repeat(indent), yaml_scalar(other))],
    }
}

fn yaml_item(value: &Value, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    if !is_block(value) {
        return vec![format!("{}- {}", pad, yaml_scalar(value))];
    }

    // First line of the nested block shares the dash.
    let mut lines = yaml_block(value, indent + 2);
    if let Some(first) = lines.first_mut() {
        let trimmed = first[indent + 2..].to_string();
        *first = format!("{}- {}", pad, trimmed);
    }
    lines
}

/// Render a parameter value as a YAML scalar.
///
/// Floats always carry a decimal point so they read back as floats; bytes
/// use the YAML `!!binary` tag.
pub fn parameter_literal(value: &ParameterValue) -> String {
    match value {
        ParameterValue::String(s) => parameter_string(s),
        ParameterValue::Integer(i) => i.to_string(),
        ParameterValue::Float(f) => float_literal(*f),
        ParameterValue::Boolean(b) => b.to_string(),
        ParameterValue::Bytes(bytes) => format!("!!binary {}", BASE64.encode(bytes)),
    }
}

fn float_literal(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else if f.fract() == 0.0 {
        // `1.0e+16`: YAML 1.1 needs both the dot and the exponent sign.
        let formatted = format!("{:e}", f);
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        let mantissa = if mantissa.contains('.') {
            mantissa.to_string()
        } else {
            format!("{}.0", mantissa)
        };
        let exponent = match exponent.strip_prefix('-') {
            Some(digits) => format!("-{}", digits),
            None => format!("+{}", exponent),
        };
        format!("{}e{}", mantissa, exponent)
    } else {
        f.to_string()
    }
}

// Words and numeric shapes YAML 1.1 loaders resolve to non-strings even
// though a YAML 1.2 parser keeps them as text.
const YAML11_WORDS: &[&str] = &["y", "yes", "n", "no", "on", "off", "~"];

fn parameter_string(s: &str) -> String {
    if is_plain_string(s) {
        s.to_string()
    } else {
        // A JSON string is a valid double-quoted YAML scalar.
        serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
    }
}

fn is_plain_string(s: &str) -> bool {
    if s.is_empty() || s.contains('\n') || s.trim() != s || s.starts_with('!') {
        return false;
    }
    if YAML11_WORDS.contains(&s.to_ascii_lowercase().as_str()) {
        return false;
    }
    let numeric_start = s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
    if numeric_start && s.chars().all(|c| c.is_ascii_digit() || "+-._:eE".contains(c)) {
        return false;
    }
    let key_line = format!("k: {}", s);
    match serde_yaml::from_str::<serde_yaml::Value>(&key_line) {
        Ok(serde_yaml::Value::Mapping(map)) => {
            map.len() == 1 && map.get("k") == Some(&serde_yaml::Value::String(s.to_string()))
        }
        _ => false,
    }
}
