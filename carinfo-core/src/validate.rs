//! Identifier and payload validation
//!
//! Payloads arrive as loosely typed JSON. Each field is coerced with the same
//! rules a dynamic language's `str()`, `int()`, `bool()` and `float()` would
//! apply, so `"year": "2011"` and `"year": 2011.7` are both accepted as 2011
//! while `"year": "new"` is rejected. Unknown keys are ignored.

use crate::error::SchemaError;
use crate::model::{Car, Status};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

static CAR_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^car(0|[1-9][0-9]*)$").expect("car identifier pattern is valid")
});

/// Check that `id` is `car0` or `car` followed by digits with no leading zero
pub fn validate_identifier(id: &str) -> bool {
    let ok = CAR_ID.is_match(id);
    debug!(car_id = %id, valid = ok, "validated car identifier");
    ok
}

/// Coerce a JSON payload into a [`Car`]
pub fn validate_car_payload(payload: &Value) -> Result<Car, SchemaError> {
    let fields = as_object(payload)?;

    Ok(Car {
        make: coerce_string(required(fields, "make")?),
        model: coerce_string(required(fields, "model")?),
        year: coerce_int(required(fields, "year")?).map_err(|r| SchemaError::new("year", r))?,
        color: coerce_string(required(fields, "color")?),
    })
}

/// Coerce a JSON payload into a [`Status`]
pub fn validate_status_payload(payload: &Value) -> Result<Status, SchemaError> {
    let fields = as_object(payload)?;

    Ok(Status {
        ready: coerce_bool(required(fields, "ready")?),
        sold: coerce_bool(required(fields, "sold")?),
        price: coerce_float(required(fields, "price")?)
            .map_err(|r| SchemaError::new("price", r))?,
    })
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>, SchemaError> {
    payload
        .as_object()
        .ok_or_else(|| SchemaError::new("$", format!("must be an object, got {}", kind(payload))))
}

fn required<'a>(fields: &'a Map<String, Value>, key: &str) -> Result<&'a Value, SchemaError> {
    fields
        .get(key)
        .ok_or_else(|| SchemaError::new(key, "is required"))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// String coercion; never fails
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr(other),
    }
}

fn repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => float_repr(f),
            _ => n.to_string(),
        },
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(repr).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), repr(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Shortest round-trip float text, positional for exponents in `-4..16`,
/// otherwise scientific with a signed two-digit exponent (`1e+20`, `1.5e-07`)
fn float_repr(f: f64) -> String {
    if !f.is_finite() {
        return if f.is_nan() {
            "nan".to_string()
        } else if f > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if !(-4..16).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }

    let (sign, unsigned) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits = unsigned.replace('.', "");
    if exp < 0 {
        let zeros = "0".repeat((-exp - 1) as usize);
        return format!("{}0.{}{}", sign, zeros, digits);
    }

    let point = exp as usize + 1;
    if digits.len() <= point {
        format!("{}{}{}.0", sign, digits, "0".repeat(point - digits.len()))
    } else {
        format!("{}{}.{}", sign, &digits[..point], &digits[point..])
    }
}

fn quote(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        format!("\"{}\"", s.replace('\\', "\\\\"))
    } else {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

/// Integer coercion: truncates floats, maps booleans to 0/1, parses strings
pub fn coerce_int(value: &Value) -> Result<i64, String> {
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            if n.is_u64() {
                return Err("is out of range for an integer".to_string());
            }
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() {
                return Err("cannot be converted to an integer".to_string());
            }
            let truncated = f.trunc();
            // i64::MAX is not exactly representable; 2^63 is the first value out of range
            if truncated >= 9_223_372_036_854_775_808.0 || truncated < -9_223_372_036_854_775_808.0 {
                return Err("is out of range for an integer".to_string());
            }
            Ok(truncated as i64)
        }
        Value::String(s) => parse_int_literal(s.trim())
            .ok_or_else(|| format!("value '{}' is not a valid integer", s)),
        other => Err(format!("cannot be converted to an integer from {}", kind(other))),
    }
}

fn parse_int_literal(s: &str) -> Option<i64> {
    let (sign, body) = match s.as_bytes().first()? {
        b'+' => ("", &s[1..]),
        b'-' => ("-", &s[1..]),
        _ => ("", s),
    };
    let digits = strip_digit_separators(body)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    format!("{}{}", sign, digits).parse().ok()
}

/// Remove `_` separators, which are only allowed singly between two digits
fn strip_digit_separators(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'_' {
            let before = i.checked_sub(1).map(|j| bytes[j]);
            let after = bytes.get(i + 1).copied();
            if !matches!((before, after), (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit())
            {
                return None;
            }
        }
    }
    Some(s.replace('_', ""))
}

/// Truthiness coercion; never fails
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Float coercion; non-finite results are rejected
pub fn coerce_float(value: &Value) -> Result<f64, String> {
    let f = match value {
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| "cannot be converted to a number".to_string())?,
        Value::String(s) => strip_digit_separators(s.trim())
            .and_then(|cleaned| cleaned.parse::<f64>().ok())
            .ok_or_else(|| format!("value '{}' is not a valid number", s))?,
        other => return Err(format!("cannot be converted to a number from {}", kind(other))),
    };

    if f.is_finite() {
        Ok(f)
    } else {
        Err("must be a finite number".to_string())
    }
}
