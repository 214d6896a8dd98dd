//! Key-case and shape conversion between the panel's wire JSON and the SDK's
//! internal representation.
//!
//! The panel speaks `snake_case`; internally every payload is handled with
//! `camelCase` keys. [`to_internal`] and [`to_wire`] walk an arbitrary
//! [`serde_json::Value`] and rename object keys at every depth, descending into
//! nested objects and arrays. Scalars pass through untouched.
//!
//! [`Options`] tunes a conversion:
//!
//! - `ignore`: input keys dropped from the output
//! - `rename`: explicit input key to output key overrides, applied instead of the
//!   generic case conversion
//! - `cast`: per-key value coercion ([`Cast`]); a value that fails to coerce is kept
//!   as its string representation instead of failing the conversion
//!
//! All option keys are spelled in the convention of the *input* value.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, TimeZone as _, Utc};
use serde_json::{Map, Number, Value};

/// Coercion applied to a single field's value.
#[derive(Clone)]
#[non_exhaustive]
pub enum Cast {
    /// RFC 3339 string or Unix milliseconds, re-emitted as an RFC 3339 UTC string
    Date,
    /// Integer given as a JSON number or a decimal string, re-emitted as a JSON number
    BigInt,
    /// Caller supplied coercion
    With(Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>),
}

impl Cast {
    /// Wraps a custom coercion. Returning `None` signals failure.
    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::With(Arc::new(f))
    }

    fn apply(&self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }

        let cast = match self {
            Self::Date => cast_date(&value),
            Self::BigInt => cast_big_int(&value),
            Self::With(f) => f(&value),
        };

        cast.unwrap_or_else(|| match value {
            Value::String(_) => value,
            other => Value::String(other.to_string()),
        })
    }
}

impl fmt::Debug for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date => f.write_str("Date"),
            Self::BigInt => f.write_str("BigInt"),
            Self::With(_) => f.write_str("With(..)"),
        }
    }
}

fn cast_date(value: &Value) -> Option<Value> {
    let date: DateTime<Utc> = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc),
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single()?,
        _ => return None,
    };

    Some(Value::String(
        date.to_rfc3339_opts(SecondsFormat::Millis, true),
    ))
}

fn cast_big_int(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .map(Number::from)
                .or_else(|_| s.parse::<i64>().map(Number::from))
                .ok()
                .map(Value::Number)
        }
        _ => None,
    }
}

/// Options for [`to_internal`] and [`to_wire`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    ignore: HashSet<String>,
    rename: HashMap<String, String>,
    cast: HashMap<String, Cast>,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `key` from the output.
    #[must_use]
    pub fn ignore(mut self, key: &str) -> Self {
        self.ignore.insert(key.to_owned());
        self
    }

    /// Emits `from` as `to`, bypassing the case conversion.
    #[must_use]
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.rename.insert(from.to_owned(), to.to_owned());
        self
    }

    /// Coerces the value stored under `key`.
    #[must_use]
    pub fn cast(mut self, key: &str, cast: Cast) -> Self {
        self.cast.insert(key.to_owned(), cast);
        self
    }

    /// Options for the reverse direction: renames are flipped and casts and
    /// ignores are re-keyed to the converted key names.
    #[must_use]
    pub fn reversed(&self, convert: fn(&str) -> String) -> Self {
        let output_key = |key: &str| {
            self.rename
                .get(key)
                .cloned()
                .unwrap_or_else(|| convert(key))
        };

        Self {
            ignore: self.ignore.iter().map(|k| output_key(k)).collect(),
            rename: self
                .rename
                .iter()
                .map(|(from, to)| (to.clone(), from.clone()))
                .collect(),
            cast: self
                .cast
                .iter()
                .map(|(k, c)| (output_key(k), c.clone()))
                .collect(),
        }
    }
}

/// `camelCase` to `snake_case`: every uppercase letter becomes `_` plus its lowercase form.
#[must_use]
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_uppercase() {
            out.push('_');
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `snake_case` to `camelCase`: every `_` is dropped and the next character uppercased.
#[must_use]
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Converts a wire value (`snake_case` keys) into the internal representation.
#[must_use]
pub fn to_internal(value: Value, options: &Options) -> Value {
    convert(value, options, snake_to_camel)
}

/// Converts an internal value (`camelCase` keys) into the wire representation.
#[must_use]
pub fn to_wire(value: Value, options: &Options) -> Value {
    convert(value, options, camel_to_snake)
}

fn convert(value: Value, options: &Options, case: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                if options.ignore.contains(&key) {
                    continue;
                }

                let value = match options.cast.get(&key) {
                    Some(cast) => cast.apply(value),
                    None => convert(value, options, case),
                };
                let key = options
                    .rename
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| case(&key));

                out.insert(key, value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| convert(item, options, case))
                .collect(),
        ),
        scalar => scalar,
    }
}
