//! Normalized forecast payload.
//!
//! The upstream One Call response is kept as a JSON object rather than mapped
//! onto fixed structs, so sections the provider adds later pass through
//! untouched. Keys are folded to `snake_case` at every nesting depth.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, map::Entry};
use tracing::warn;

/// An immutable forecast produced by one successful upstream fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    #[serde(flatten)]
    payload: Map<String, Value>,
    #[serde(skip)]
    fetched_at: DateTime<Utc>,
}

impl Forecast {
    /// Build a forecast from a decoded upstream object, normalizing its keys.
    pub fn from_payload(payload: Map<String, Value>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            payload: normalize_map(payload),
            fetched_at,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.payload.keys().map(String::as_str)
    }

    pub fn current(&self) -> Option<&Map<String, Value>> {
        self.get("current").and_then(Value::as_object)
    }

    pub fn hourly(&self) -> &[Value] {
        self.section_list("hourly")
    }

    pub fn daily(&self) -> &[Value] {
        self.section_list("daily")
    }

    pub fn alerts(&self) -> &[Value] {
        self.section_list("alerts")
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    fn section_list(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Recursively normalize every object key inside `value`.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

// On a collision a key already in snake_case wins; otherwise the first in
// iteration order is kept.
fn normalize_map(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let value = normalize_keys(value);
        match out.entry(normalize_key(&key)) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                warn!(key = %slot.key(), dropped = %key, "Forecast keys collide after normalization");
                if key == *slot.key() {
                    slot.insert(value);
                }
            }
        }
    }
    out
}

/// Fold a key into `snake_case`.
///
/// Separators (`-`, `.`, whitespace) become `_`, camel humps split on the
/// lowercase-to-uppercase boundary and acronyms stay together, so `windSpeed`,
/// `Wind-Speed` and `wind_speed` all map to `wind_speed` and `UVIndex` maps
/// to `uv_index`.
pub fn normalize_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == '.' || c == '_' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let hump = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if hump && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}
