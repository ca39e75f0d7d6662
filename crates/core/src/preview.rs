//! Remote resource metadata

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Names with a typed field
const KNOWN_KEYS: [&str; 6] = ["success", "id", "name", "size", "downloads", "date_upload"];

/// Metadata describing a remote resource
///
/// Common fields are typed; anything else the provider sends is kept in
/// `extra` so no key is lost. A known key sent as `null` leaves its field
/// `None` and is kept in `extra`. Keys render in the order the provider
/// sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_upload: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Wire order of the parsed body
    #[serde(skip)]
    order: Vec<String>,
}

impl PreviewRecord {
    /// Parse a JSON object body
    pub fn from_json(body: &str) -> Result<Self> {
        let mut map = match serde_json::from_str::<Value>(body)? {
            Value::Object(map) => map,
            other => {
                return Err(Error::Parse(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };
        let order: Vec<String> = map.keys().cloned().collect();

        let nulls: Vec<&str> = KNOWN_KEYS
            .into_iter()
            .filter(|key| map.get(*key).is_some_and(Value::is_null))
            .collect();
        for key in &nulls {
            map.remove(*key);
        }

        let mut record: Self = serde_json::from_value(Value::Object(map))?;
        for key in nulls {
            record.extra.insert(key.to_string(), Value::Null);
        }
        record.order = order;
        Ok(record)
    }

    /// Whether the provider reported success
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(false)
    }

    /// Number of keys present, known and extra
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of any key as JSON
    pub fn get(&self, key: &str) -> Option<Value> {
        self.known_pairs()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .or_else(|| self.extra.get(key).cloned())
    }

    /// Present keys, wire order first, then keys set after parsing
    pub fn keys(&self) -> Vec<String> {
        let present: Vec<String> = self
            .known_pairs()
            .into_iter()
            .map(|(k, _)| k.to_string())
            .chain(self.extra.keys().cloned())
            .collect();

        let mut keys: Vec<String> = self
            .order
            .iter()
            .filter(|key| present.contains(key))
            .cloned()
            .collect();
        for key in present {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        let map: Map<String, Value> = self
            .keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect();
        Ok(serde_json::to_string_pretty(&Value::Object(map))?)
    }

    /// Comma-joined values, strings unquoted
    pub fn values_line(&self) -> String {
        self.keys()
            .iter()
            .filter_map(|key| self.get(key))
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn known_pairs(&self) -> Vec<(&'static str, Value)> {
        let values = [
            self.success.map(Value::Bool),
            self.id.clone().map(Value::String),
            self.name.clone().map(Value::String),
            self.size.map(Value::from),
            self.downloads.map(Value::from),
            self.date_upload.clone().map(Value::String),
        ];
        KNOWN_KEYS
            .into_iter()
            .zip(values)
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
