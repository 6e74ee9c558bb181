//! Per-request metadata passed through to the collection server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One HTTP request/response as captured by a framework adapter.
///
/// The logger treats the contents as opaque: keys and values are sent to the
/// server exactly as supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestRecord(Map<String, Value>);

impl RequestRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    ///
    /// ```
    /// use api_analytics::RequestRecord;
    ///
    /// let record = RequestRecord::new()
    ///     .with("path", "/users")
    ///     .with("status", 200);
    /// assert_eq!(record.get("status"), Some(&serde_json::json!(200)));
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for RequestRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for RequestRecord {
    type Error = Value;

    /// Accepts JSON objects only; any other value is handed back unchanged.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}
