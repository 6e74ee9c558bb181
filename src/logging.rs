//! Log-safe rendering of analytics API keys.

use crate::payload::DispatchPayload;
use std::fmt;

/// Redacted API key
///
/// Shows the first 8 characters followed by `***`; shorter keys are fully
/// hidden.
///
/// ```
/// use api_analytics::logging::SensitiveApiKey;
///
/// let key = "6d2b8c1e-0a4f-4d8e-9b7a-3f5e2c1d0a9b";
/// assert_eq!(SensitiveApiKey::new(key).to_string(), "6d2b8c1e***");
/// assert_eq!(SensitiveApiKey::new("short").to_string(), "***");
/// ```
#[derive(Clone, Debug)]
pub struct SensitiveApiKey<'a> {
    inner: &'a str,
}

impl<'a> SensitiveApiKey<'a> {
    pub fn new(key: &'a str) -> Self {
        Self { inner: key }
    }
}

impl<'a> fmt::Display for SensitiveApiKey<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const VISIBLE: usize = 8;
        match self.inner.char_indices().nth(VISIBLE) {
            Some((cut, _)) => write!(f, "{}***", &self.inner[..cut]),
            None => write!(f, "***"),
        }
    }
}

/// Serialize a payload for diagnostics with its API key redacted
pub fn redacted_body(payload: &DispatchPayload) -> String {
    let mut value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(e) => return format!("<unserializable payload: {}>", e),
    };
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "api_key".to_string(),
            serde_json::Value::String(SensitiveApiKey::new(&payload.api_key).to_string()),
        );
    }
    value.to_string()
}
