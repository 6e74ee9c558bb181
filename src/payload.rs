use crate::record::RequestRecord;
use serde::{Deserialize, Serialize};

/// JSON body of one `POST /api/log-request`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub api_key: String,
    pub requests: Vec<RequestRecord>,
    pub framework: String,
    pub privacy_level: i32,
}

impl DispatchPayload {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
