use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marks a logical operation as taken (`processed == false`, a lease) or
/// applied (`processed == true`, with the cached result).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub key: String,
    pub processed: bool,
    pub result: Option<Value>,
    /// Unix milliseconds.
    pub created_at: i64,
}
