use nftvault_sdk::objects::{DeadLetterResponse, ProviderKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authentic webhook that could not be applied and will not be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub id: Uuid,
    pub provider: ProviderKind,
    pub reason: String,
    /// The request body, lossily decoded as UTF-8.
    pub raw_body: String,
    /// Unix milliseconds.
    pub received_at: i64,
}

impl DeadLetter {
    pub fn new(provider: ProviderKind, reason: String, raw_body: &[u8], now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            reason,
            raw_body: String::from_utf8_lossy(raw_body).into_owned(),
            received_at: now_ms,
        }
    }

    pub fn to_response(&self) -> DeadLetterResponse {
        DeadLetterResponse {
            id: self.id,
            provider: self.provider,
            reason: self.reason.clone(),
            raw_body: self.raw_body.clone(),
            received_at: self.received_at,
        }
    }
}
