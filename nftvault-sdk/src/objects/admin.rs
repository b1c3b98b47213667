//! Admin API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderResponse, ProviderKind};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Query string of the admin listing endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    50
}

/// Upper bound for `limit`; both listings are capped at this many entries.
pub const MAX_LIST_LIMIT: usize = 1000;

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// `GET /admin/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderList {
    pub orders: Vec<OrderResponse>,
}

/// A parked webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterResponse {
    pub id: Uuid,
    pub provider: ProviderKind,
    pub reason: String,
    pub raw_body: String,
    /// Unix milliseconds.
    pub received_at: i64,
}

/// `GET /admin/dead-letters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterList {
    pub dead_letters: Vec<DeadLetterResponse>,
}
