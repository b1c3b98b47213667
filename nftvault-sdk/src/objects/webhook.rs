//! Acknowledgement returned to payment providers.

use serde::{Deserialize, Serialize};

/// Body of every `POST /webhooks/{provider}` response.
///
/// `dead_lettered` is set when an authentic event could not be applied and
/// was parked instead; the provider should not retry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub dead_lettered: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self {
            received: true,
            dead_lettered: false,
        }
    }

    pub fn dead_lettered() -> Self {
        Self {
            received: false,
            dead_lettered: true,
        }
    }
}
