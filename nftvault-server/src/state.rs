//! Application state shared across all request handlers.

use nftvault_core::config::AdminConfig;
use nftvault_core::lifecycle::OrderLifecycle;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Every order, payment and claim operation goes through here.
    pub lifecycle: OrderLifecycle,
    /// Admin API authentication.
    pub admin: Arc<AdminConfig>,
}

impl AppState {
    pub fn new(lifecycle: OrderLifecycle, admin: AdminConfig) -> Self {
        Self {
            lifecycle,
            admin: Arc::new(admin),
        }
    }
}
