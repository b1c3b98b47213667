//! Records persisted through the [`KvStore`](crate::storage::KvStore).
//!
//! Every record is stored as camelCase JSON. Statuses and provider names are
//! the wire types from `nftvault_sdk::objects`, so a stored record and an API
//! response never disagree on spelling.

pub mod claim;
pub mod dead_letter;
pub mod idempotency;
pub mod order;

pub use claim::Claim;
pub use dead_letter::DeadLetter;
pub use idempotency::IdempotencyRecord;
pub use order::Order;
