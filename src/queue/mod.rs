//! Durable import task queue.
//!
//! Tasks are persisted in Fjall and handed to workers under time-limited
//! leases. A task is removed only when its current lease holder acknowledges
//! it; an unacknowledged task becomes visible again once its lease expires.

pub mod store;

pub use store::{FjallQueue, LeaseId, LeasedTask, QueueError, QueueOptions};
