//! sidedrop — durable cross-process text handoff.
//!
//! Moves a short text payload from a constrained, short-lived producer
//! process to one of a closed set of destination applications, none of
//! which may be running at the time. A file-per-record queue in a shared
//! directory is the transport and the sole source of truth; a best-effort
//! datagram wake signal and a tiered URL-activation fallback chain exist
//! only to shorten the wait. Delivery is at-least-once: records survive any
//! number of failed activation attempts and are reaped only by their
//! destination or by garbage collection.

pub mod activation;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod producer;
pub mod store;
mod utils;
pub mod wake;

pub use activation::{ActivationInvoker, ActivationStrategy};
pub use config::DeliveryConfig;
pub use dispatch::HandoffDispatcher;
pub use error::StoreError;
pub use models::{HandoffRecord, Target};
pub use producer::HandoffProducer;
pub use store::HandoffStore;
pub use wake::{SubscriptionHandle, WakeChannel};
