//! Keyed Polling Engine
//!
//! Turns the request/response API into change notifications. One generic
//! scheduler is parameterized by a `PollSource` (fetch function plus change
//! detector); quote and order tracking are its two instantiations.
//!
//! # Components
//!
//! - `SubscriptionRegistry`: subscriptions, reverse key index, snapshot cache
//! - `PollingScheduler`: background thread running fetch-diff-dispatch cycles
//! - `retry`: transient-failure retry with backoff
//! - `SubscriptionManager`: registry + scheduler, the public entry point

mod callback;
mod manager;
mod registry;
mod retry;
mod scheduler;
mod source;

pub use callback::{
    AsyncCallbackFn, BlockingCallbackFn, Callback, CallbackError, OrderUpdateCallback,
    PriceChangeCallback,
};
pub use manager::{OrderSubscriptionManager, PriceSubscriptionManager, SubscriptionManager};
pub use registry::SubscriptionRegistry;
pub use retry::RetryBackoff;
pub use scheduler::{PollingScheduler, RegistryFor, SchedulerOptions};
pub use source::{FetchMode, OrderSource, PollSource, PriceSource};
