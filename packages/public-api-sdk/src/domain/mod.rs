//! Domain Layer
//!
//! Data types shared by the blocking and cooperative clients: instruments,
//! quotes, orders, subscription bookkeeping and the change detector.
//! Nothing in this layer performs I/O.

pub mod instrument;
pub mod order;
pub mod quote;
pub mod subscription;

pub use instrument::{InstrumentRef, InstrumentType};
pub use order::{Order, OrderRef, OrderSide, OrderStatus, OrderType};
pub use quote::{Quote, QuoteOutcome};
pub use subscription::change::{OrderUpdate, PriceChange, QuoteField};
pub use subscription::{
    SubscriptionConfig, SubscriptionId, SubscriptionInfo, SubscriptionStatus,
};
