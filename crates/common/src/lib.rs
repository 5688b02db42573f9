//! Shared data contract for the order lifecycle.
//!
//! Both the publishing side (lifecycle service) and the consuming side
//! (event processor) operate on these types:
//! - [`Order`] and [`NewOrder`], the persisted record and its creation input
//! - [`OrderStatus`], the status state machine
//! - [`LifecycleEvent`] and [`EventKind`], the wire-level bus message

pub mod event;
pub mod order;
pub mod status;
pub mod types;

pub use event::{EventKind, LifecycleEvent};
pub use order::{NewOrder, Order};
pub use rust_decimal::Decimal;
pub use status::{OrderStatus, ParseStatusError};
pub use types::OrderId;
