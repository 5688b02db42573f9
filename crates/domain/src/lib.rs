//! Order lifecycle layer.
//!
//! This crate provides:
//! - [`OrderService`], which persists order changes and announces them
//! - [`EventPublisher`] and its bus-backed implementation [`OrderEventPublisher`]
//!
//! Every write path performs one store write followed by one publish attempt.
//! The two are not atomic: if the process dies between them the change is
//! stored but never announced.

pub mod error;
pub mod publisher;
pub mod service;

pub use error::{DomainError, PublishError, Result};
pub use publisher::{EventPublisher, OrderEventPublisher, PublishHandle};
pub use service::OrderService;
