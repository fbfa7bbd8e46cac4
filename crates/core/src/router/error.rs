use thiserror::Error;

use crate::{messages::Delivery, router::Address};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving context has not attached its listener (yet).
    #[error("{to} is not ready")]
    NotReady { to: Address },

    #[error("no route from {from} to {to}")]
    NoRoute { from: Address, to: Address },

    /// The receiver went away (restart, eviction, teardown) before replying.
    #[error("{kind} to {to} was dropped before a reply")]
    Dropped { to: Address, kind: &'static str },

    #[error("{kind} must be sent as {expected:?}")]
    WrongDelivery {
        kind: &'static str,
        expected: Delivery,
    },
}

impl DeliveryError {
    /// Transient failures a caller may retry.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, DeliveryError::NotReady { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("gave up waiting for {what} after {attempts} attempts")]
    Exhausted { what: String, attempts: u32 },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
