use log::error;
use thiserror::Error;

use crate::traits::StoreError;

/// The failure kinds reported by the engine APIs.
///
/// Validation and state errors carry a message that is safe to show to the caller. `Internal` carries detail for the
/// logs only.
#[derive(Debug, Clone, Error)]
pub enum FulfillmentError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("The handoff code has expired")]
    ExpiredCode,
    #[error("Invalid handoff code")]
    InvalidCode,
    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FulfillmentError {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => Self::NotFound(format!("Order {id} not found")),
            StoreError::ShopOrderNotFound(id) => Self::NotFound(format!("Shop order {id} not found")),
            StoreError::AssignmentNotFound(id) => Self::NotFound(format!("Assignment {id} not found")),
            StoreError::UserNotFound(id) => Self::NotFound(format!("User {id} not found")),
            StoreError::ShopNotFound(id) => Self::NotFound(format!("Shop {id} not found")),
            StoreError::Unavailable(msg) => Self::UpstreamUnavailable(msg),
            e => {
                error!("🗃️ Unexpected storage failure: {e}");
                Self::Internal(e.to_string())
            },
        }
    }
}
