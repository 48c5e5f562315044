use thiserror::Error;

use crate::db_types::{AssignmentId, OrderId, ShopId, ShopOrderId, UserId};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Shop order {0} does not exist")]
    ShopOrderNotFound(ShopOrderId),
    #[error("Assignment {0} does not exist")]
    AssignmentNotFound(AssignmentId),
    #[error("User {0} does not exist")]
    UserNotFound(UserId),
    #[error("Shop {0} does not exist")]
    ShopNotFound(ShopId),
    #[error("Stored data could not be decoded: {0}")]
    CorruptData(String),
    #[error("Database is unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StoreError::Unavailable(e.to_string()),
            e => StoreError::DatabaseError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::CorruptData(e.to_string())
    }
}
