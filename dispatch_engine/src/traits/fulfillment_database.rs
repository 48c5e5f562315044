use crate::traits::{AssignmentManagement, CatalogManagement, CourierIndex, OrderManagement, UserManagement};

/// This trait defines the complete set of behaviour for backends supporting the fulfillment engine.
///
/// Backends are cheap to clone; every engine API holds its own handle.
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase:
    Clone + OrderManagement + AssignmentManagement + CourierIndex + UserManagement + CatalogManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes all connections to the database. Further calls on this handle will fail.
    async fn close(&mut self) -> Result<(), crate::traits::StoreError>;
}
