use crate::{
    db_types::{CancelledShopOrder, Order, OrderDraft, OrderId, ShopOrderId, ShopOrderStatus, UserId},
    traits::StoreError,
};

/// The `OrderManagement` trait defines the behaviour for storing and querying the order aggregate.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Writes the order and all of its sub-orders and items in a single transaction. Every sub-order starts in
    /// `pending`. Returns the stored order, with ids and timestamps filled in.
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError>;

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    /// All orders placed by the customer, newest first.
    async fn fetch_orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, StoreError>;

    /// All orders that contain at least one sub-order belonging to the owner, newest first. The orders are complete;
    /// filtering down to the owner's sub-orders is the caller's concern.
    async fn fetch_orders_for_owner(&self, owner_id: UserId) -> Result<Vec<Order>, StoreError>;

    /// Moves the sub-order from `from` to `to`, but only if it is still in `from`. Returns `false` if the sub-order
    /// was concurrently moved elsewhere.
    async fn update_shop_order_status(
        &self,
        shop_order_id: ShopOrderId,
        from: ShopOrderStatus,
        to: ShopOrderStatus,
    ) -> Result<bool, StoreError>;

    /// Cancels the sub-order (conditional on `from`, like [`Self::update_shop_order_status`]) and, in the same
    /// transaction, cancels its assignment if that assignment has not already finished.
    ///
    /// Returns `None` if the status write did not apply.
    async fn cancel_shop_order(
        &self,
        shop_order_id: ShopOrderId,
        from: ShopOrderStatus,
        reason: &str,
    ) -> Result<Option<CancelledShopOrder>, StoreError>;

    /// Sub-orders that are `out-for-delivery` but have no assignment linked, oldest first.
    async fn fetch_undispatched_shop_orders(&self) -> Result<Vec<(OrderId, ShopOrderId)>, StoreError>;
}
