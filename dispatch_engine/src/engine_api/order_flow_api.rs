use std::fmt::Debug;

use dispatch_common::Paise;
use log::*;

use crate::{
    db_types::{
        NewOrder,
        Order,
        OrderDraft,
        OrderId,
        PaymentMethod,
        PaymentStatus,
        ShopId,
        ShopOrder,
        ShopOrderDraft,
        ShopOrderId,
        ShopOrderItem,
        ShopOrderStatus,
        UserId,
    },
    engine_api::{
        dispatch_api::{closed_payload, find_shop_order, DispatchApi},
        errors::FulfillmentError,
        order_objects::{ContactDetails, DispatchOutcome, OwnerOrderView, StatusUpdate},
        policies::{DispatchPolicy, PricingPolicy},
    },
    events::{NotificationRequest, Publisher},
    traits::{CatalogManagement, FulfillmentDatabase, OrderManagement, UserManagement},
};

pub const SHOP_ORDER_CANCELLED: &str = "shop order cancelled";
const TOTAL_TOO_LARGE: &str = "Order total is too large";

/// `OrderFlowApi` is the primary API for the order lifecycle: placing orders, reading them back for each party, and
/// moving sub-orders through their status machine on behalf of shop owners.
///
/// Moving a sub-order to `out-for-delivery` hands it to the [`DispatchApi`].
pub struct OrderFlowApi<B> {
    db: B,
    dispatcher: DispatchApi<B>,
    publisher: Publisher,
    pricing: PricingPolicy,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            dispatcher: self.dispatcher.clone(),
            publisher: self.publisher.clone(),
            pricing: self.pricing,
        }
    }
}

impl<B: Clone> OrderFlowApi<B> {
    pub fn new(db: B, publisher: Publisher, pricing: PricingPolicy, dispatch_policy: DispatchPolicy) -> Self {
        let dispatcher = DispatchApi::new(db.clone(), publisher.clone(), dispatch_policy);
        Self { db, dispatcher, publisher, pricing }
    }
}

impl<B> OrderFlowApi<B>
where B: FulfillmentDatabase
{
    /// Places a new order for the customer.
    ///
    /// The cart is split into one sub-order per shop, in the order the shops first appear in the cart. Line prices are
    /// taken from the cart as given. The delivery fee comes from the pricing policy and is stored on the order along
    /// with the totals.
    pub async fn place_order(&self, customer_id: UserId, new_order: NewOrder) -> Result<Order, FulfillmentError> {
        let draft = self.price_order(customer_id, new_order).await?;
        let order = self.db.insert_order(draft).await?;
        info!(
            "🔄️ Order #{} placed by customer #{customer_id}: {} shop orders, total {}",
            order.id,
            order.shop_orders.len(),
            order.total_amount
        );
        self.publisher.order_placed(&order).await;
        Ok(order)
    }

    /// The customer's orders, newest first.
    pub async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, FulfillmentError> {
        Ok(self.db.fetch_orders_for_customer(customer_id).await?)
    }

    /// Every order containing at least one of the owner's sub-orders, newest first, cut down to those sub-orders.
    pub async fn orders_for_owner(&self, owner_id: UserId) -> Result<Vec<OwnerOrderView>, FulfillmentError> {
        let orders = self.db.fetch_orders_for_owner(owner_id).await?;
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let customer = self.db.fetch_user(order.customer_id).await?.map(|u| ContactDetails::from(&u));
            result.push(OwnerOrderView::new(order, owner_id, customer));
        }
        Ok(result)
    }

    /// Fetches an order for one of its parties: the customer, an owner of one of its shops, or a courier assigned to
    /// one of its sub-orders.
    pub async fn order_for_party(&self, actor: UserId, order_id: OrderId) -> Result<Order, FulfillmentError> {
        let order = self.fetch_order(order_id).await?;
        if is_party_to(&order, actor) {
            Ok(order)
        } else {
            Err(FulfillmentError::forbidden("You are not a party to this order"))
        }
    }

    /// Moves a sub-order to a new status on behalf of its shop owner.
    ///
    /// Status only ever moves forward through `pending`, `preparing` and `out-for-delivery`, or to `cancelled`.
    /// `delivered` is reserved for the handoff protocol. Requesting the current status is a no-op that re-publishes
    /// the sub-order, except that an `out-for-delivery` sub-order without an assignment is dispatched again.
    pub async fn update_shop_order_status(
        &self,
        actor: UserId,
        order_id: OrderId,
        shop_order_id: ShopOrderId,
        to: ShopOrderStatus,
    ) -> Result<StatusUpdate, FulfillmentError> {
        let order = self.fetch_order(order_id).await?;
        let shop_order = find_shop_order(&order, shop_order_id)?;
        if shop_order.owner_id != actor {
            return Err(FulfillmentError::forbidden("Only the shop owner can update this order"));
        }
        let from = shop_order.status;
        if from.is_terminal() {
            return Err(FulfillmentError::invalid_state(format!("Shop order is already {from}")));
        }
        let mut notify_courier = None;
        let mut dispatch = None;
        match to {
            ShopOrderStatus::Delivered => {
                return Err(FulfillmentError::invalid_state("Orders are marked delivered by the courier at handoff"));
            },
            _ if to == from => {
                debug!("🔄️ Shop order #{shop_order_id} is already {to}");
            },
            ShopOrderStatus::Cancelled => {
                let cancelled = self
                    .db
                    .cancel_shop_order(shop_order_id, from, SHOP_ORDER_CANCELLED)
                    .await?
                    .ok_or_else(|| concurrent_update(shop_order_id))?;
                info!("🔄️ Shop order #{shop_order_id} cancelled by owner #{actor}");
                if let Some(closed) = cancelled.closed_assignment {
                    self.publisher.assignment_closed(&closed.affected_couriers(), closed_payload(&closed.assignment)).await;
                    notify_courier = closed.previous_courier;
                }
            },
            _ if rank(to) < rank(from) => {
                return Err(FulfillmentError::invalid_state(format!("Cannot move a shop order from {from} back to {to}")));
            },
            _ => {
                if !self.db.update_shop_order_status(shop_order_id, from, to).await? {
                    return Err(concurrent_update(shop_order_id));
                }
                info!("🔄️ Shop order #{shop_order_id} moved from {from} to {to}");
                if to == ShopOrderStatus::Preparing {
                    self.notify_preparing(&order, shop_order).await;
                }
            },
        }
        if to == ShopOrderStatus::OutForDelivery && shop_order.assignment_id.is_none() {
            dispatch = Some(self.try_dispatch(order_id, shop_order_id).await);
        }
        let order = self.fetch_order(order_id).await?;
        let shop_order = find_shop_order(&order, shop_order_id)?.clone();
        self.publisher.shop_order_changed(&order, &shop_order, notify_courier).await;
        let message = dispatch.as_ref().map(|d| d.message.clone()).unwrap_or_else(|| to.message().to_string());
        Ok(StatusUpdate { order_id, shop_order, dispatch, message })
    }

    /// A failed dispatch does not undo the status change. The sub-order stays unassigned and is picked up again by
    /// the sweep or a repeated status update.
    async fn try_dispatch(&self, order_id: OrderId, shop_order_id: ShopOrderId) -> DispatchOutcome {
        match self.dispatcher.dispatch(order_id, shop_order_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("🔄️ Dispatch of shop order #{shop_order_id} failed. It will be retried. {e}");
                DispatchOutcome {
                    shop_order_id,
                    assignment: None,
                    candidates: vec![],
                    message: "Order is out for delivery. Courier search will be retried".to_string(),
                }
            },
        }
    }

    async fn notify_preparing(&self, order: &Order, shop_order: &ShopOrder) {
        match self.db.fetch_user(order.customer_id).await {
            Ok(Some(customer)) => {
                let request =
                    NotificationRequest::order_preparing(&customer.email, &customer.full_name, &shop_order.shop_name, order.id);
                self.publisher.notify(request).await;
            },
            Ok(None) => warn!("🔄️ Customer #{} of order #{} is unknown. No notification sent", order.customer_id, order.id),
            Err(e) => warn!("🔄️ Could not look up customer #{} for a notification. {e}", order.customer_id),
        }
    }

    async fn price_order(&self, customer_id: UserId, new_order: NewOrder) -> Result<OrderDraft, FulfillmentError> {
        if new_order.items.is_empty() {
            return Err(FulfillmentError::validation("Cart is empty"));
        }
        let address = new_order
            .delivery_address
            .ok_or_else(|| FulfillmentError::validation("A delivery address is required"))?;
        if address.text.trim().is_empty() {
            return Err(FulfillmentError::validation("A delivery address is required"));
        }
        address.point().map_err(|e| FulfillmentError::validation(format!("Invalid delivery location. {e}")))?;
        if let Some(line) = new_order.items.iter().find(|l| l.quantity <= 0) {
            return Err(FulfillmentError::validation(format!("Invalid quantity for {}", line.name)));
        }
        if let Some(line) = new_order.items.iter().find(|l| l.price.is_negative()) {
            return Err(FulfillmentError::validation(format!("Invalid price for {}", line.name)));
        }
        let (payment_status, payment) = match new_order.payment_method {
            PaymentMethod::Cod => (PaymentStatus::Pending, new_order.payment),
            PaymentMethod::Online => match new_order.payment {
                Some(p) if p.verified => (PaymentStatus::Paid, Some(p)),
                _ => return Err(FulfillmentError::validation("Online payment has not been verified")),
            },
        };

        let mut groups: Vec<(ShopId, Vec<ShopOrderItem>)> = Vec::new();
        for line in new_order.items {
            let item = ShopOrderItem {
                item_id: line.item_id,
                name: line.name,
                price: line.price,
                image: line.image,
                quantity: line.quantity,
                food_type: line.food_type,
            };
            match groups.iter_mut().find(|(id, _)| *id == line.shop_id) {
                Some((_, items)) => items.push(item),
                None => groups.push((line.shop_id, vec![item])),
            }
        }
        let shop_ids = groups.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        let shops = self.db.fetch_shops(&shop_ids).await?;
        let mut shop_orders = Vec::with_capacity(groups.len());
        for (shop_id, items) in groups {
            let shop = shops
                .iter()
                .find(|s| s.id == shop_id)
                .ok_or_else(|| FulfillmentError::validation(format!("Shop {shop_id} not found")))?;
            let subtotal = items
                .iter()
                .try_fold(Paise::default(), |acc, item| item.line_total().and_then(|line| acc.checked_add(line)))
                .ok_or_else(|| FulfillmentError::validation(TOTAL_TOO_LARGE))?;
            shop_orders.push(ShopOrderDraft {
                shop_id,
                shop_name: shop.name.clone(),
                owner_id: shop.owner_id,
                subtotal,
                items,
            });
        }
        let items_total = Paise::checked_sum(shop_orders.iter().map(|so| so.subtotal))
            .ok_or_else(|| FulfillmentError::validation(TOTAL_TOO_LARGE))?;
        let delivery_fee = self.pricing.delivery_fee_for(items_total);
        let total_amount =
            items_total.checked_add(delivery_fee).ok_or_else(|| FulfillmentError::validation(TOTAL_TOO_LARGE))?;
        if let Some(client_total) = new_order.client_total {
            if client_total != total_amount {
                return Err(FulfillmentError::validation(format!(
                    "Order total has changed. Expected {total_amount} but the cart shows {client_total}"
                )));
            }
        }
        Ok(OrderDraft {
            customer_id,
            payment_method: new_order.payment_method,
            payment_status,
            payment,
            delivery_address: address,
            items_total,
            delivery_fee,
            total_amount,
            shop_orders,
        })
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Order, FulfillmentError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| FulfillmentError::not_found(format!("Order {order_id} not found")))
    }
}

pub(crate) fn is_party_to(order: &Order, user_id: UserId) -> bool {
    order.customer_id == user_id
        || order.shop_orders.iter().any(|so| so.owner_id == user_id || so.assigned_courier_id == Some(user_id))
}

fn rank(status: ShopOrderStatus) -> u8 {
    match status {
        ShopOrderStatus::Pending => 0,
        ShopOrderStatus::Preparing => 1,
        ShopOrderStatus::OutForDelivery => 2,
        ShopOrderStatus::Delivered => 3,
        ShopOrderStatus::Cancelled => 4,
    }
}

fn concurrent_update(shop_order_id: ShopOrderId) -> FulfillmentError {
    FulfillmentError::invalid_state(format!("Shop order {shop_order_id} was updated concurrently. Please refresh"))
}
