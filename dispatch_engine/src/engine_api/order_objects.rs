use chrono::{DateTime, Utc};
use dispatch_common::GeoPoint;
use serde::{Deserialize, Serialize};

pub use crate::events::{AssignmentOffer, OfferItem, ShopRef};
use crate::db_types::{
    CourierCandidate,
    DeliveryAddress,
    DeliveryAssignment,
    Order,
    OrderId,
    Paise,
    PaymentMethod,
    PaymentStatus,
    ShopOrder,
    ShopOrderId,
    UserId,
    UserProfile,
};

/// The contact details of a party to an order, as shown to the other parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub mobile: Option<String>,
}

impl From<&UserProfile> for ContactDetails {
    fn from(user: &UserProfile) -> Self {
        Self { id: user.id, full_name: user.full_name.clone(), email: user.email.clone(), mobile: user.mobile.clone() }
    }
}

/// An order as seen by one shop owner: only that owner's sub-orders, and their subtotal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerOrderView {
    pub id: OrderId,
    pub customer: Option<ContactDetails>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub delivery_address: DeliveryAddress,
    pub created_at: DateTime<Utc>,
    pub shop_orders: Vec<ShopOrder>,
    /// Sum of the owner's sub-order subtotals
    pub owner_total: Paise,
}

impl OwnerOrderView {
    pub fn new(order: Order, owner_id: UserId, customer: Option<ContactDetails>) -> Self {
        let shop_orders = order.shop_orders.into_iter().filter(|so| so.owner_id == owner_id).collect::<Vec<_>>();
        let owner_total = shop_orders.iter().map(|so| so.subtotal).sum();
        Self {
            id: order.id,
            customer,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            delivery_address: order.delivery_address,
            created_at: order.created_at,
            shop_orders,
            owner_total,
        }
    }
}

/// The result of trying to dispatch a sub-order to nearby couriers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub shop_order_id: ShopOrderId,
    pub assignment: Option<DeliveryAssignment>,
    /// The couriers the job was offered to, nearest first. Empty if nobody was available or the sub-order was
    /// already dispatched.
    pub candidates: Vec<CourierCandidate>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order_id: OrderId,
    pub shop_order: ShopOrder,
    pub dispatch: Option<DispatchOutcome>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedAssignment {
    pub assignment: DeliveryAssignment,
    pub order_id: OrderId,
    pub shop_order: ShopOrder,
    pub message: String,
}

/// Everything a courier needs to carry out their current delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentDelivery {
    pub assignment: DeliveryAssignment,
    pub order_id: OrderId,
    pub shop_order: ShopOrder,
    pub shop: ShopRef,
    pub customer: ContactDetails,
    pub delivery_address: DeliveryAddress,
    pub courier_location: Option<GeoPoint>,
    pub customer_location: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffCodeIssued {
    pub order_id: OrderId,
    pub shop_order_id: ShopOrderId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfirmed {
    pub order_id: OrderId,
    pub shop_order: ShopOrder,
    pub assignment: DeliveryAssignment,
}

/// What one pass of the stale-broadcast sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub expired: usize,
    pub retried: usize,
    pub dispatched: usize,
}
