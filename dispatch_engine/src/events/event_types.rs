use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::{
    AssignmentId,
    DeliveryAddress,
    OrderId,
    Paise,
    ShopId,
    ShopOrder,
    ShopOrderId,
    ShopOrderStatus,
    UserId,
};

/// A real-time channel. Clients join their role channel on connection and may subscribe to the channels of the
/// orders they are party to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Order(OrderId),
    Customer(UserId),
    Owner(UserId),
    Courier(UserId),
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Order(id) => write!(f, "order:{id}"),
            Channel::Customer(id) => write!(f, "user:{id}"),
            Channel::Owner(id) => write!(f, "owner:{id}"),
            Channel::Courier(id) => write!(f, "delivery:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEvent {
    pub channel: Channel,
    pub message: RealtimeMessage,
}

impl RealtimeEvent {
    pub fn new(channel: Channel, message: RealtimeMessage) -> Self {
        Self { channel, message }
    }

    pub fn event_name(&self) -> &'static str {
        self.message.event_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RealtimeMessage {
    OrderStatus(Box<OrderStatusPayload>),
    OrdersRefresh(RefreshHint),
    Assignment(AssignmentOffer),
    AssignmentClosed(AssignmentClosedPayload),
    Location(LocationPayload),
}

impl RealtimeMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            RealtimeMessage::OrderStatus(_) => "order:status",
            RealtimeMessage::OrdersRefresh(_) => "orders:refresh",
            RealtimeMessage::Assignment(_) => "delivery:assignment",
            RealtimeMessage::AssignmentClosed(_) => "delivery:assignment-closed",
            RealtimeMessage::Location(_) => "delivery:location",
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The detailed view of a sub-order after a state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusPayload {
    pub order_id: OrderId,
    pub shop_order_id: ShopOrderId,
    pub status: ShopOrderStatus,
    pub assignment_id: Option<AssignmentId>,
    pub assigned_delivery_boy: Option<UserId>,
    pub user_id: UserId,
    pub owner_id: UserId,
    pub message: String,
    pub shop_order: ShopOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshScope {
    User,
    Owner,
    Delivery,
}

/// A coarse "something about this order changed, refetch your list" hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshHint {
    pub scope: RefreshScope,
    pub order_id: OrderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopRef {
    pub id: ShopId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferItem {
    pub name: String,
    pub quantity: i64,
    pub price: Paise,
}

/// A delivery job as shown to a candidate courier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOffer {
    pub assignment_id: AssignmentId,
    pub order_id: OrderId,
    pub shop_order_id: ShopOrderId,
    pub shop: ShopRef,
    pub items: Vec<OfferItem>,
    pub subtotal: Paise,
    pub delivery_address: DeliveryAddress,
}

impl AssignmentOffer {
    pub fn new(assignment_id: AssignmentId, shop_order: &ShopOrder, delivery_address: DeliveryAddress) -> Self {
        let items = shop_order
            .items
            .iter()
            .map(|i| OfferItem { name: i.name.clone(), quantity: i.quantity, price: i.price })
            .collect();
        Self {
            assignment_id,
            order_id: shop_order.order_id,
            shop_order_id: shop_order.id,
            shop: ShopRef { id: shop_order.shop_id, name: shop_order.shop_name.clone() },
            items,
            subtotal: shop_order.subtotal,
            delivery_address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentClosedPayload {
    pub assignment_id: AssignmentId,
    pub order_id: OrderId,
    pub shop_order_id: ShopOrderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLong {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub order_id: OrderId,
    pub shop_order_id: ShopOrderId,
    pub assignment_id: AssignmentId,
    pub delivery_boy_id: UserId,
    pub location: LatLong,
    pub delivery_address: DeliveryAddress,
}

//--------------------------------------  NotificationRequest  ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationTemplate {
    /// Carries the one-time handoff code to the customer
    DeliveryOtp,
    OrderPreparing,
}

/// A best-effort message for the outbound notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub receiver: String,
    pub template: NotificationTemplate,
    pub subject: String,
    pub payload: Value,
}

impl NotificationRequest {
    pub fn handoff_code(receiver: &str, full_name: &str, code: &str, order_id: OrderId) -> Self {
        Self {
            receiver: receiver.to_string(),
            template: NotificationTemplate::DeliveryOtp,
            subject: "Your delivery OTP".to_string(),
            payload: serde_json::json!({ "name": full_name, "otp": code, "orderId": order_id }),
        }
    }

    pub fn order_preparing(receiver: &str, full_name: &str, shop_name: &str, order_id: OrderId) -> Self {
        Self {
            receiver: receiver.to_string(),
            template: NotificationTemplate::OrderPreparing,
            subject: format!("{shop_name} is preparing your order"),
            payload: serde_json::json!({ "name": full_name, "shopName": shop_name, "orderId": order_id }),
        }
    }
}
