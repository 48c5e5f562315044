use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use dispatch_common::{GeoPoint, Paise};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

/// Declares an integer-backed identifier newtype that is stored transparently in the database and serialised as a
/// bare number.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|e| ConversionError(format!("'{s}' is not a valid {}. {e}", stringify!($name))))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Primary key of the root order aggregate
    OrderId
);
id_type!(
    /// Primary key of a per-shop sub-order
    ShopOrderId
);
id_type!(AssignmentId);
id_type!(
    /// Identifier issued by the auth collaborator. Customers, owners and couriers share the id space.
    UserId
);
id_type!(ShopId);

/// Implements `Display` and `FromStr` for a unit enum using its wire names.
macro_rules! wire_names {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("Invalid {}: {s}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------          Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "user")]
    Customer,
    Owner,
    #[serde(alias = "deliveryBoy", alias = "delivery")]
    Courier,
}

wire_names!(Role { Customer => "customer", Owner => "owner", Courier => "courier" });

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery
    Cod,
    /// Paid up-front through the payment gateway
    Online,
}

wire_names!(PaymentMethod { Cod => "cod", Online => "online" });

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

wire_names!(PaymentStatus { Pending => "pending", Paid => "paid", Failed => "failed", Refunded => "refunded" });

//--------------------------------------        FoodType       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum FoodType {
    Veg,
    NonVeg,
}

wire_names!(FoodType { Veg => "veg", NonVeg => "non-veg" });

//--------------------------------------    ShopOrderStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ShopOrderStatus {
    /// The sub-order has been placed and the shop has not started on it yet.
    Pending,
    /// The shop is preparing the food.
    Preparing,
    /// The food has left (or is about to leave) the shop. Entering this state triggers courier dispatch.
    OutForDelivery,
    /// Handoff to the customer was confirmed with a one-time code.
    Delivered,
    Cancelled,
}

wire_names!(ShopOrderStatus {
    Pending => "pending",
    Preparing => "preparing",
    OutForDelivery => "out-for-delivery",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl ShopOrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// The toast-style message shown to clients when a sub-order enters this status.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Pending => "Order placed",
            Self::Preparing => "Order is being prepared",
            Self::OutForDelivery => "Order is out for delivery",
            Self::Delivered => "Order delivered",
            Self::Cancelled => "Order cancelled",
        }
    }
}

//--------------------------------------    AssignmentStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStatus {
    Broadcasted,
    Assigned,
    PickedUp,
    EnRoute,
    Delivered,
    Completed,
    Cancelled,
}

wire_names!(AssignmentStatus {
    Broadcasted => "broadcasted",
    Assigned => "assigned",
    PickedUp => "picked-up",
    EnRoute => "en-route",
    Delivered => "delivered",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl AssignmentStatus {
    /// The statuses in which a courier is considered busy.
    pub const ACTIVE: [AssignmentStatus; 3] = [Self::Assigned, Self::PickedUp, Self::EnRoute];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

//--------------------------------------    DeliveryAddress    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl DeliveryAddress {
    pub fn point(&self) -> Result<GeoPoint, dispatch_common::GeoPointError> {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

//--------------------------------------     PaymentDetails    ---------------------------------------------------------
/// Payment metadata recorded as supplied by the payment collaborator. It is never re-verified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<Paise>,
    pub receipt: Option<String>,
    /// Set by the payment collaborator once it has checked the gateway signature
    #[serde(default)]
    pub verified: bool,
}

fn default_provider() -> String {
    "razorpay".to_string()
}

//--------------------------------------       UserProfile      --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: Role,
    pub location: Option<GeoPoint>,
    pub location_updated_at: Option<DateTime<Utc>>,
}

/// A user record as supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: Role,
}

impl NewUser {
    pub fn new<S: Into<String>>(id: UserId, full_name: S, email: S, role: Role) -> Self {
        Self { id, full_name: full_name.into(), email: email.into(), mobile: None, role }
    }

    pub fn with_mobile<S: Into<String>>(mut self, mobile: S) -> Self {
        self.mobile = Some(mobile.into());
        self
    }
}

//--------------------------------------       HandoffCode      --------------------------------------------------------
/// A one-time code held on a customer record while a delivery is awaiting handoff. The code is only good for the
/// assignment it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub assignment_id: AssignmentId,
}

impl HandoffCode {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

//--------------------------------------          Shop         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub owner_id: UserId,
    pub address: Option<String>,
}

//--------------------------------------         Orders        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopOrderItem {
    pub item_id: String,
    pub name: String,
    pub price: Paise,
    pub image: String,
    pub quantity: i64,
    pub food_type: FoodType,
}

impl ShopOrderItem {
    /// Price times quantity, or `None` if that does not fit in [`Paise`].
    pub fn line_total(&self) -> Option<Paise> {
        self.price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopOrder {
    pub id: ShopOrderId,
    pub order_id: OrderId,
    pub shop_id: ShopId,
    pub shop_name: String,
    pub owner_id: UserId,
    pub subtotal: Paise,
    pub items: Vec<ShopOrderItem>,
    pub status: ShopOrderStatus,
    #[serde(rename = "assignment")]
    pub assignment_id: Option<AssignmentId>,
    #[serde(rename = "assignedDeliveryBoy")]
    pub assigned_courier_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_id: UserId,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment: Option<PaymentDetails>,
    pub delivery_address: DeliveryAddress,
    /// Sum of the sub-order subtotals
    pub items_total: Paise,
    pub delivery_fee: Paise,
    /// `items_total + delivery_fee`, fixed at creation
    pub total_amount: Paise,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shop_orders: Vec<ShopOrder>,
}

impl Order {
    pub fn shop_order(&self, id: ShopOrderId) -> Option<&ShopOrder> {
        self.shop_orders.iter().find(|so| so.id == id)
    }

    pub fn owner_ids(&self) -> Vec<UserId> {
        let mut owners = self.shop_orders.iter().map(|so| so.owner_id).collect::<Vec<_>>();
        owners.sort();
        owners.dedup();
        owners
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
/// One line of the cart submitted by the customer. Name, price and image are the catalog snapshot at the time the item
/// was added to the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(alias = "id", alias = "_id")]
    pub item_id: String,
    pub shop_id: ShopId,
    pub name: String,
    pub price: Paise,
    pub quantity: i64,
    #[serde(default)]
    pub image: String,
    pub food_type: FoodType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(alias = "cartItems")]
    pub items: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    pub delivery_address: Option<DeliveryAddress>,
    pub payment: Option<PaymentDetails>,
    /// The total the client displayed at checkout. If supplied, it must match the server-side total.
    #[serde(alias = "totalAmount")]
    pub client_total: Option<Paise>,
}

impl NewOrder {
    pub fn new(payment_method: PaymentMethod, delivery_address: DeliveryAddress) -> Self {
        Self { items: vec![], payment_method, delivery_address: Some(delivery_address), payment: None, client_total: None }
    }

    pub fn with_line(mut self, line: CartLine) -> Self {
        self.items.push(line);
        self
    }

    pub fn with_payment(mut self, payment: PaymentDetails) -> Self {
        self.payment = Some(payment);
        self
    }
}

/// A fully priced order, ready to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub customer_id: UserId,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment: Option<PaymentDetails>,
    pub delivery_address: DeliveryAddress,
    pub items_total: Paise,
    pub delivery_fee: Paise,
    pub total_amount: Paise,
    pub shop_orders: Vec<ShopOrderDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShopOrderDraft {
    pub shop_id: ShopId,
    pub shop_name: String,
    pub owner_id: UserId,
    pub subtotal: Paise,
    pub items: Vec<ShopOrderItem>,
}

//--------------------------------------   DeliveryAssignment  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAssignment {
    pub id: AssignmentId,
    pub order_id: OrderId,
    pub shop_id: ShopId,
    pub shop_order_id: ShopOrderId,
    pub broadcasted_to: Vec<UserId>,
    pub assigned_to: Option<UserId>,
    pub status: AssignmentStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAssignment {
    pub order_id: OrderId,
    pub shop_id: ShopId,
    pub shop_order_id: ShopOrderId,
    pub broadcast_to: Vec<UserId>,
}

/// The result of a successful accept: the updated assignment, and the couriers that were offered the job but lost it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedAssignment {
    pub assignment: DeliveryAssignment,
    pub previous_broadcast: Vec<UserId>,
}

/// Why a conditional assignment write did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimRejection {
    NotFound,
    NotBroadcasted(AssignmentStatus),
    NotOffered,
    /// The courier already holds another active assignment
    CourierBusy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(ClaimedAssignment),
    Rejected(ClaimRejection),
}

/// An assignment that was cancelled, along with everyone who must be told the offer or job is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedAssignment {
    pub assignment: DeliveryAssignment,
    pub previous_broadcast: Vec<UserId>,
    pub previous_courier: Option<UserId>,
}

impl ClosedAssignment {
    /// Every courier that held the offer or the job, without duplicates.
    pub fn affected_couriers(&self) -> Vec<UserId> {
        let mut ids = self.previous_broadcast.clone();
        ids.extend(self.previous_courier);
        ids.sort();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelledShopOrder {
    pub shop_order_id: ShopOrderId,
    /// The sub-order's assignment, if it had one that was still open
    pub closed_assignment: Option<ClosedAssignment>,
}

//--------------------------------------    CourierCandidate   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierCandidate {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub location: GeoPoint,
    pub distance_m: f64,
}
