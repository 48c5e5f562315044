//! Food order fulfillment and delivery dispatch engine
//!
//! The engine coordinates an order from placement, through courier assignment, to proof of delivery. Customers, shop
//! owners and couriers all watch the same order, so every state change is fanned out to them as it happens.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and [`mod@sqlite`]). The traits describe what a backend must provide; SQLite is the
//!    supported backend. You should never need to touch the database directly. The data types shared with the storage
//!    layer live in [`mod@db_types`] and are public.
//! 2. The public engine API ([`mod@engine_api`]). [`OrderFlowApi`] drives the order lifecycle, [`DispatchApi`] runs
//!    the broadcast and accept protocol, [`HandoffApi`] closes a delivery with a one-time code, and [`TrackingApi`]
//!    relays courier positions.
//! 3. Events ([`mod@events`]). State changes are published as channel-addressed events through a [`Publisher`]. The
//!    host process registers hooks to deliver them, typically to a real-time gateway and an email service.
pub mod db_types;
pub mod engine_api;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use engine_api::{
    courier_index_api::CourierIndexApi,
    directory_api::DirectoryApi,
    dispatch_api::DispatchApi,
    errors::FulfillmentError,
    handoff_api::HandoffApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    policies::{DispatchPolicy, PricingPolicy},
    tracking_api::TrackingApi,
};
pub use events::Publisher;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    AssignmentManagement,
    CatalogManagement,
    CourierIndex,
    FulfillmentDatabase,
    OrderManagement,
    StoreError,
    UserManagement,
};
