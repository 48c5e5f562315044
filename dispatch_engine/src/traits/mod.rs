//! # Storage backend contracts
//!
//! This module defines the behaviour a storage backend must expose in order to drive the fulfillment engine.
//!
//! ## Traits
//! * [`FulfillmentDatabase`] is the umbrella trait that a complete backend implements. The engine APIs are generic
//!   over it, or over the narrower traits below when they need less.
//! * [`OrderManagement`] stores the order aggregate and governs the conditional sub-order status writes.
//! * [`AssignmentManagement`] owns delivery assignments and the broadcast/accept and completion writes.
//! * [`CourierIndex`] answers "which couriers are near this point, and which of them are busy".
//! * [`UserManagement`] holds the mirrored user profiles, courier locations and handoff codes.
//! * [`CatalogManagement`] holds the mirrored shop records.
//!
//! Every mutation that touches more than one row is atomic. Conditional writes report whether they applied rather
//! than returning an error, so callers can decide what a lost race means.
mod assignment_management;
mod catalog_management;
mod courier_index;
mod fulfillment_database;
mod order_management;
mod store_error;
mod user_management;

pub use assignment_management::AssignmentManagement;
pub use catalog_management::CatalogManagement;
pub use courier_index::CourierIndex;
pub use fulfillment_database::FulfillmentDatabase;
pub use order_management::OrderManagement;
pub use store_error::StoreError;
pub use user_management::UserManagement;
