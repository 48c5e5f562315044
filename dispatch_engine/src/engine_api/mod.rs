//! # Fulfillment engine public API
//!
//! The `engine_api` module exposes the programmatic API for the fulfillment engine. The API is modular, so each
//! caller holds only the parts it needs.
//!
//! * [`order_flow_api`] places orders, reads them back for each party, and moves sub-orders through their statuses.
//! * [`dispatch_api`] offers out-for-delivery sub-orders to nearby couriers and settles who gets them.
//! * [`courier_index_api`] answers "which couriers are available near this point".
//! * [`handoff_api`] runs the two-phase proof-of-delivery protocol.
//! * [`tracking_api`] records live locations and relays courier movements.
//! * [`directory_api`] keeps the mirrored user and shop records in sync.
//!
//! # API usage
//!
//! Every API is created from a database backend that implements the traits it needs. APIs that publish state changes
//! also take the shared [`crate::Publisher`].
//!
//! ```rust,ignore
//! use dispatch_engine::{DispatchApi, DispatchPolicy, Publisher, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/fds_store.db", 25).await?;
//! let api = DispatchApi::new(db, Publisher::default(), DispatchPolicy::default());
//! let offers = api.broadcasts_for_courier(courier_id).await?;
//! ```
pub mod courier_index_api;
pub mod directory_api;
pub mod dispatch_api;
pub mod errors;
pub mod handoff_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod policies;
pub mod tracking_api;
