//! # Dispatch server
//! This crate hosts the HTTP and real-time surface of the food delivery dispatch engine. It is responsible for:
//! * Authenticating callers with the access tokens issued by the auth service.
//! * Routing customer, owner and courier requests to the engine APIs.
//! * Streaming engine events to connected clients over server-sent events.
//! * Relaying notification requests to the email service.
//! * Periodically sweeping stale courier broadcasts.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! `/health` is public. Everything else lives under `/api` and needs a valid access token. See [routes] for the full
//! list.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod notifier;
pub mod realtime;
pub mod routes;
pub mod server;
pub mod stale_broadcast_worker;

#[cfg(test)]
mod endpoint_tests;
