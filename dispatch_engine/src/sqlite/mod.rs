//! SQLite backend for the fulfillment engine.
//!
//! [`SqliteDatabase`] implements every trait in [`crate::traits`]. The low-level queries live in [`db`].
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
