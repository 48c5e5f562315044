//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! SQLite only retries a busy writer if the transaction has not read anything yet, so every write transaction in
//! this crate starts with its deciding write.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod assignments;
pub mod couriers;
pub mod orders;
pub mod shops;
pub mod users;

const SQLITE_DB_URL: &str = "sqlite://data/fds_store.db";

pub fn db_url() -> String {
    let result = env::var("FDS_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ FDS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
