//! Primitives shared by the dispatch engine and the dispatch server.
//!
//! * [`Paise`] is the money type. All amounts are held as integer minor units of the rupee.
//! * [`GeoPoint`] and [`haversine_distance_m`] back the courier proximity search.
//! * [`Secret`] keeps credentials out of `Debug` and `Display` output.
mod geo;
mod paise;

pub mod op;
mod secret;

pub use geo::{haversine_distance_m, BoundingBox, GeoPoint, GeoPointError, EARTH_RADIUS_M};
pub use paise::{Paise, PaiseConversionError, CURRENCY_CODE};
pub use secret::Secret;
