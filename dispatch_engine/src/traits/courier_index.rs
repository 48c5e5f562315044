use dispatch_common::GeoPoint;

use crate::{
    db_types::{CourierCandidate, UserId},
    traits::StoreError,
};

/// Spatial lookups over courier locations.
#[allow(async_fn_in_trait)]
pub trait CourierIndex {
    /// Couriers with a known location within `radius_m` metres of `point`, nearest first.
    async fn couriers_within(&self, point: &GeoPoint, radius_m: f64) -> Result<Vec<CourierCandidate>, StoreError>;

    /// The subset of `courier_ids` that currently hold an active assignment.
    async fn busy_couriers(&self, courier_ids: &[UserId]) -> Result<Vec<UserId>, StoreError>;
}
