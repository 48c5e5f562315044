use std::fmt::Debug;

use dispatch_common::GeoPoint;
use log::*;

use crate::{
    db_types::CourierCandidate,
    engine_api::{errors::FulfillmentError, policies::DispatchPolicy},
    traits::CourierIndex,
};

/// Finds candidate couriers for a delivery point.
///
/// The search first looks within the near radius. Only if nobody at all is found there does it widen to the far
/// radius. Busy couriers are removed after the radius has been settled, so a near radius full of busy couriers does
/// not trigger the wider search.
pub struct CourierIndexApi<B> {
    db: B,
    policy: DispatchPolicy,
}

impl<B> Debug for CourierIndexApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CourierIndexApi")
    }
}

impl<B: Clone> Clone for CourierIndexApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), policy: self.policy }
    }
}

impl<B> CourierIndexApi<B> {
    pub fn new(db: B, policy: DispatchPolicy) -> Self {
        Self { db, policy }
    }
}

impl<B> CourierIndexApi<B>
where B: CourierIndex
{
    /// Couriers near `point`, nearest first. An empty result is not an error.
    pub async fn find_candidates(
        &self,
        point: &GeoPoint,
        exclude_busy: bool,
    ) -> Result<Vec<CourierCandidate>, FulfillmentError> {
        let mut candidates = self.db.couriers_within(point, self.policy.near_radius_m).await?;
        if candidates.is_empty() {
            debug!(
                "🛵️ Nobody within {:.0}m of {point:?}. Widening the search to {:.0}m",
                self.policy.near_radius_m, self.policy.far_radius_m
            );
            candidates = self.db.couriers_within(point, self.policy.far_radius_m).await?;
        }
        if exclude_busy && !candidates.is_empty() {
            let ids = candidates.iter().map(|c| c.id).collect::<Vec<_>>();
            let busy = self.db.busy_couriers(&ids).await?;
            if !busy.is_empty() {
                trace!("🛵️ Excluding {} busy couriers", busy.len());
                candidates.retain(|c| !busy.contains(&c.id));
            }
        }
        debug!("🛵️ {} candidate couriers near {point:?}", candidates.len());
        Ok(candidates)
    }

    /// The owner-facing "available couriers near a point" view. Busy couriers are left out.
    pub async fn available_near(&self, latitude: f64, longitude: f64) -> Result<Vec<CourierCandidate>, FulfillmentError> {
        let point = GeoPoint::new(latitude, longitude).map_err(|e| FulfillmentError::validation(e.to_string()))?;
        self.find_candidates(&point, true).await
    }
}
