use std::fmt::Debug;

use chrono::Utc;
use dispatch_common::GeoPoint;
use log::*;

use crate::{
    db_types::UserId,
    engine_api::errors::FulfillmentError,
    events::{LatLong, LocationPayload, Publisher},
    traits::{AssignmentManagement, FulfillmentDatabase, OrderManagement, UserManagement},
};

/// Live location updates.
///
/// Any user may report their position. A courier's position is also relayed to the parties of their active delivery.
pub struct TrackingApi<B> {
    db: B,
    publisher: Publisher,
}

impl<B> Debug for TrackingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrackingApi")
    }
}

impl<B: Clone> Clone for TrackingApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), publisher: self.publisher.clone() }
    }
}

impl<B> TrackingApi<B> {
    pub fn new(db: B, publisher: Publisher) -> Self {
        Self { db, publisher }
    }
}

impl<B> TrackingApi<B>
where B: FulfillmentDatabase
{
    pub async fn update_location(
        &self,
        user_id: UserId,
        latitude: f64,
        longitude: f64,
    ) -> Result<GeoPoint, FulfillmentError> {
        let point = GeoPoint::new(latitude, longitude).map_err(|e| FulfillmentError::validation(e.to_string()))?;
        if !self.db.update_location(user_id, point, Utc::now()).await? {
            return Err(FulfillmentError::not_found(format!("User {user_id} not found")));
        }
        trace!("📍️ User #{user_id} is at {point:?}");
        let Some(assignment) = self.db.fetch_active_assignment_for_courier(user_id).await? else {
            return Ok(point);
        };
        let Some(order) = self.db.fetch_order(assignment.order_id).await? else {
            warn!("📍️ Active assignment #{} refers to missing order #{}", assignment.id, assignment.order_id);
            return Ok(point);
        };
        let Some(shop_order) = order.shop_order(assignment.shop_order_id) else {
            warn!("📍️ Active assignment #{} refers to missing shop order #{}", assignment.id, assignment.shop_order_id);
            return Ok(point);
        };
        let payload = LocationPayload {
            order_id: order.id,
            shop_order_id: shop_order.id,
            assignment_id: assignment.id,
            delivery_boy_id: user_id,
            location: LatLong { lat: point.latitude, long: point.longitude },
            delivery_address: order.delivery_address.clone(),
        };
        self.publisher.courier_moved(order.customer_id, shop_order.owner_id, payload).await;
        Ok(point)
    }
}
