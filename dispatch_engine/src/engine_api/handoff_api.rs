use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{AssignmentStatus, DeliveryAssignment, HandoffCode, Order, UserId},
    engine_api::{
        dispatch_api::find_shop_order,
        errors::FulfillmentError,
        order_objects::{DeliveryConfirmed, HandoffCodeIssued},
    },
    events::{NotificationRequest, Publisher},
    helpers::generate_handoff_code,
    traits::{AssignmentManagement, FulfillmentDatabase, OrderManagement, UserManagement},
};

/// The two-phase proof-of-delivery protocol.
///
/// The courier asks for a one-time code, which is stored on the customer's record and sent to the customer. The
/// courier then confirms the delivery with the code the customer reads out. Only a matching, unexpired code completes
/// the assignment.
///
/// A customer holds one outstanding code at a time, bound to the assignment it was issued for. If two deliveries to
/// the same customer request codes, the later request supersedes the earlier one, and the first courier must request
/// a new code before confirming.
pub struct HandoffApi<B> {
    db: B,
    publisher: Publisher,
    code_ttl: Duration,
}

impl<B> Debug for HandoffApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HandoffApi")
    }
}

impl<B: Clone> Clone for HandoffApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), publisher: self.publisher.clone(), code_ttl: self.code_ttl }
    }
}

impl<B> HandoffApi<B> {
    pub fn new(db: B, publisher: Publisher, code_ttl: Duration) -> Self {
        Self { db, publisher, code_ttl }
    }
}

impl<B> HandoffApi<B>
where B: FulfillmentDatabase
{
    /// Phase one. Issues a fresh code for the customer of the courier's current delivery, replacing any code that
    /// was still outstanding.
    pub async fn request_code(&self, courier_id: UserId) -> Result<HandoffCodeIssued, FulfillmentError> {
        let (assignment, order) = self.assigned_delivery(courier_id).await?;
        let customer = self
            .db
            .fetch_user(order.customer_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(format!("Customer {} not found", order.customer_id)))?;
        let code = generate_handoff_code();
        let expires_at = Utc::now() + self.code_ttl;
        self.db.set_handoff_code(customer.id, HandoffCode { code: code.clone(), expires_at, assignment_id: assignment.id }).await?;
        info!("🔐️ Handoff code issued for order #{} by courier #{courier_id}", order.id);
        self.publisher.notify(NotificationRequest::handoff_code(&customer.email, &customer.full_name, &code, order.id)).await;
        Ok(HandoffCodeIssued { order_id: order.id, shop_order_id: assignment.shop_order_id, expires_at })
    }

    /// Phase two. Completes the courier's delivery if `code` matches the customer's outstanding code.
    ///
    /// A wrong code is reported as such whether or not the stored code has expired. A correct but expired code
    /// leaves everything unchanged.
    pub async fn confirm(&self, courier_id: UserId, code: &str) -> Result<DeliveryConfirmed, FulfillmentError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(FulfillmentError::validation("A handoff code is required"));
        }
        let (assignment, order) = self.assigned_delivery(courier_id).await?;
        let stored = self.db.fetch_handoff_code(order.customer_id).await?.ok_or(FulfillmentError::InvalidCode)?;
        if stored.assignment_id != assignment.id {
            debug!("🔐️ The outstanding code for order #{} was issued for another delivery", order.id);
            return Err(FulfillmentError::InvalidCode);
        }
        if stored.code != code {
            debug!("🔐️ Courier #{courier_id} supplied the wrong handoff code for order #{}", order.id);
            return Err(FulfillmentError::InvalidCode);
        }
        if stored.is_expired_at(Utc::now()) {
            debug!("🔐️ Courier #{courier_id} supplied an expired handoff code for order #{}", order.id);
            return Err(FulfillmentError::ExpiredCode);
        }
        let completed = self.db.complete_assignment(assignment.id, courier_id).await?.ok_or_else(|| {
            FulfillmentError::invalid_state(format!("Assignment {} can no longer be completed", assignment.id))
        })?;
        info!("🔐️ Order #{} shop order #{} delivered by courier #{courier_id}", order.id, completed.shop_order_id);
        let order = self
            .db
            .fetch_order(order.id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(format!("Order {} not found", order.id)))?;
        let shop_order = find_shop_order(&order, completed.shop_order_id)?.clone();
        self.publisher.shop_order_changed(&order, &shop_order, Some(courier_id)).await;
        Ok(DeliveryConfirmed { order_id: order.id, shop_order, assignment: completed })
    }

    async fn assigned_delivery(&self, courier_id: UserId) -> Result<(DeliveryAssignment, Order), FulfillmentError> {
        let assignment = self
            .db
            .fetch_active_assignment_for_courier(courier_id)
            .await?
            .filter(|a| a.status == AssignmentStatus::Assigned)
            .ok_or_else(|| FulfillmentError::not_found("No assigned delivery found"))?;
        let order = self
            .db
            .fetch_order(assignment.order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(format!("Order {} not found", assignment.order_id)))?;
        Ok((assignment, order))
    }
}
