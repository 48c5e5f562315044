use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{
        AssignmentId,
        AssignmentStatus,
        ClaimOutcome,
        ClaimRejection,
        DeliveryAssignment,
        NewAssignment,
        Order,
        OrderId,
        ShopOrder,
        ShopOrderId,
        ShopOrderStatus,
        UserId,
    },
    engine_api::{
        courier_index_api::CourierIndexApi,
        errors::FulfillmentError,
        order_objects::{
            AcceptedAssignment,
            AssignmentOffer,
            ContactDetails,
            CurrentDelivery,
            DispatchOutcome,
            ShopRef,
            SweepReport,
        },
        policies::DispatchPolicy,
    },
    events::{AssignmentClosedPayload, Publisher},
    traits::{AssignmentManagement, FulfillmentDatabase, OrderManagement, UserManagement},
};

pub const NO_COURIERS_AVAILABLE: &str = "No couriers available";
pub const BROADCAST_EXPIRED: &str = "broadcast expired";

/// `DispatchApi` implements the broadcast and accept protocol: offering a sub-order to nearby couriers and letting
/// exactly one of them take it.
pub struct DispatchApi<B> {
    db: B,
    couriers: CourierIndexApi<B>,
    publisher: Publisher,
    policy: DispatchPolicy,
}

impl<B> Debug for DispatchApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispatchApi")
    }
}

impl<B: Clone> Clone for DispatchApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            couriers: self.couriers.clone(),
            publisher: self.publisher.clone(),
            policy: self.policy,
        }
    }
}

impl<B: Clone> DispatchApi<B> {
    pub fn new(db: B, publisher: Publisher, policy: DispatchPolicy) -> Self {
        let couriers = CourierIndexApi::new(db.clone(), policy);
        Self { db, couriers, publisher, policy }
    }
}

impl<B> DispatchApi<B>
where B: FulfillmentDatabase
{
    /// Offers the sub-order to the couriers nearest its delivery point.
    ///
    /// The sub-order must be `out-for-delivery`. If it already has an assignment, that assignment is returned and
    /// nothing else happens. If nobody is available, no assignment is created and the outcome says so; the sub-order
    /// stays eligible for a later attempt.
    pub async fn dispatch(
        &self,
        order_id: OrderId,
        shop_order_id: ShopOrderId,
    ) -> Result<DispatchOutcome, FulfillmentError> {
        let order = self.fetch_order(order_id).await?;
        let shop_order = find_shop_order(&order, shop_order_id)?;
        if let Some(assignment_id) = shop_order.assignment_id {
            return self.already_dispatched(shop_order_id, assignment_id).await;
        }
        if shop_order.status != ShopOrderStatus::OutForDelivery {
            return Err(FulfillmentError::invalid_state(format!(
                "Shop order {shop_order_id} is {} and cannot be dispatched",
                shop_order.status
            )));
        }
        let point = order
            .delivery_address
            .point()
            .map_err(|e| FulfillmentError::validation(format!("Invalid delivery location. {e}")))?;
        let candidates = self.couriers.find_candidates(&point, true).await?;
        if candidates.is_empty() {
            info!("🛵️ No couriers available for shop order #{shop_order_id}");
            return Ok(DispatchOutcome {
                shop_order_id,
                assignment: None,
                candidates,
                message: NO_COURIERS_AVAILABLE.to_string(),
            });
        }
        let broadcast_to = candidates.iter().map(|c| c.id).collect::<Vec<_>>();
        let new_assignment =
            NewAssignment { order_id, shop_id: shop_order.shop_id, shop_order_id, broadcast_to: broadcast_to.clone() };
        let Some(assignment) = self.db.create_assignment(new_assignment).await? else {
            let current = self.fetch_order(order_id).await?;
            let current = find_shop_order(&current, shop_order_id)?;
            return match current.assignment_id {
                Some(assignment_id) => {
                    debug!("🛵️ Shop order #{shop_order_id} was dispatched concurrently");
                    self.already_dispatched(shop_order_id, assignment_id).await
                },
                None => Err(FulfillmentError::invalid_state(format!(
                    "Shop order {shop_order_id} is {} and cannot be dispatched",
                    current.status
                ))),
            };
        };
        let offer = AssignmentOffer::new(assignment.id, shop_order, order.delivery_address.clone());
        self.publisher.assignment_offered(&broadcast_to, &offer).await;
        info!("🛵️ Assignment #{} for shop order #{shop_order_id} offered to {} couriers", assignment.id, candidates.len());
        let message = format!("Order sent to {} nearby couriers", candidates.len());
        Ok(DispatchOutcome { shop_order_id, assignment: Some(assignment), candidates, message })
    }

    /// Accepts a broadcast offer on behalf of the courier. Of any number of concurrent accepts, exactly one succeeds.
    pub async fn accept(
        &self,
        assignment_id: AssignmentId,
        courier_id: UserId,
    ) -> Result<AcceptedAssignment, FulfillmentError> {
        let claimed = match self.db.claim_assignment(assignment_id, courier_id).await? {
            ClaimOutcome::Claimed(claimed) => claimed,
            ClaimOutcome::Rejected(rejection) => {
                debug!("🛵️ Courier #{courier_id} lost assignment #{assignment_id}: {rejection:?}");
                return Err(match rejection {
                    ClaimRejection::NotFound => FulfillmentError::not_found("Assignment not found"),
                    ClaimRejection::NotBroadcasted(status) => {
                        FulfillmentError::invalid_state(format!("Assignment is already {status}"))
                    },
                    ClaimRejection::NotOffered => FulfillmentError::forbidden("This assignment was not offered to you"),
                    ClaimRejection::CourierBusy => {
                        FulfillmentError::invalid_state("You are already assigned to another order")
                    },
                });
            },
        };
        let assignment = claimed.assignment;
        info!("🛵️ Courier #{courier_id} accepted assignment #{assignment_id}");
        let losers = claimed.previous_broadcast.into_iter().filter(|id| *id != courier_id).collect::<Vec<_>>();
        self.publisher.assignment_closed(&losers, closed_payload(&assignment)).await;
        let order = self.fetch_order(assignment.order_id).await?;
        let shop_order = find_shop_order(&order, assignment.shop_order_id)?.clone();
        self.publisher.shop_order_changed(&order, &shop_order, None).await;
        Ok(AcceptedAssignment {
            order_id: order.id,
            shop_order,
            assignment,
            message: "Order accepted".to_string(),
        })
    }

    /// The open offers that include this courier, oldest first.
    pub async fn broadcasts_for_courier(&self, courier_id: UserId) -> Result<Vec<AssignmentOffer>, FulfillmentError> {
        let assignments = self.db.fetch_broadcasts_for_courier(courier_id).await?;
        let mut offers = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let Some(order) = self.db.fetch_order(assignment.order_id).await? else {
                warn!("🛵️ Assignment #{} refers to missing order #{}", assignment.id, assignment.order_id);
                continue;
            };
            match order.shop_order(assignment.shop_order_id) {
                Some(so) => offers.push(AssignmentOffer::new(assignment.id, so, order.delivery_address.clone())),
                None => warn!("🛵️ Assignment #{} refers to missing shop order #{}", assignment.id, assignment.shop_order_id),
            }
        }
        Ok(offers)
    }

    /// The courier's current delivery, with everything needed to carry it out.
    pub async fn current_assignment(&self, courier_id: UserId) -> Result<CurrentDelivery, FulfillmentError> {
        let assignment = self
            .db
            .fetch_active_assignment_for_courier(courier_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("No active delivery assignment"))?;
        let order = self.fetch_order(assignment.order_id).await?;
        let shop_order = find_shop_order(&order, assignment.shop_order_id)?.clone();
        let customer = self
            .db
            .fetch_user(order.customer_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(format!("Customer {} not found", order.customer_id)))?;
        let courier_location = self.db.fetch_user(courier_id).await?.and_then(|u| u.location);
        let customer_location = order
            .delivery_address
            .point()
            .map_err(|e| FulfillmentError::Internal(format!("Order {} has an invalid delivery point. {e}", order.id)))?;
        Ok(CurrentDelivery {
            order_id: order.id,
            shop: ShopRef { id: shop_order.shop_id, name: shop_order.shop_name.clone() },
            shop_order,
            customer: ContactDetails::from(&customer),
            delivery_address: order.delivery_address,
            courier_location,
            customer_location,
            assignment,
        })
    }

    /// One pass of the stale-broadcast sweep.
    ///
    /// When a broadcast TTL is configured, offers older than the TTL are withdrawn from their candidates. Then every
    /// `out-for-delivery` sub-order without an assignment, including those just released, is dispatched again.
    pub async fn sweep(&self) -> Result<SweepReport, FulfillmentError> {
        let mut report = SweepReport::default();
        if let Some(ttl) = self.policy.broadcast_ttl {
            let closed = self.db.expire_broadcasts(Utc::now() - ttl, BROADCAST_EXPIRED).await?;
            for c in &closed {
                self.publisher.assignment_closed(&c.affected_couriers(), closed_payload(&c.assignment)).await;
            }
            report.expired = closed.len();
        }
        let pending = self.db.fetch_undispatched_shop_orders().await?;
        report.retried = pending.len();
        for (order_id, shop_order_id) in pending {
            match self.dispatch(order_id, shop_order_id).await {
                Ok(outcome) if outcome.assignment.is_some() => {
                    report.dispatched += 1;
                    let order = self.fetch_order(order_id).await?;
                    let shop_order = find_shop_order(&order, shop_order_id)?;
                    self.publisher.shop_order_changed(&order, shop_order, None).await;
                },
                Ok(_) => trace!("🛵️ Shop order #{shop_order_id} still has no couriers"),
                Err(e) => warn!("🛵️ Could not re-dispatch shop order #{shop_order_id}. {e}"),
            }
        }
        Ok(report)
    }

    async fn already_dispatched(
        &self,
        shop_order_id: ShopOrderId,
        assignment_id: AssignmentId,
    ) -> Result<DispatchOutcome, FulfillmentError> {
        let assignment = self.db.fetch_assignment(assignment_id).await?;
        let message = match assignment.as_ref().map(|a| a.status) {
            Some(AssignmentStatus::Broadcasted) => "Order has already been sent to nearby couriers",
            _ => "Order already has a delivery assignment",
        };
        Ok(DispatchOutcome { shop_order_id, assignment, candidates: vec![], message: message.to_string() })
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Order, FulfillmentError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| FulfillmentError::not_found(format!("Order {order_id} not found")))
    }
}

pub(crate) fn find_shop_order(order: &Order, shop_order_id: ShopOrderId) -> Result<&ShopOrder, FulfillmentError> {
    order
        .shop_order(shop_order_id)
        .ok_or_else(|| FulfillmentError::not_found(format!("Shop order {shop_order_id} not found")))
}

pub(crate) fn closed_payload(assignment: &DeliveryAssignment) -> AssignmentClosedPayload {
    AssignmentClosedPayload {
        assignment_id: assignment.id,
        order_id: assignment.order_id,
        shop_order_id: assignment.shop_order_id,
    }
}
