//! `SqliteDatabase` is a concrete implementation of a fulfillment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Multi-row mutations are composed here from the low-level functions in [`super::db`], each inside a single
//! transaction.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use dispatch_common::GeoPoint;
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{assignments, couriers, db_url, new_pool, orders, shops, users};
use crate::{
    db_types::{
        AssignmentId,
        AssignmentStatus,
        CancelledShopOrder,
        ClaimOutcome,
        ClaimRejection,
        ClaimedAssignment,
        ClosedAssignment,
        CourierCandidate,
        DeliveryAssignment,
        HandoffCode,
        NewAssignment,
        NewUser,
        Order,
        OrderDraft,
        OrderId,
        Shop,
        ShopId,
        ShopOrderId,
        ShopOrderStatus,
        UserId,
        UserProfile,
    },
    traits::{
        AssignmentManagement,
        CatalogManagement,
        CourierIndex,
        FulfillmentDatabase,
        OrderManagement,
        StoreError,
        UserManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(draft, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_customer(customer_id, &mut conn).await
    }

    async fn fetch_orders_for_owner(&self, owner_id: UserId) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_owner(owner_id, &mut conn).await
    }

    async fn update_shop_order_status(
        &self,
        shop_order_id: ShopOrderId,
        from: ShopOrderStatus,
        to: ShopOrderStatus,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_shop_order_status(shop_order_id, from, to, &mut conn).await
    }

    async fn cancel_shop_order(
        &self,
        shop_order_id: ShopOrderId,
        from: ShopOrderStatus,
        reason: &str,
    ) -> Result<Option<CancelledShopOrder>, StoreError> {
        let mut tx = self.pool.begin().await?;
        if !orders::cancel_shop_order(shop_order_id, from, &mut tx).await? {
            tx.rollback().await?;
            debug!("🗃️ Shop order #{shop_order_id} was no longer {from}. Cancellation not applied");
            return Ok(None);
        }
        let shop_order =
            orders::fetch_shop_order(shop_order_id, &mut tx).await?.ok_or(StoreError::ShopOrderNotFound(shop_order_id))?;
        let mut closed_assignment = None;
        if let Some(assignment_id) = shop_order.assignment_id {
            let previous = assignments::fetch_assignment(assignment_id, &mut tx).await?;
            if let Some(previous) = previous {
                if assignments::cancel_open(assignment_id, reason, &mut tx).await? {
                    assignments::clear_broadcast_set(assignment_id, &mut tx).await?;
                    let assignment = assignments::fetch_assignment(assignment_id, &mut tx)
                        .await?
                        .ok_or(StoreError::AssignmentNotFound(assignment_id))?;
                    debug!("🗃️ Assignment #{assignment_id} cancelled along with shop order #{shop_order_id}");
                    closed_assignment = Some(ClosedAssignment {
                        assignment,
                        previous_broadcast: previous.broadcasted_to,
                        previous_courier: previous.assigned_to,
                    });
                }
            }
        }
        tx.commit().await?;
        Ok(Some(CancelledShopOrder { shop_order_id, closed_assignment }))
    }

    async fn fetch_undispatched_shop_orders(&self) -> Result<Vec<(OrderId, ShopOrderId)>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_undispatched_shop_orders(&mut conn).await
    }
}

impl AssignmentManagement for SqliteDatabase {
    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Option<DeliveryAssignment>, StoreError> {
        let shop_order_id = assignment.shop_order_id;
        let mut tx = self.pool.begin().await?;
        let assignment = assignments::insert_assignment(assignment, &mut tx).await?;
        if !orders::link_assignment(shop_order_id, assignment.id, &mut tx).await? {
            tx.rollback().await?;
            debug!("🗃️ Shop order #{shop_order_id} is no longer awaiting a courier. Discarding the new assignment");
            return Ok(None);
        }
        tx.commit().await?;
        Ok(Some(assignment))
    }

    async fn fetch_assignment(&self, id: AssignmentId) -> Result<Option<DeliveryAssignment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        assignments::fetch_assignment(id, &mut conn).await
    }

    async fn claim_assignment(&self, id: AssignmentId, courier_id: UserId) -> Result<ClaimOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        if !assignments::claim(id, courier_id, &mut tx).await? {
            tx.rollback().await?;
            let mut conn = self.pool.acquire().await?;
            let rejection = match assignments::fetch_assignment(id, &mut conn).await? {
                None => ClaimRejection::NotFound,
                Some(a) if a.status != AssignmentStatus::Broadcasted => ClaimRejection::NotBroadcasted(a.status),
                Some(a) if !a.broadcasted_to.contains(&courier_id) => ClaimRejection::NotOffered,
                Some(_) => ClaimRejection::CourierBusy,
            };
            debug!("🗃️ Courier #{courier_id} could not claim assignment #{id}: {rejection:?}");
            return Ok(ClaimOutcome::Rejected(rejection));
        }
        let previous_broadcast = assignments::fetch_broadcast_set(id, &mut tx).await?;
        assignments::clear_broadcast_set(id, &mut tx).await?;
        let assignment =
            assignments::fetch_assignment(id, &mut tx).await?.ok_or(StoreError::AssignmentNotFound(id))?;
        orders::set_assigned_courier(assignment.shop_order_id, courier_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Assignment #{id} claimed by courier #{courier_id}");
        Ok(ClaimOutcome::Claimed(ClaimedAssignment { assignment, previous_broadcast }))
    }

    async fn fetch_broadcasts_for_courier(&self, courier_id: UserId) -> Result<Vec<DeliveryAssignment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        assignments::fetch_broadcasts_for_courier(courier_id, &mut conn).await
    }

    async fn fetch_active_assignment_for_courier(
        &self,
        courier_id: UserId,
    ) -> Result<Option<DeliveryAssignment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        assignments::fetch_active_for_courier(courier_id, &mut conn).await
    }

    async fn complete_assignment(
        &self,
        id: AssignmentId,
        courier_id: UserId,
    ) -> Result<Option<DeliveryAssignment>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(assignment) = assignments::complete(id, courier_id, &mut tx).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        if !orders::mark_delivered(assignment.shop_order_id, &mut tx).await? {
            tx.rollback().await?;
            debug!("🗃️ Shop order #{} is not out for delivery. Assignment #{id} left unchanged", assignment.shop_order_id);
            return Ok(None);
        }
        users::clear_handoff_code_for_assignment(id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Assignment #{id} completed. Shop order #{} delivered", assignment.shop_order_id);
        Ok(Some(assignment))
    }

    async fn expire_broadcasts(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<ClosedAssignment>, StoreError> {
        let stale = {
            let mut conn = self.pool.acquire().await?;
            assignments::fetch_by_status(AssignmentStatus::Broadcasted, &mut conn)
                .await?
                .into_iter()
                .filter(|a| a.created_at < cutoff)
                .collect::<Vec<_>>()
        };
        let mut result = Vec::with_capacity(stale.len());
        for candidate in stale {
            let mut tx = self.pool.begin().await?;
            if !assignments::cancel_broadcast(candidate.id, reason, &mut tx).await? {
                // accepted in the meantime
                tx.rollback().await?;
                continue;
            }
            let previous_broadcast = assignments::fetch_broadcast_set(candidate.id, &mut tx).await?;
            assignments::clear_broadcast_set(candidate.id, &mut tx).await?;
            orders::unlink_assignment(candidate.shop_order_id, candidate.id, &mut tx).await?;
            let assignment = assignments::fetch_assignment(candidate.id, &mut tx)
                .await?
                .ok_or(StoreError::AssignmentNotFound(candidate.id))?;
            tx.commit().await?;
            debug!("🗃️ Broadcast for assignment #{} expired", candidate.id);
            result.push(ClosedAssignment { assignment, previous_broadcast, previous_courier: None });
        }
        Ok(result)
    }
}

impl CourierIndex for SqliteDatabase {
    async fn couriers_within(&self, point: &GeoPoint, radius_m: f64) -> Result<Vec<CourierCandidate>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        couriers::couriers_within(point, radius_m, &mut conn).await
    }

    async fn busy_couriers(&self, courier_ids: &[UserId]) -> Result<Vec<UserId>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        couriers::busy_couriers(courier_ids, &mut conn).await
    }
}

impl UserManagement for SqliteDatabase {
    async fn upsert_user(&self, user: NewUser) -> Result<UserProfile, StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::upsert_user(user, &mut conn).await
    }

    async fn fetch_user(&self, id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(id, &mut conn).await
    }

    async fn update_location(&self, id: UserId, location: GeoPoint, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::update_location(id, location, at, &mut conn).await
    }

    async fn set_handoff_code(&self, id: UserId, code: HandoffCode) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::set_handoff_code(id, code, &mut conn).await
    }

    async fn fetch_handoff_code(&self, id: UserId) -> Result<Option<HandoffCode>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_handoff_code(id, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn upsert_shop(&self, shop: Shop) -> Result<Shop, StoreError> {
        let mut conn = self.pool.acquire().await?;
        shops::upsert_shop(shop, &mut conn).await
    }

    async fn fetch_shop(&self, id: ShopId) -> Result<Option<Shop>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        shops::fetch_shop(id, &mut conn).await
    }

    async fn fetch_shops(&self, ids: &[ShopId]) -> Result<Vec<Shop>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        shops::fetch_shops(ids, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
