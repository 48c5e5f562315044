use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{
        AssignmentId,
        AssignmentStatus,
        DeliveryAssignment,
        NewAssignment,
        OrderId,
        ShopId,
        ShopOrderId,
        UserId,
    },
    traits::StoreError,
};

#[derive(Debug, Clone, FromRow)]
struct AssignmentRow {
    id: AssignmentId,
    order_id: OrderId,
    shop_id: ShopId,
    shop_order_id: ShopOrderId,
    assigned_to: Option<UserId>,
    status: AssignmentStatus,
    accepted_at: Option<DateTime<Utc>>,
    picked_up_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssignmentRow {
    fn into_assignment(self, broadcasted_to: Vec<UserId>) -> DeliveryAssignment {
        DeliveryAssignment {
            id: self.id,
            order_id: self.order_id,
            shop_id: self.shop_id,
            shop_order_id: self.shop_order_id,
            broadcasted_to,
            assigned_to: self.assigned_to,
            status: self.status,
            accepted_at: self.accepted_at,
            picked_up_at: self.picked_up_at,
            delivered_at: self.delivered_at,
            completed_at: self.completed_at,
            cancel_reason: self.cancel_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Inserts a `broadcasted` assignment and its candidate set. Candidates keep the order they were given in.
pub async fn insert_assignment(
    assignment: NewAssignment,
    conn: &mut SqliteConnection,
) -> Result<DeliveryAssignment, StoreError> {
    let now = Utc::now();
    let row: AssignmentRow = sqlx::query_as(
        r#"
            INSERT INTO delivery_assignments (order_id, shop_id, shop_order_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(assignment.order_id)
    .bind(assignment.shop_id)
    .bind(assignment.shop_order_id)
    .bind(AssignmentStatus::Broadcasted)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    for (position, courier_id) in assignment.broadcast_to.iter().enumerate() {
        sqlx::query("INSERT INTO assignment_broadcasts (assignment_id, courier_id, position) VALUES ($1, $2, $3)")
            .bind(row.id)
            .bind(courier_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    debug!("🗃️ Assignment #{} broadcast to {} couriers", row.id, assignment.broadcast_to.len());
    Ok(row.into_assignment(assignment.broadcast_to))
}

pub async fn fetch_assignment(
    id: AssignmentId,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryAssignment>, StoreError> {
    let row: Option<AssignmentRow> = sqlx::query_as("SELECT * FROM delivery_assignments WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => {
            let broadcast = fetch_broadcast_set(row.id, conn).await?;
            Ok(Some(row.into_assignment(broadcast)))
        },
        None => Ok(None),
    }
}

/// The courier ids the assignment is currently offered to, nearest first
pub async fn fetch_broadcast_set(id: AssignmentId, conn: &mut SqliteConnection) -> Result<Vec<UserId>, StoreError> {
    let ids: Vec<UserId> =
        sqlx::query_scalar("SELECT courier_id FROM assignment_broadcasts WHERE assignment_id = $1 ORDER BY position")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(ids)
}

pub async fn clear_broadcast_set(id: AssignmentId, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let removed = sqlx::query("DELETE FROM assignment_broadcasts WHERE assignment_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    trace!("🗃️ Cleared {removed} broadcast entries for assignment #{id}");
    Ok(())
}

/// The deciding write of the accept race. Applies only while the assignment is still `broadcasted`, the courier is in
/// its candidate set, and the courier holds no other active assignment.
pub async fn claim(id: AssignmentId, courier_id: UserId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let now = Utc::now();
    let [a, b, c] = AssignmentStatus::ACTIVE;
    let applied = sqlx::query(
        r#"
            UPDATE delivery_assignments
            SET status = $1, assigned_to = $2, accepted_at = $3, updated_at = $4
            WHERE id = $5 AND status = $6
              AND EXISTS (SELECT 1 FROM assignment_broadcasts WHERE assignment_id = $7 AND courier_id = $8)
              AND NOT EXISTS (
                  SELECT 1 FROM delivery_assignments WHERE assigned_to = $9 AND status IN ($10, $11, $12)
              )
        "#,
    )
    .bind(AssignmentStatus::Assigned)
    .bind(courier_id)
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(AssignmentStatus::Broadcasted)
    .bind(id)
    .bind(courier_id)
    .bind(courier_id)
    .bind(a)
    .bind(b)
    .bind(c)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(applied == 1)
}

/// Completes an `assigned` assignment held by `courier_id` and releases the courier. Returns `None` if the assignment
/// is not in that state.
pub async fn complete(
    id: AssignmentId,
    courier_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryAssignment>, StoreError> {
    let now = Utc::now();
    let row: Option<AssignmentRow> = sqlx::query_as(
        r#"
            UPDATE delivery_assignments
            SET status = $1, assigned_to = NULL, delivered_at = $2, completed_at = $3, updated_at = $4
            WHERE id = $5 AND status = $6 AND assigned_to = $7
            RETURNING *;
        "#,
    )
    .bind(AssignmentStatus::Completed)
    .bind(now)
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(AssignmentStatus::Assigned)
    .bind(courier_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|r| r.into_assignment(vec![])))
}

/// Cancels the assignment if it has not finished yet. Any courier it was assigned to stays on record.
pub async fn cancel_open(id: AssignmentId, reason: &str, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let applied = sqlx::query(
        r#"
            UPDATE delivery_assignments SET status = $1, cancel_reason = $2, updated_at = $3
            WHERE id = $4 AND status NOT IN ($5, $6)
        "#,
    )
    .bind(AssignmentStatus::Cancelled)
    .bind(reason)
    .bind(Utc::now())
    .bind(id)
    .bind(AssignmentStatus::Completed)
    .bind(AssignmentStatus::Cancelled)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(applied == 1)
}

/// Cancels the assignment only if nobody has accepted it yet.
pub async fn cancel_broadcast(id: AssignmentId, reason: &str, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let applied = sqlx::query(
        "UPDATE delivery_assignments SET status = $1, cancel_reason = $2, updated_at = $3 WHERE id = $4 AND status = $5",
    )
    .bind(AssignmentStatus::Cancelled)
    .bind(reason)
    .bind(Utc::now())
    .bind(id)
    .bind(AssignmentStatus::Broadcasted)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(applied == 1)
}

/// Open offers that include the courier, oldest first
pub async fn fetch_broadcasts_for_courier(
    courier_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeliveryAssignment>, StoreError> {
    let rows: Vec<AssignmentRow> = sqlx::query_as(
        r#"
            SELECT a.* FROM delivery_assignments a
            JOIN assignment_broadcasts b ON b.assignment_id = a.id
            WHERE b.courier_id = $1 AND a.status = $2
            ORDER BY a.id ASC
        "#,
    )
    .bind(courier_id)
    .bind(AssignmentStatus::Broadcasted)
    .fetch_all(&mut *conn)
    .await?;
    with_broadcast_sets(rows, conn).await
}

pub async fn fetch_active_for_courier(
    courier_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryAssignment>, StoreError> {
    let [a, b, c] = AssignmentStatus::ACTIVE;
    let row: Option<AssignmentRow> = sqlx::query_as(
        r#"
            SELECT * FROM delivery_assignments
            WHERE assigned_to = $1 AND status IN ($2, $3, $4)
            ORDER BY id DESC
            LIMIT 1
        "#,
    )
    .bind(courier_id)
    .bind(a)
    .bind(b)
    .bind(c)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|r| r.into_assignment(vec![])))
}

pub async fn fetch_by_status(
    status: AssignmentStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeliveryAssignment>, StoreError> {
    let rows: Vec<AssignmentRow> =
        sqlx::query_as("SELECT * FROM delivery_assignments WHERE status = $1 ORDER BY id ASC")
            .bind(status)
            .fetch_all(&mut *conn)
            .await?;
    with_broadcast_sets(rows, conn).await
}

async fn with_broadcast_sets(
    rows: Vec<AssignmentRow>,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeliveryAssignment>, StoreError> {
    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let broadcast = fetch_broadcast_set(row.id, conn).await?;
        result.push(row.into_assignment(broadcast));
    }
    Ok(result)
}
