use dispatch_common::GeoPoint;
use log::trace;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{AssignmentStatus, CourierCandidate, Role, UserId},
    traits::StoreError,
};

#[derive(Debug, Clone, FromRow)]
struct CourierRow {
    id: UserId,
    full_name: String,
    email: String,
    mobile: Option<String>,
    latitude: f64,
    longitude: f64,
}

/// Couriers within `radius_m` metres of `point`, nearest first.
///
/// The bounding box narrows the scan to the index; the exact great-circle distance decides membership.
pub async fn couriers_within(
    point: &GeoPoint,
    radius_m: f64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CourierCandidate>, StoreError> {
    let bbox = point.bounding_box(radius_m);
    let rows: Vec<CourierRow> = sqlx::query_as(
        r#"
            SELECT id, full_name, email, mobile, latitude, longitude FROM users
            WHERE role = $1
              AND latitude IS NOT NULL AND longitude IS NOT NULL
              AND latitude BETWEEN $2 AND $3
              AND longitude BETWEEN $4 AND $5
        "#,
    )
    .bind(Role::Courier)
    .bind(bbox.min_latitude)
    .bind(bbox.max_latitude)
    .bind(bbox.min_longitude)
    .bind(bbox.max_longitude)
    .fetch_all(&mut *conn)
    .await?;
    trace!("🗃️ {} couriers inside the {radius_m:.0}m box around {point:?}", rows.len());
    let mut candidates = rows
        .into_iter()
        .filter_map(|row| {
            let location = GeoPoint::new(row.latitude, row.longitude).ok()?;
            let distance_m = point.distance_to(&location);
            (distance_m <= radius_m).then_some(CourierCandidate {
                id: row.id,
                full_name: row.full_name,
                email: row.email,
                mobile: row.mobile,
                location,
                distance_m,
            })
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m).then(a.id.cmp(&b.id)));
    Ok(candidates)
}

/// The subset of `courier_ids` holding an active assignment
pub async fn busy_couriers(courier_ids: &[UserId], conn: &mut SqliteConnection) -> Result<Vec<UserId>, StoreError> {
    if courier_ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT DISTINCT assigned_to FROM delivery_assignments WHERE status IN (");
    let mut statuses = builder.separated(", ");
    for status in AssignmentStatus::ACTIVE {
        statuses.push_bind(status);
    }
    statuses.push_unseparated(") AND assigned_to IN (");
    let mut ids = builder.separated(", ");
    for id in courier_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    let busy: Vec<UserId> = builder.build_query_scalar().fetch_all(&mut *conn).await?;
    Ok(busy)
}
