use chrono::{DateTime, Utc};
use dispatch_common::GeoPoint;
use log::debug;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{AssignmentId, HandoffCode, NewUser, Role, UserId, UserProfile},
    traits::StoreError,
};

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: UserId,
    full_name: String,
    email: String,
    mobile: Option<String>,
    role: Role,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_updated_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        let location = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon).ok(),
            _ => None,
        };
        UserProfile {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            mobile: row.mobile,
            role: row.role,
            location,
            location_updated_at: row.location_updated_at,
        }
    }
}

pub async fn upsert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<UserProfile, StoreError> {
    let row: UserRow = sqlx::query_as(
        r#"
            INSERT INTO users (id, full_name, email, mobile, role, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                full_name = excluded.full_name,
                email = excluded.email,
                mobile = excluded.mobile,
                role = excluded.role,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(user.id)
    .bind(&user.full_name)
    .bind(&user.email)
    .bind(&user.mobile)
    .bind(user.role)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    debug!("🗃️ User #{} ({}) saved", row.id, row.role);
    Ok(row.into())
}

pub async fn fetch_user(id: UserId, conn: &mut SqliteConnection) -> Result<Option<UserProfile>, StoreError> {
    let row: Option<UserRow> =
        sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.map(UserProfile::from))
}

pub async fn update_location(
    id: UserId,
    location: GeoPoint,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let applied = sqlx::query("UPDATE users SET latitude = $1, longitude = $2, location_updated_at = $3 WHERE id = $4")
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(at)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(applied == 1)
}

pub async fn set_handoff_code(id: UserId, code: HandoffCode, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let applied = sqlx::query(
        "UPDATE users SET handoff_code = $1, handoff_expires_at = $2, handoff_assignment_id = $3 WHERE id = $4",
    )
    .bind(code.code)
    .bind(code.expires_at)
    .bind(code.assignment_id)
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if applied == 0 {
        return Err(StoreError::UserNotFound(id));
    }
    Ok(())
}

pub async fn fetch_handoff_code(id: UserId, conn: &mut SqliteConnection) -> Result<Option<HandoffCode>, StoreError> {
    let row: Option<(Option<String>, Option<DateTime<Utc>>, Option<AssignmentId>)> =
        sqlx::query_as("SELECT handoff_code, handoff_expires_at, handoff_assignment_id FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    let code = match row {
        Some((Some(code), Some(expires_at), Some(assignment_id))) => Some(HandoffCode { code, expires_at, assignment_id }),
        _ => None,
    };
    Ok(code)
}

/// Clears the handoff code issued for the assignment. A code since issued for another delivery to the same customer
/// is left alone.
pub async fn clear_handoff_code_for_assignment(
    assignment_id: AssignmentId,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
            UPDATE users SET handoff_code = NULL, handoff_expires_at = NULL, handoff_assignment_id = NULL
            WHERE handoff_assignment_id = $1
        "#,
    )
    .bind(assignment_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
