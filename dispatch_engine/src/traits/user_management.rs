use chrono::{DateTime, Utc};
use dispatch_common::GeoPoint;

use crate::{
    db_types::{HandoffCode, NewUser, UserId, UserProfile},
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait UserManagement {
    /// Inserts the user, or refreshes name, email, mobile and role if the id is already known. Location and handoff
    /// state are left alone.
    async fn upsert_user(&self, user: NewUser) -> Result<UserProfile, StoreError>;

    async fn fetch_user(&self, id: UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Records the user's latest position. Returns `false` if the user is unknown.
    async fn update_location(&self, id: UserId, location: GeoPoint, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Stores a handoff code on the user record, replacing any outstanding one.
    async fn set_handoff_code(&self, id: UserId, code: HandoffCode) -> Result<(), StoreError>;

    async fn fetch_handoff_code(&self, id: UserId) -> Result<Option<HandoffCode>, StoreError>;
}
