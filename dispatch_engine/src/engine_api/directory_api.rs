use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewUser, Shop, ShopId, UserId, UserProfile},
    engine_api::errors::FulfillmentError,
    traits::{CatalogManagement, UserManagement},
};

/// Keeps the engine's mirror of users and shops in step with the auth and catalog services that own them.
pub struct DirectoryApi<B> {
    db: B,
}

impl<B> Debug for DirectoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DirectoryApi")
    }
}

impl<B: Clone> Clone for DirectoryApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> DirectoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> DirectoryApi<B>
where B: UserManagement + CatalogManagement
{
    pub async fn upsert_user(&self, user: NewUser) -> Result<UserProfile, FulfillmentError> {
        if user.full_name.trim().is_empty() || user.email.trim().is_empty() {
            return Err(FulfillmentError::validation("Users need a name and an email address"));
        }
        let profile = self.db.upsert_user(user).await?;
        debug!("🗃️ User #{} ({}) synced", profile.id, profile.role);
        Ok(profile)
    }

    pub async fn fetch_user(&self, id: UserId) -> Result<UserProfile, FulfillmentError> {
        self.db.fetch_user(id).await?.ok_or_else(|| FulfillmentError::not_found(format!("User {id} not found")))
    }

    pub async fn upsert_shop(&self, shop: Shop) -> Result<Shop, FulfillmentError> {
        if shop.name.trim().is_empty() {
            return Err(FulfillmentError::validation("Shops need a name"));
        }
        let shop = self.db.upsert_shop(shop).await?;
        debug!("🗃️ Shop #{} ({}) synced", shop.id, shop.name);
        Ok(shop)
    }

    pub async fn fetch_shop(&self, id: ShopId) -> Result<Shop, FulfillmentError> {
        self.db.fetch_shop(id).await?.ok_or_else(|| FulfillmentError::not_found(format!("Shop {id} not found")))
    }
}
