use crate::{
    db_types::{Shop, ShopId},
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn upsert_shop(&self, shop: Shop) -> Result<Shop, StoreError>;

    async fn fetch_shop(&self, id: ShopId) -> Result<Option<Shop>, StoreError>;

    async fn fetch_shops(&self, ids: &[ShopId]) -> Result<Vec<Shop>, StoreError>;
}
