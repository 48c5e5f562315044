use log::debug;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{Shop, ShopId, UserId},
    traits::StoreError,
};

#[derive(Debug, Clone, FromRow)]
struct ShopRow {
    id: ShopId,
    name: String,
    owner_id: UserId,
    address: Option<String>,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Shop { id: row.id, name: row.name, owner_id: row.owner_id, address: row.address }
    }
}

pub async fn upsert_shop(shop: Shop, conn: &mut SqliteConnection) -> Result<Shop, StoreError> {
    let row: ShopRow = sqlx::query_as(
        r#"
            INSERT INTO shops (id, name, owner_id, address) VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                owner_id = excluded.owner_id,
                address = excluded.address,
                updated_at = CURRENT_TIMESTAMP
            RETURNING id, name, owner_id, address;
        "#,
    )
    .bind(shop.id)
    .bind(&shop.name)
    .bind(shop.owner_id)
    .bind(&shop.address)
    .fetch_one(&mut *conn)
    .await?;
    debug!("🗃️ Shop #{} ({}) saved", row.id, row.name);
    Ok(row.into())
}

pub async fn fetch_shop(id: ShopId, conn: &mut SqliteConnection) -> Result<Option<Shop>, StoreError> {
    let row: Option<ShopRow> = sqlx::query_as("SELECT id, name, owner_id, address FROM shops WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(Shop::from))
}

pub async fn fetch_shops(ids: &[ShopId], conn: &mut SqliteConnection) -> Result<Vec<Shop>, StoreError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, name, owner_id, address FROM shops WHERE id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(") ORDER BY id ASC");
    let rows: Vec<ShopRow> = builder.build_query_as().fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(Shop::from).collect())
}
