use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{
        AssignmentId,
        DeliveryAddress,
        FoodType,
        Order,
        OrderDraft,
        OrderId,
        Paise,
        PaymentMethod,
        PaymentStatus,
        ShopId,
        ShopOrder,
        ShopOrderId,
        ShopOrderItem,
        ShopOrderStatus,
        UserId,
    },
    traits::StoreError,
};

#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: UserId,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment: Option<String>,
    address_text: String,
    latitude: f64,
    longitude: f64,
    items_total: Paise,
    delivery_fee: Paise,
    total_amount: Paise,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, shop_orders: Vec<ShopOrder>) -> Result<Order, StoreError> {
        let payment = self.payment.as_deref().map(serde_json::from_str).transpose()?;
        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            payment,
            delivery_address: DeliveryAddress {
                text: self.address_text,
                latitude: self.latitude,
                longitude: self.longitude,
            },
            items_total: self.items_total,
            delivery_fee: self.delivery_fee,
            total_amount: self.total_amount,
            created_at: self.created_at,
            updated_at: self.updated_at,
            shop_orders,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct ShopOrderRow {
    id: ShopOrderId,
    order_id: OrderId,
    shop_id: ShopId,
    shop_name: String,
    owner_id: UserId,
    subtotal: Paise,
    status: ShopOrderStatus,
    assignment_id: Option<AssignmentId>,
    assigned_courier_id: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShopOrderRow {
    fn into_shop_order(self, items: Vec<ShopOrderItem>) -> ShopOrder {
        ShopOrder {
            id: self.id,
            order_id: self.order_id,
            shop_id: self.shop_id,
            shop_name: self.shop_name,
            owner_id: self.owner_id,
            subtotal: self.subtotal,
            items,
            status: self.status,
            assignment_id: self.assignment_id,
            assigned_courier_id: self.assigned_courier_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct ItemRow {
    shop_order_id: ShopOrderId,
    item_id: String,
    name: String,
    price: Paise,
    image: String,
    quantity: i64,
    food_type: FoodType,
}

impl From<ItemRow> for ShopOrderItem {
    fn from(row: ItemRow) -> Self {
        ShopOrderItem {
            item_id: row.item_id,
            name: row.name,
            price: row.price,
            image: row.image,
            quantity: row.quantity,
            food_type: row.food_type,
        }
    }
}

/// Inserts the order, its sub-orders and their items. This is not atomic. Embed the call inside a transaction and
/// pass `&mut *tx` as the connection argument.
pub async fn insert_order(draft: OrderDraft, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let now = Utc::now();
    let payment = draft.payment.as_ref().map(serde_json::to_string).transpose()?;
    let row: OrderRow = sqlx::query_as(
        r#"
            INSERT INTO orders (
                customer_id,
                payment_method,
                payment_status,
                payment,
                address_text,
                latitude,
                longitude,
                items_total,
                delivery_fee,
                total_amount,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *;
        "#,
    )
    .bind(draft.customer_id)
    .bind(draft.payment_method)
    .bind(draft.payment_status)
    .bind(payment)
    .bind(&draft.delivery_address.text)
    .bind(draft.delivery_address.latitude)
    .bind(draft.delivery_address.longitude)
    .bind(draft.items_total)
    .bind(draft.delivery_fee)
    .bind(draft.total_amount)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    let order_id = row.id;
    let mut shop_orders = Vec::with_capacity(draft.shop_orders.len());
    for so in draft.shop_orders {
        let so_row: ShopOrderRow = sqlx::query_as(
            r#"
                INSERT INTO shop_orders (order_id, shop_id, shop_name, owner_id, subtotal, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *;
            "#,
        )
        .bind(order_id)
        .bind(so.shop_id)
        .bind(&so.shop_name)
        .bind(so.owner_id)
        .bind(so.subtotal)
        .bind(ShopOrderStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        for (position, item) in so.items.iter().enumerate() {
            sqlx::query(
                r#"
                    INSERT INTO shop_order_items (shop_order_id, position, item_id, name, price, image, quantity, food_type)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
                "#,
            )
            .bind(so_row.id)
            .bind(position as i64)
            .bind(&item.item_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(&item.image)
            .bind(item.quantity)
            .bind(item.food_type)
            .execute(&mut *conn)
            .await?;
        }
        trace!("🗃️ Shop order #{} for shop {} inserted with {} items", so_row.id, so.shop_id, so.items.len());
        shop_orders.push(so_row.into_shop_order(so.items));
    }
    debug!("🗃️ Order #{order_id} inserted with {} shop orders", shop_orders.len());
    row.into_order(shop_orders)
}

pub async fn fetch_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StoreError> {
    let row: Option<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(hydrate_orders(vec![row], conn).await?.pop()),
        None => Ok(None),
    }
}

/// Orders placed by the customer, newest first
pub async fn fetch_orders_for_customer(
    customer_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, StoreError> {
    let rows: Vec<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY id DESC")
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;
    hydrate_orders(rows, conn).await
}

/// Orders with at least one sub-order belonging to the owner, newest first
pub async fn fetch_orders_for_owner(owner_id: UserId, conn: &mut SqliteConnection) -> Result<Vec<Order>, StoreError> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE id IN (SELECT order_id FROM shop_orders WHERE owner_id = $1)
            ORDER BY id DESC
        "#,
    )
    .bind(owner_id)
    .fetch_all(&mut *conn)
    .await?;
    hydrate_orders(rows, conn).await
}

pub async fn fetch_shop_order(
    shop_order_id: ShopOrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopOrder>, StoreError> {
    let row: Option<ShopOrderRow> = sqlx::query_as("SELECT * FROM shop_orders WHERE id = $1")
        .bind(shop_order_id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => {
            let mut items = fetch_items(&[row.id], conn).await?;
            let items = items.remove(&row.id).unwrap_or_default();
            Ok(Some(row.into_shop_order(items)))
        },
        None => Ok(None),
    }
}

/// Moves a sub-order between statuses, provided nobody has moved it since the caller read `from`.
pub async fn update_shop_order_status(
    shop_order_id: ShopOrderId,
    from: ShopOrderStatus,
    to: ShopOrderStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let applied = sqlx::query("UPDATE shop_orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4")
        .bind(to)
        .bind(Utc::now())
        .bind(shop_order_id)
        .bind(from)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(applied == 1)
}

/// Like [`update_shop_order_status`], but also releases any courier recorded on the sub-order.
pub async fn cancel_shop_order(
    shop_order_id: ShopOrderId,
    from: ShopOrderStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let applied = sqlx::query(
        r#"
            UPDATE shop_orders SET status = $1, assigned_courier_id = NULL, updated_at = $2
            WHERE id = $3 AND status = $4
        "#,
    )
    .bind(ShopOrderStatus::Cancelled)
    .bind(Utc::now())
    .bind(shop_order_id)
    .bind(from)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(applied == 1)
}

/// Links the assignment to the sub-order if, and only if, the sub-order is still `out-for-delivery` and has no
/// assignment yet.
pub async fn link_assignment(
    shop_order_id: ShopOrderId,
    assignment_id: AssignmentId,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let applied = sqlx::query(
        r#"
            UPDATE shop_orders SET assignment_id = $1, updated_at = $2
            WHERE id = $3 AND assignment_id IS NULL AND status = $4
        "#,
    )
    .bind(assignment_id)
    .bind(Utc::now())
    .bind(shop_order_id)
    .bind(ShopOrderStatus::OutForDelivery)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(applied == 1)
}

pub async fn unlink_assignment(
    shop_order_id: ShopOrderId,
    assignment_id: AssignmentId,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let applied = sqlx::query(
        "UPDATE shop_orders SET assignment_id = NULL, updated_at = $1 WHERE id = $2 AND assignment_id = $3",
    )
    .bind(Utc::now())
    .bind(shop_order_id)
    .bind(assignment_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(applied == 1)
}

pub async fn set_assigned_courier(
    shop_order_id: ShopOrderId,
    courier_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE shop_orders SET assigned_courier_id = $1, updated_at = $2 WHERE id = $3")
        .bind(courier_id)
        .bind(Utc::now())
        .bind(shop_order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Marks an `out-for-delivery` sub-order delivered and clears its courier. Returns `false` if the sub-order was in
/// any other state.
pub async fn mark_delivered(shop_order_id: ShopOrderId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let applied = sqlx::query(
        r#"
            UPDATE shop_orders SET status = $1, assigned_courier_id = NULL, updated_at = $2
            WHERE id = $3 AND status = $4
        "#,
    )
    .bind(ShopOrderStatus::Delivered)
    .bind(Utc::now())
    .bind(shop_order_id)
    .bind(ShopOrderStatus::OutForDelivery)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(applied == 1)
}

pub async fn fetch_undispatched_shop_orders(
    conn: &mut SqliteConnection,
) -> Result<Vec<(OrderId, ShopOrderId)>, StoreError> {
    let rows: Vec<(OrderId, ShopOrderId)> = sqlx::query_as(
        "SELECT order_id, id FROM shop_orders WHERE status = $1 AND assignment_id IS NULL ORDER BY id ASC",
    )
    .bind(ShopOrderStatus::OutForDelivery)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Loads the sub-orders and items for a batch of order rows, preserving the row order.
async fn hydrate_orders(rows: Vec<OrderRow>, conn: &mut SqliteConnection) -> Result<Vec<Order>, StoreError> {
    if rows.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM shop_orders WHERE order_id IN (");
    let mut ids = builder.separated(", ");
    for row in &rows {
        ids.push_bind(row.id);
    }
    ids.push_unseparated(") ORDER BY id ASC");
    let so_rows: Vec<ShopOrderRow> = builder.build_query_as().fetch_all(&mut *conn).await?;
    let so_ids = so_rows.iter().map(|r| r.id).collect::<Vec<_>>();
    let mut items = fetch_items(&so_ids, conn).await?;
    let mut by_order: HashMap<OrderId, Vec<ShopOrder>> = HashMap::new();
    for so in so_rows {
        let so_items = items.remove(&so.id).unwrap_or_default();
        by_order.entry(so.order_id).or_default().push(so.into_shop_order(so_items));
    }
    rows.into_iter()
        .map(|row| {
            let shop_orders = by_order.remove(&row.id).unwrap_or_default();
            row.into_order(shop_orders)
        })
        .collect()
}

async fn fetch_items(
    shop_order_ids: &[ShopOrderId],
    conn: &mut SqliteConnection,
) -> Result<HashMap<ShopOrderId, Vec<ShopOrderItem>>, StoreError> {
    let mut result: HashMap<ShopOrderId, Vec<ShopOrderItem>> = HashMap::new();
    if shop_order_ids.is_empty() {
        return Ok(result);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM shop_order_items WHERE shop_order_id IN (");
    let mut ids = builder.separated(", ");
    for id in shop_order_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY shop_order_id ASC, position ASC");
    let rows: Vec<ItemRow> = builder.build_query_as().fetch_all(&mut *conn).await?;
    for row in rows {
        result.entry(row.shop_order_id).or_default().push(row.into());
    }
    Ok(result)
}
