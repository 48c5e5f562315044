#![allow(dead_code)]
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use dispatch_engine::{
    db_types::*,
    events::{Channel, EventHandlers, EventHooks, NotificationRequest, RealtimeEvent},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    DirectoryApi,
    DispatchApi,
    DispatchPolicy,
    FulfillmentDatabase,
    HandoffApi,
    OrderFlowApi,
    PricingPolicy,
    Publisher,
    SqliteDatabase,
    TrackingApi,
};
use futures_util::FutureExt;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const CUSTOMER: UserId = UserId(1);
pub const OWNER: UserId = UserId(10);
pub const OTHER_OWNER: UserId = UserId(20);
pub const SPICE_ROUTE: ShopId = ShopId(100);
pub const GREEN_BOWL: ShopId = ShopId(200);

/// The delivery point used by every test order
pub const HOME: (f64, f64) = (19.0760, 72.8777);

/// Roughly 1.1 km of latitude
pub const KM: f64 = 0.009;

/// A throwaway database with the engine wired to capturing event hooks.
pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub publisher: Publisher,
    pub policy: DispatchPolicy,
    pub realtime: Arc<Mutex<Vec<RealtimeEvent>>>,
    pub mail: Arc<Mutex<Vec<NotificationRequest>>>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_policy(DispatchPolicy::default()).await
    }

    pub async fn with_policy(policy: DispatchPolicy) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let realtime = Arc::new(Mutex::new(Vec::new()));
        let mail = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = EventHooks::default();
        let sink = realtime.clone();
        hooks.on_realtime(move |ev| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(ev);
            }
            .boxed()
        });
        let outbox = mail.clone();
        hooks.on_notification(move |req| {
            let outbox = outbox.clone();
            async move {
                outbox.lock().unwrap().push(req);
            }
            .boxed()
        });
        let handlers = EventHandlers::new(64, hooks);
        let publisher = Publisher::new(handlers.producers());
        handlers.start_handlers().await;
        let system = Self { url, db, publisher, policy, realtime, mail };
        system.seed().await;
        system
    }

    pub fn order_flow(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), self.publisher.clone(), PricingPolicy::default(), self.policy)
    }

    pub fn dispatcher(&self) -> DispatchApi<SqliteDatabase> {
        DispatchApi::new(self.db.clone(), self.publisher.clone(), self.policy)
    }

    pub fn handoff(&self) -> HandoffApi<SqliteDatabase> {
        HandoffApi::new(self.db.clone(), self.publisher.clone(), self.policy.handoff_code_ttl)
    }

    pub fn tracking(&self) -> TrackingApi<SqliteDatabase> {
        TrackingApi::new(self.db.clone(), self.publisher.clone())
    }

    pub fn directory(&self) -> DirectoryApi<SqliteDatabase> {
        DirectoryApi::new(self.db.clone())
    }

    async fn seed(&self) {
        let dir = self.directory();
        let users = [
            NewUser::new(CUSTOMER, "Asha Rao", "asha@example.com", Role::Customer),
            NewUser::new(OWNER, "Vikram Shah", "vikram@example.com", Role::Owner),
            NewUser::new(OTHER_OWNER, "Meera Iyer", "meera@example.com", Role::Owner),
        ];
        for user in users {
            dir.upsert_user(user).await.expect("Error adding user");
        }
        let shops = [
            Shop { id: SPICE_ROUTE, name: "Spice Route".into(), owner_id: OWNER, address: Some("Bandra".into()) },
            Shop { id: GREEN_BOWL, name: "Green Bowl".into(), owner_id: OTHER_OWNER, address: None },
        ];
        for shop in shops {
            dir.upsert_shop(shop).await.expect("Error adding shop");
        }
    }

    /// Adds a courier `km_north` kilometres (approximately) north of the delivery point.
    pub async fn add_courier(&self, id: i64, km_north: f64) -> UserId {
        let id = UserId(id);
        let user = NewUser::new(id, format!("Courier {id}"), format!("courier{id}@example.com"), Role::Courier)
            .with_mobile("9800000000");
        self.directory().upsert_user(user).await.expect("Error adding courier");
        self.tracking()
            .update_location(id, HOME.0 + km_north * KM, HOME.1)
            .await
            .expect("Error setting courier location");
        id
    }

    pub fn cart_line(shop_id: ShopId, item: &str, rupees: i64, quantity: i64) -> CartLine {
        CartLine {
            item_id: format!("item-{item}"),
            shop_id,
            name: item.to_string(),
            price: Paise::from_rupees(rupees),
            quantity,
            image: String::new(),
            food_type: FoodType::Veg,
        }
    }

    pub fn home() -> DeliveryAddress {
        DeliveryAddress { text: "14 Hill Road, Bandra".into(), latitude: HOME.0, longitude: HOME.1 }
    }

    /// A cash-on-delivery order from the customer with two items from Spice Route.
    pub async fn place_simple_order(&self) -> Order {
        let order = NewOrder::new(PaymentMethod::Cod, Self::home())
            .with_line(Self::cart_line(SPICE_ROUTE, "paneer-tikka", 220, 1))
            .with_line(Self::cart_line(SPICE_ROUTE, "butter-naan", 40, 2));
        self.order_flow().place_order(CUSTOMER, order).await.expect("Error placing order")
    }

    /// Places a simple order and moves its only sub-order to out-for-delivery.
    pub async fn order_out_for_delivery(&self) -> (Order, Option<DeliveryAssignment>) {
        let order = self.place_simple_order().await;
        let so = order.shop_orders[0].id;
        let update = self
            .order_flow()
            .update_shop_order_status(OWNER, order.id, so, ShopOrderStatus::OutForDelivery)
            .await
            .expect("Error updating status");
        (order, update.dispatch.and_then(|d| d.assignment))
    }

    pub fn events_on(&self, channel: Channel) -> Vec<RealtimeEvent> {
        self.realtime.lock().unwrap().iter().filter(|e| e.channel == channel).cloned().collect()
    }

    /// Waits up to two seconds for an event with the given name on the channel.
    pub async fn wait_for_event(&self, channel: Channel, name: &str) -> bool {
        for _ in 0..40 {
            if self.events_on(channel).iter().any(|e| e.event_name() == name) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    /// Waits up to two seconds for a handoff code to be mailed to the receiver and returns the latest one.
    pub async fn wait_for_code(&self, receiver: &str) -> Option<String> {
        for _ in 0..40 {
            let code = self
                .mail
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|m| m.receiver == receiver && m.payload.get("otp").is_some())
                .and_then(|m| m.payload["otp"].as_str().map(String::from));
            if code.is_some() {
                return code;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        None
    }

    pub async fn assignment_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM delivery_assignments").fetch_one(self.db.pool()).await.unwrap()
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.url);
        }
    }
}
