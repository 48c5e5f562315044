use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use chrono::Utc;
use dispatch_common::Secret;
use dispatch_engine::{
    db_types::*,
    events::{EventHandlers, EventHooks, NotificationRequest},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    CourierIndexApi,
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
use futures::FutureExt;
use log::*;
use serde_json::{json, Value};

use crate::{
    auth::{issue_token, JwtClaims, TokenVerifier},
    config::AuthConfig,
    realtime::RealtimeHub,
    routes::health,
    server::{api_scope, json_config, path_config, query_config},
};

pub const CUSTOMER: UserId = UserId(1);
pub const OWNER: UserId = UserId(10);
pub const OTHER_OWNER: UserId = UserId(20);
pub const COURIER: UserId = UserId(30);
pub const SPICE_ROUTE: ShopId = ShopId(100);
pub const HOME: (f64, f64) = (19.0760, 72.8777);

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("fds-endpoint-tests-2e1f0c9b7a".to_string()) }
}

pub fn token_for(user_id: UserId, role: Role) -> String {
    let claims = JwtClaims::new(user_id, role, Utc::now() + chrono::Duration::hours(1));
    issue_token(&get_auth_config(), &claims).expect("Failed to sign token")
}

pub fn bearer(user_id: UserId, role: Role) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token_for(user_id, role)))
}

/// Runs a request against a fresh app instance. Errors raised by middleware are rendered the same way the HTTP server
/// would render them.
pub async fn send<S, B>(service: &S, req: TestRequest) -> (StatusCode, Value)
where
    S: actix_web::dev::Service<actix_http::Request, Response = actix_web::dev::ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, bytes) = match test::try_call_service(service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            (status, test::read_body(res).await)
        },
        Err(e) => {
            let res = e.error_response();
            (res.status(), res.into_body().try_into_bytes().unwrap_or_default())
        },
    };
    let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()));
    debug!("🚀️ {status} {body}");
    (status, body)
}

/// A throwaway database with the full set of API objects and a live real-time hub.
pub struct TestServer {
    pub url: String,
    pub db: SqliteDatabase,
    pub publisher: Publisher,
    pub hub: RealtimeHub,
    pub mail: Arc<Mutex<Vec<NotificationRequest>>>,
    pub policy: DispatchPolicy,
}

impl TestServer {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let hub = RealtimeHub::new();
        let mail = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = EventHooks::default();
        let gateway = hub.clone();
        hooks.on_realtime(move |ev| {
            let gateway = gateway.clone();
            async move {
                gateway.publish(&ev);
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
        let server = Self { url, db, publisher, hub, mail, policy: DispatchPolicy::default() };
        server.seed().await;
        server
    }

    async fn seed(&self) {
        let dir = DirectoryApi::new(self.db.clone());
        let users = [
            NewUser::new(CUSTOMER, "Asha Rao", "asha@example.com", Role::Customer),
            NewUser::new(OWNER, "Vikram Shah", "vikram@example.com", Role::Owner),
            NewUser::new(OTHER_OWNER, "Meera Iyer", "meera@example.com", Role::Owner),
            NewUser::new(COURIER, "Ravi Kumar", "ravi@example.com", Role::Courier),
        ];
        for user in users {
            dir.upsert_user(user).await.expect("Error adding user");
        }
        let shop = Shop { id: SPICE_ROUTE, name: "Spice Route".into(), owner_id: OWNER, address: None };
        dir.upsert_shop(shop).await.expect("Error adding shop");
        TrackingApi::new(self.db.clone(), self.publisher.clone())
            .update_location(COURIER, HOME.0 + 0.009, HOME.1)
            .await
            .expect("Error placing courier");
    }

    /// Builds the app the way the server does, then runs one request against it.
    pub async fn call(&self, req: TestRequest) -> (StatusCode, Value) {
        let p = self.publisher.clone();
        let app = App::new()
            .app_data(web::Data::new(OrderFlowApi::new(
                self.db.clone(),
                p.clone(),
                PricingPolicy::default(),
                self.policy,
            )))
            .app_data(web::Data::new(DispatchApi::new(self.db.clone(), p.clone(), self.policy)))
            .app_data(web::Data::new(CourierIndexApi::new(self.db.clone(), self.policy)))
            .app_data(web::Data::new(HandoffApi::new(self.db.clone(), p.clone(), self.policy.handoff_code_ttl)))
            .app_data(web::Data::new(TrackingApi::new(self.db.clone(), p.clone())))
            .app_data(web::Data::new(DirectoryApi::new(self.db.clone())))
            .app_data(web::Data::new(self.hub.clone()))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .service(health)
            .service(api_scope::<SqliteDatabase>(TokenVerifier::new(&get_auth_config())));
        let service = test::init_service(app).await;
        send(&service, req).await
    }

    /// Places the standard two-item Spice Route order as the customer and returns the response data.
    pub async fn place_order(&self) -> Value {
        let req = TestRequest::post().uri("/api/orders").insert_header(bearer(CUSTOMER, Role::Customer)).set_json(json!({
            "paymentMethod": "cod",
            "deliveryAddress": { "text": "14 Hill Road, Bandra", "latitude": HOME.0, "longitude": HOME.1 },
            "items": [
                { "itemId": "item-1", "shopId": 100, "name": "Paneer tikka", "price": 22000, "quantity": 1, "image": "", "foodType": "veg" },
                { "itemId": "item-2", "shopId": 100, "name": "Butter naan", "price": 4000, "quantity": 2, "image": "", "foodType": "veg" }
            ]
        }));
        let (status, body) = self.call(req).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    pub async fn set_status(&self, order: &Value, status: &str) -> (StatusCode, Value) {
        let uri = format!("/api/orders/{}/shop-orders/{}/status", order["id"], order["shopOrders"][0]["id"]);
        let req = TestRequest::put().uri(&uri).insert_header(bearer(OWNER, Role::Owner)).set_json(json!({ "status": status }));
        self.call(req).await
    }

    /// Waits up to two seconds for a handoff code to be mailed to the receiver.
    pub async fn wait_for_code(&self, receiver: &str) -> Option<String> {
        for _ in 0..40 {
            let code = self
                .mail
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|m| m.receiver == receiver)
                .find_map(|m| m.payload["otp"].as_str().map(String::from));
            if code.is_some() {
                return code;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        None
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        let path = self.url.trim_start_matches("sqlite://");
        if let Err(e) = std::fs::remove_file(path) {
            warn!("🚀️ Could not remove test database {path}: {e}");
        }
    }
}
