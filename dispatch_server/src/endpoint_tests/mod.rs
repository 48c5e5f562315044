mod auth;
mod couriers;
mod dispatch;
mod helpers;
mod mocks;
mod orders;
mod realtime;

use actix_web::{body::MessageBody, test, App};

use crate::routes::health;

#[actix_web::test]
async fn health_check() {
    let app = test::init_service(App::new().service(health)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body = resp.into_body().try_into_bytes().unwrap();
    assert_eq!(body, "👍️\n");
}
