use actix_web::{cookie::Cookie, http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use dispatch_common::Secret;
use dispatch_engine::db_types::Role;

use super::helpers::*;
use crate::{
    auth::{issue_token, JwtClaims},
    config::AuthConfig,
};

#[actix_web::test]
async fn missing_token_is_rejected() {
    let server = TestServer::new().await;
    let (status, body) = server.call(TestRequest::get().uri("/api/orders/mine")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Authentication required");
    server.tear_down().await;
}

#[actix_web::test]
async fn malformed_token_is_rejected() {
    let server = TestServer::new().await;
    let req = TestRequest::get().uri("/api/orders/mine").insert_header(("Authorization", "Bearer made.up.nonsense"));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    server.tear_down().await;
}

#[actix_web::test]
async fn expired_token_is_rejected() {
    let server = TestServer::new().await;
    let claims = JwtClaims::new(CUSTOMER, Role::Customer, Utc::now() - Duration::hours(1));
    let token = issue_token(&get_auth_config(), &claims).unwrap();
    let req = TestRequest::get().uri("/api/orders/mine").insert_header(("Authorization", format!("Bearer {token}")));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    server.tear_down().await;
}

#[actix_web::test]
async fn token_signed_with_another_secret_is_rejected() {
    let server = TestServer::new().await;
    let foreign = AuthConfig { jwt_secret: Secret::new("somebody-elses-secret".to_string()) };
    let claims = JwtClaims::new(CUSTOMER, Role::Customer, Utc::now() + Duration::hours(1));
    let token = issue_token(&foreign, &claims).unwrap();
    let req = TestRequest::get().uri("/api/orders/mine").insert_header(("Authorization", format!("Bearer {token}")));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    server.tear_down().await;
}

#[actix_web::test]
async fn token_cookie_is_accepted() {
    let server = TestServer::new().await;
    let token = token_for(CUSTOMER, Role::Customer);
    let req = TestRequest::get().uri("/api/orders/mine").cookie(Cookie::new("token", token));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    server.tear_down().await;
}

#[actix_web::test]
async fn courier_cannot_place_orders() {
    let server = TestServer::new().await;
    let req = TestRequest::post().uri("/api/orders").insert_header(bearer(COURIER, Role::Courier)).set_json(
        serde_json::json!({ "paymentMethod": "cod", "items": [] }),
    );
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Insufficient permissions");
    server.tear_down().await;
}

#[actix_web::test]
async fn customer_cannot_list_owner_orders() {
    let server = TestServer::new().await;
    let req = TestRequest::get().uri("/api/orders/owner").insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    server.tear_down().await;
}
