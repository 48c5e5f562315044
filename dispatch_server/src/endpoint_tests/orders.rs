use actix_web::{http::StatusCode, test::TestRequest};
use dispatch_engine::db_types::Role;
use serde_json::json;

use super::helpers::*;

#[actix_web::test]
async fn place_order_prices_the_cart() {
    let server = TestServer::new().await;
    let order = server.place_order().await;
    assert_eq!(order["itemsTotal"], 30_000);
    assert_eq!(order["deliveryFee"], 5_000);
    assert_eq!(order["totalAmount"], 35_000);
    assert_eq!(order["paymentStatus"], "pending");
    let shop_orders = order["shopOrders"].as_array().unwrap();
    assert_eq!(shop_orders.len(), 1);
    assert_eq!(shop_orders[0]["shopName"], "Spice Route");
    assert_eq!(shop_orders[0]["status"], "pending");
    server.tear_down().await;
}

#[actix_web::test]
async fn malformed_order_body_is_a_bad_request() {
    let server = TestServer::new().await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(CUSTOMER, Role::Customer))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{ \"items\": ");
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    server.tear_down().await;
}

#[actix_web::test]
async fn empty_cart_is_rejected() {
    let server = TestServer::new().await;
    let req = TestRequest::post().uri("/api/orders").insert_header(bearer(CUSTOMER, Role::Customer)).set_json(json!({
        "paymentMethod": "cod",
        "deliveryAddress": { "text": "14 Hill Road", "latitude": HOME.0, "longitude": HOME.1 },
        "items": []
    }));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Cart is empty");
    server.tear_down().await;
}

#[actix_web::test]
async fn customers_and_owners_see_their_orders() {
    let server = TestServer::new().await;
    let order = server.place_order().await;

    let req = TestRequest::get().uri("/api/orders/mine").insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], order["id"]);

    let req = TestRequest::get().uri("/api/orders/owner").insert_header(bearer(OWNER, Role::Owner));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], order["id"]);
    assert_eq!(body["data"][0]["customer"]["fullName"], "Asha Rao");

    let req = TestRequest::get().uri("/api/orders/owner").insert_header(bearer(OTHER_OWNER, Role::Owner));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    server.tear_down().await;
}

#[actix_web::test]
async fn only_parties_can_fetch_an_order() {
    let server = TestServer::new().await;
    let order = server.place_order().await;
    let uri = format!("/api/orders/{}", order["id"]);

    let (status, body) = server.call(TestRequest::get().uri(&uri).insert_header(bearer(OWNER, Role::Owner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalAmount"], 35_000);

    let req = TestRequest::get().uri(&uri).insert_header(bearer(OTHER_OWNER, Role::Owner));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::get().uri("/api/orders/9999").insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let req = TestRequest::get().uri("/api/orders/not-a-number").insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.tear_down().await;
}

#[actix_web::test]
async fn owner_moves_an_order_forward_only() {
    let server = TestServer::new().await;
    let order = server.place_order().await;

    let (status, body) = server.set_status(&order, "preparing").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Order is being prepared");
    assert_eq!(body["data"]["shopOrder"]["status"], "preparing");

    let (status, body) = server.set_status(&order, "pending").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = server.set_status(&order, "delivered").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = server.set_status(&order, "shipped").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.tear_down().await;
}

#[actix_web::test]
async fn another_owner_cannot_update_status() {
    let server = TestServer::new().await;
    let order = server.place_order().await;
    let uri = format!("/api/orders/{}/shop-orders/{}/status", order["id"], order["shopOrders"][0]["id"]);
    let req =
        TestRequest::put().uri(&uri).insert_header(bearer(OTHER_OWNER, Role::Owner)).set_json(json!({ "status": "preparing" }));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    server.tear_down().await;
}

#[actix_web::test]
async fn owners_sync_their_shops() {
    let server = TestServer::new().await;
    let req = TestRequest::put()
        .uri("/api/shops/100")
        .insert_header(bearer(OWNER, Role::Owner))
        .set_json(json!({ "name": "Spice Route Express", "address": "Linking Road" }));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["name"], "Spice Route Express");

    let req =
        TestRequest::put().uri("/api/shops/100").insert_header(bearer(OTHER_OWNER, Role::Owner)).set_json(json!({ "name": "Mine now" }));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::put().uri("/api/shops/200").insert_header(bearer(OTHER_OWNER, Role::Owner)).set_json(json!({ "name": "Dosa Corner" }));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ownerId"], 20);
    server.tear_down().await;
}

#[actix_web::test]
async fn profile_role_comes_from_the_token() {
    let server = TestServer::new().await;
    let req = TestRequest::put()
        .uri("/api/profile")
        .insert_header(bearer(CUSTOMER, Role::Customer))
        .set_json(json!({ "fullName": "Asha R. Rao", "email": "asha@example.com", "mobile": "9820000000", "role": "owner" }));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["fullName"], "Asha R. Rao");
    assert_eq!(body["data"]["role"], "customer");
    server.tear_down().await;
}
