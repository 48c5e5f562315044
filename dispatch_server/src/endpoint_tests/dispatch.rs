use actix_web::{http::StatusCode, test::TestRequest};
use dispatch_engine::db_types::Role;
use serde_json::{json, Value};

use super::helpers::*;

/// Takes a fresh order through to out-for-delivery and returns the order and the status update.
async fn out_for_delivery(server: &TestServer) -> (Value, Value) {
    let order = server.place_order().await;
    let (status, _) = server.set_status(&order, "preparing").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = server.set_status(&order, "out-for-delivery").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (order, body)
}

async fn accept_first_offer(server: &TestServer) -> Value {
    let req = TestRequest::get().uri("/api/assignments/broadcasts").insert_header(bearer(COURIER, Role::Courier));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    let assignment_id = body["data"][0]["assignmentId"].clone();
    let uri = format!("/api/assignments/{assignment_id}/accept");
    let (status, body) = server.call(TestRequest::post().uri(&uri).insert_header(bearer(COURIER, Role::Courier))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[actix_web::test]
async fn couriers_report_their_location() {
    let server = TestServer::new().await;
    let req = TestRequest::put()
        .uri("/api/location")
        .insert_header(bearer(COURIER, Role::Courier))
        .set_json(json!({ "lat": 19.08, "long": 72.88 }));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Location updated");
    assert_eq!(body["data"]["latitude"], 19.08);

    let req =
        TestRequest::put().uri("/api/location").insert_header(bearer(COURIER, Role::Courier)).set_json(json!({ "lat": 91.0, "long": 72.88 }));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.tear_down().await;
}

#[actix_web::test]
async fn out_for_delivery_broadcasts_to_nearby_couriers() {
    let server = TestServer::new().await;
    let (order, update) = out_for_delivery(&server).await;
    assert_eq!(update["message"], "Order sent to 1 nearby couriers");
    assert_eq!(update["data"]["dispatch"]["assignment"]["status"], "broadcasted");
    assert_eq!(update["data"]["dispatch"]["assignment"]["broadcastedTo"], json!([30]));

    let req = TestRequest::get().uri("/api/assignments/broadcasts").insert_header(bearer(COURIER, Role::Courier));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    let offers = body["data"].as_array().unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["orderId"], order["id"]);
    assert_eq!(offers[0]["shop"]["name"], "Spice Route");
    server.tear_down().await;
}

#[actix_web::test]
async fn accepting_an_offer_assigns_the_courier() {
    let server = TestServer::new().await;
    let (order, _) = out_for_delivery(&server).await;
    let accepted = accept_first_offer(&server).await;
    assert_eq!(accepted["message"], "Order accepted");
    assert_eq!(accepted["data"]["assignment"]["status"], "assigned");
    assert_eq!(accepted["data"]["shopOrder"]["assignedDeliveryBoy"], 30);

    let req = TestRequest::get().uri("/api/assignments/current").insert_header(bearer(COURIER, Role::Courier));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["orderId"], order["id"]);
    assert_eq!(body["data"]["customer"]["fullName"], "Asha Rao");

    // The offer is gone once taken
    let req = TestRequest::get().uri("/api/assignments/broadcasts").insert_header(bearer(COURIER, Role::Courier));
    let (_, body) = server.call(req).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    server.tear_down().await;
}

#[actix_web::test]
async fn courier_without_a_job_has_no_current_assignment() {
    let server = TestServer::new().await;
    let req = TestRequest::get().uri("/api/assignments/current").insert_header(bearer(COURIER, Role::Courier));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No active delivery assignment");

    let (status, _) =
        server.call(TestRequest::post().uri("/api/assignments/77/accept").insert_header(bearer(COURIER, Role::Courier))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}

#[actix_web::test]
async fn handoff_code_completes_the_delivery() {
    let server = TestServer::new().await;
    let (order, _) = out_for_delivery(&server).await;
    accept_first_offer(&server).await;

    let req = TestRequest::post().uri("/api/handoff/code").insert_header(bearer(COURIER, Role::Courier));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["orderId"], order["id"]);
    let code = server.wait_for_code("asha@example.com").await.expect("No handoff code was mailed");

    let req = TestRequest::post()
        .uri("/api/handoff/confirm")
        .insert_header(bearer(COURIER, Role::Courier))
        .set_json(json!({ "otp": "not-the-code" }));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid handoff code");

    let req =
        TestRequest::post().uri("/api/handoff/confirm").insert_header(bearer(COURIER, Role::Courier)).set_json(json!({ "otp": code }));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Order delivered");
    assert_eq!(body["data"]["shopOrder"]["status"], "delivered");
    assert_eq!(body["data"]["assignment"]["status"], "completed");

    let req = TestRequest::get().uri("/api/assignments/current").insert_header(bearer(COURIER, Role::Courier));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}

#[actix_web::test]
async fn customers_cannot_use_courier_routes() {
    let server = TestServer::new().await;
    let req = TestRequest::post().uri("/api/handoff/code").insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    server.tear_down().await;
}
