use std::time::Duration;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use dispatch_engine::{db_types::Role, SqliteDatabase};

use super::helpers::*;
use crate::{auth::TokenVerifier, server::api_scope};

fn subscribe(session_id: &str, order_id: &serde_json::Value) -> TestRequest {
    TestRequest::post().uri(&format!("/api/events/{session_id}/orders/{order_id}"))
}

#[actix_web::test]
async fn parties_can_follow_an_order() {
    let server = TestServer::new().await;
    let order = server.place_order().await;
    let (session_id, mut rx) = server.hub.connect(CUSTOMER, Role::Customer);
    let opened = rx.recv().await.unwrap();
    assert!(String::from_utf8_lossy(&opened).starts_with("event: session\n"));

    let (status, body) = server.call(subscribe(&session_id, &order["id"]).insert_header(bearer(CUSTOMER, Role::Customer))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let (status, _) = server.set_status(&order, "preparing").await;
    assert_eq!(status, StatusCode::OK);
    let frame = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let frame = rx.recv().await.expect("Session closed");
            let text = String::from_utf8_lossy(&frame).into_owned();
            if text.starts_with("event: order:status\n") {
                return text;
            }
        }
    })
    .await
    .expect("No order status frame arrived");
    assert!(frame.contains("\"status\":\"preparing\""), "{frame}");

    let req = TestRequest::delete()
        .uri(&format!("/api/events/{session_id}/orders/{}", order["id"]))
        .insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    server.tear_down().await;
}

#[actix_web::test]
async fn strangers_cannot_follow_an_order() {
    let server = TestServer::new().await;
    let order = server.place_order().await;
    let (session_id, _rx) = server.hub.connect(OTHER_OWNER, Role::Owner);
    let req = subscribe(&session_id, &order["id"]).insert_header(bearer(OTHER_OWNER, Role::Owner));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    server.tear_down().await;
}

#[actix_web::test]
async fn sessions_belong_to_their_owner() {
    let server = TestServer::new().await;
    let order = server.place_order().await;
    let (session_id, _rx) = server.hub.connect(OWNER, Role::Owner);

    // The customer is a party to the order, but not to the owner's session
    let req = subscribe(&session_id, &order["id"]).insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = subscribe("no-such-session", &order["id"]).insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let req = TestRequest::delete()
        .uri(&format!("/api/events/no-such-session/orders/{}", order["id"]))
        .insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}

#[actix_web::test]
async fn event_stream_opens_a_session() {
    let server = TestServer::new().await;
    assert_eq!(server.hub.session_count(), 0);
    let req = TestRequest::get().uri("/api/events").insert_header(bearer(COURIER, Role::Courier));
    let app = App::new()
        .app_data(web::Data::new(server.hub.clone()))
        .service(api_scope::<SqliteDatabase>(TokenVerifier::new(&get_auth_config())));
    let app = test::init_service(app).await;
    let res = test::call_service(&app, req.to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res.headers().get("content-type").and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert_eq!(content_type, "text/event-stream");
    assert_eq!(server.hub.session_count(), 1);
    drop(res);
    server.tear_down().await;
}
