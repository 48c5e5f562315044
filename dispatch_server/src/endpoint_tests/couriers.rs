use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use dispatch_engine::{
    db_types::{CourierCandidate, GeoPoint, Role, UserId},
    CourierIndexApi,
    DispatchPolicy,
};

use super::{helpers::*, mocks::MockCourierIndex};
use crate::{
    auth::{JwtMiddlewareFactory, TokenVerifier},
    routes::CouriersNearbyRoute,
    server::query_config,
};

fn courier(id: i64, distance_m: f64) -> CourierCandidate {
    CourierCandidate {
        id: UserId(id),
        full_name: format!("Courier {id}"),
        email: format!("courier{id}@example.com"),
        mobile: None,
        location: GeoPoint { latitude: 19.07, longitude: 72.87 },
        distance_m,
    }
}

async fn nearby(index: MockCourierIndex, req: TestRequest) -> (StatusCode, serde_json::Value) {
    let _ = env_logger::try_init();
    let app = App::new()
        .app_data(web::Data::new(CourierIndexApi::new(index, DispatchPolicy::default())))
        .app_data(query_config())
        .service(
            web::scope("/api")
                .wrap(JwtMiddlewareFactory::new(TokenVerifier::new(&get_auth_config())))
                .service(CouriersNearbyRoute::<MockCourierIndex>::new()),
        );
    let service = test::init_service(app).await;
    send(&service, req).await
}

#[actix_web::test]
async fn owners_see_available_couriers() {
    let mut index = MockCourierIndex::new();
    index.expect_couriers_within().times(1).returning(|_, _| Ok(vec![courier(5, 400.0), courier(6, 900.0)]));
    index.expect_busy_couriers().times(1).returning(|_| Ok(vec![UserId(6)]));
    let req = TestRequest::get()
        .uri("/api/couriers/nearby?latitude=19.076&longitude=72.8777")
        .insert_header(bearer(OWNER, Role::Owner));
    let (status, body) = nearby(index, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "1 couriers nearby");
    assert_eq!(body["data"][0]["id"], 5);
    assert_eq!(body["data"][0]["distanceM"], 400.0);
}

#[actix_web::test]
async fn customers_cannot_search_for_couriers() {
    let index = MockCourierIndex::new();
    let req = TestRequest::get()
        .uri("/api/couriers/nearby?latitude=19.076&longitude=72.8777")
        .insert_header(bearer(CUSTOMER, Role::Customer));
    let (status, _) = nearby(index, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn invalid_coordinates_are_rejected() {
    let index = MockCourierIndex::new();
    let req =
        TestRequest::get().uri("/api/couriers/nearby?latitude=95&longitude=72.8777").insert_header(bearer(OWNER, Role::Owner));
    let (status, body) = nearby(index, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let index = MockCourierIndex::new();
    let req = TestRequest::get().uri("/api/couriers/nearby?latitude=north").insert_header(bearer(OWNER, Role::Owner));
    let (status, _) = nearby(index, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
