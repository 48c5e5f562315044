use std::time::Duration;

use actix_web::{
    dev::{HttpServiceFactory, Server},
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpRequest,
    HttpServer,
};
use dispatch_engine::{
    events::{EventHandlers, EventHooks, NotificationRequest, RealtimeEvent},
    CourierIndexApi,
    DirectoryApi,
    DispatchApi,
    FulfillmentDatabase,
    HandoffApi,
    OrderFlowApi,
    Publisher,
    SqliteDatabase,
    TrackingApi,
};
use futures::FutureExt;
use log::*;

use crate::{
    auth::{JwtMiddlewareFactory, TokenVerifier},
    config::ServerConfig,
    errors::ServerError,
    notifier::Notifier,
    realtime::{RealtimeHub, KEEP_ALIVE_INTERVAL},
    routes::{
        events,
        health,
        unsubscribe_order,
        AcceptAssignmentRoute,
        BroadcastsRoute,
        ConfirmHandoffRoute,
        CouriersNearbyRoute,
        CurrentAssignmentRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        OwnerOrdersRoute,
        PlaceOrderRoute,
        RequestHandoffCodeRoute,
        SubscribeOrderRoute,
        UpdateLocationRoute,
        UpdateProfileRoute,
        UpdateStatusRoute,
        UpsertShopRoute,
    },
    stale_broadcast_worker::start_stale_broadcast_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let hub = RealtimeHub::new();
    let notifier = Notifier::new(config.notifier.clone());
    let publisher = start_event_handlers(config.event_buffer_size, hub.clone(), notifier).await;
    let _keep_alive = hub.start_keep_alive(KEEP_ALIVE_INTERVAL);
    let sweeper = DispatchApi::new(db.clone(), publisher.clone(), config.dispatch);
    let _worker = start_stale_broadcast_worker(sweeper, config.sweep_interval);
    let srv = create_server_instance(config, db, publisher, hub)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Registers the gateway and notifier hooks with the engine and returns the publisher every API shares.
pub async fn start_event_handlers(buffer_size: usize, hub: RealtimeHub, notifier: Notifier) -> Publisher {
    let mut hooks = EventHooks::default();
    hooks.on_realtime(move |event: RealtimeEvent| {
        let hub = hub.clone();
        async move {
            hub.publish(&event);
        }
        .boxed()
    });
    hooks.on_notification(move |request: NotificationRequest| {
        let notifier = notifier.clone();
        async move {
            if let Err(e) = notifier.send(&request).await {
                warn!("📬️ Could not deliver {:?} notification to {}. {e}", request.template, request.receiver);
            }
        }
        .boxed()
    });
    let handlers = EventHandlers::new(buffer_size, hooks);
    let publisher = Publisher::new(handlers.producers());
    handlers.start_handlers().await;
    info!("📬️ Event handlers started");
    publisher
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    publisher: Publisher,
    hub: RealtimeHub,
) -> Result<Server, ServerError> {
    let verifier = TokenVerifier::new(&config.auth);
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), publisher.clone(), config.pricing, config.dispatch);
        let dispatch_api = DispatchApi::new(db.clone(), publisher.clone(), config.dispatch);
        let couriers_api = CourierIndexApi::new(db.clone(), config.dispatch);
        let handoff_api = HandoffApi::new(db.clone(), publisher.clone(), config.dispatch.handoff_code_ttl);
        let tracking_api = TrackingApi::new(db.clone(), publisher.clone());
        let directory_api = DirectoryApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fds::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(dispatch_api))
            .app_data(web::Data::new(couriers_api))
            .app_data(web::Data::new(handoff_api))
            .app_data(web::Data::new(tracking_api))
            .app_data(web::Data::new(directory_api))
            .app_data(web::Data::new(hub.clone()))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .service(health)
            .service(api_scope::<SqliteDatabase>(verifier.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("💻️ Listening on {host}:{port}");
    Ok(srv)
}

/// Every authenticated route. Specific paths are registered before the parameterised ones they would otherwise
/// collide with.
pub fn api_scope<B>(verifier: TokenVerifier) -> impl HttpServiceFactory + 'static
where B: FulfillmentDatabase + 'static
{
    web::scope("/api")
        .wrap(JwtMiddlewareFactory::new(verifier))
        .service(PlaceOrderRoute::<B>::new())
        .service(MyOrdersRoute::<B>::new())
        .service(OwnerOrdersRoute::<B>::new())
        .service(OrderByIdRoute::<B>::new())
        .service(UpdateStatusRoute::<B>::new())
        .service(CouriersNearbyRoute::<B>::new())
        .service(BroadcastsRoute::<B>::new())
        .service(CurrentAssignmentRoute::<B>::new())
        .service(AcceptAssignmentRoute::<B>::new())
        .service(RequestHandoffCodeRoute::<B>::new())
        .service(ConfirmHandoffRoute::<B>::new())
        .service(UpdateLocationRoute::<B>::new())
        .service(UpdateProfileRoute::<B>::new())
        .service(UpsertShopRoute::<B>::new())
        .service(events)
        .service(SubscribeOrderRoute::<B>::new())
        .service(unsubscribe_order)
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _: &HttpRequest| {
        debug!("💻️ Rejecting request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err: PathError, _: &HttpRequest| ServerError::InvalidRequestPath(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err: QueryPayloadError, _: &HttpRequest| ServerError::InvalidRequestPath(err.to_string()).into())
}
