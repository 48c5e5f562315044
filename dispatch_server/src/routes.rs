//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into the engine. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every database call and every event publication is therefore
//! awaited, never blocked on.
//!
//! Every `/api` route sits behind the JWT middleware, so handlers can take [`JwtClaims`] as an argument. Routes that
//! are restricted to particular roles declare them with `requires [...]`.
use actix_web::{delete, get, http::header, web, HttpResponse, Responder};
use dispatch_engine::{
    db_types::{AssignmentId, NewOrder, NewUser, OrderId, Role, Shop, ShopId, ShopOrderId},
    events::Channel,
    traits::{CourierIndex, FulfillmentDatabase},
    CourierIndexApi,
    DirectoryApi,
    DispatchApi,
    FulfillmentError,
    HandoffApi,
    OrderFlowApi,
    TrackingApi,
};
use log::*;

use crate::{
    auth::JwtClaims,
    data_objects::{
        HandoffConfirmRequest,
        JsonResponse,
        LocationUpdate,
        NearbyQuery,
        ProfileUpdate,
        ShopUpdate,
        StatusUpdateRequest,
    },
    errors::ServerError,
    realtime::RealtimeHub,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),*]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),*]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(place_order => Post "/orders" impl FulfillmentDatabase where requires [Role::Customer]);
pub async fn place_order<B: FulfillmentDatabase>(
    claims: JwtClaims,
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ Order placement request from customer #{}", claims.user_id);
    let order = api.place_order(claims.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(JsonResponse::with_data("Order placed", order)))
}

route!(my_orders => Get "/orders/mine" impl FulfillmentDatabase where requires [Role::Customer]);
pub async fn my_orders<B: FulfillmentDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET my orders for #{}", claims.user_id);
    let orders = api.orders_for_customer(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data(format!("{} orders", orders.len()), orders)))
}

route!(owner_orders => Get "/orders/owner" impl FulfillmentDatabase where requires [Role::Owner]);
pub async fn owner_orders<B: FulfillmentDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET owner orders for #{}", claims.user_id);
    let orders = api.orders_for_owner(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data(format!("{} orders", orders.len()), orders)))
}

route!(order_by_id => Get "/orders/{order_id}" impl FulfillmentDatabase);
pub async fn order_by_id<B: FulfillmentDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET order #{order_id} for #{}", claims.user_id);
    let order = api.order_for_party(claims.user_id, order_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data("Order fetched", order)))
}

route!(update_status => Put "/orders/{order_id}/shop-orders/{shop_order_id}/status" impl FulfillmentDatabase where requires [Role::Owner]);
pub async fn update_status<B: FulfillmentDatabase>(
    claims: JwtClaims,
    path: web::Path<(OrderId, ShopOrderId)>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, shop_order_id) = path.into_inner();
    let status = body.into_inner().status;
    debug!("💻️ Owner #{} moves shop order #{shop_order_id} of order #{order_id} to {status}", claims.user_id);
    let update = api.update_shop_order_status(claims.user_id, order_id, shop_order_id, status).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data(update.message.clone(), update)))
}

//----------------------------------------------   Couriers  ----------------------------------------------------
route!(couriers_nearby => Get "/couriers/nearby" impl CourierIndex where requires [Role::Owner]);
pub async fn couriers_nearby<B: CourierIndex>(
    query: web::Query<NearbyQuery>,
    api: web::Data<CourierIndexApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let NearbyQuery { latitude, longitude } = query.into_inner();
    let couriers = api.available_near(latitude, longitude).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data(format!("{} couriers nearby", couriers.len()), couriers)))
}

//----------------------------------------------   Assignments  ----------------------------------------------------
route!(broadcasts => Get "/assignments/broadcasts" impl FulfillmentDatabase where requires [Role::Courier]);
pub async fn broadcasts<B: FulfillmentDatabase>(
    claims: JwtClaims,
    api: web::Data<DispatchApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let offers = api.broadcasts_for_courier(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data(format!("{} open offers", offers.len()), offers)))
}

route!(accept_assignment => Post "/assignments/{assignment_id}/accept" impl FulfillmentDatabase where requires [Role::Courier]);
pub async fn accept_assignment<B: FulfillmentDatabase>(
    claims: JwtClaims,
    path: web::Path<AssignmentId>,
    api: web::Data<DispatchApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let assignment_id = path.into_inner();
    debug!("💻️ Courier #{} accepts assignment #{assignment_id}", claims.user_id);
    let accepted = api.accept(assignment_id, claims.user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data(accepted.message.clone(), accepted)))
}

route!(current_assignment => Get "/assignments/current" impl FulfillmentDatabase where requires [Role::Courier]);
pub async fn current_assignment<B: FulfillmentDatabase>(
    claims: JwtClaims,
    api: web::Data<DispatchApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let current = api.current_assignment(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data("Current delivery", current)))
}

//----------------------------------------------   Handoff  ----------------------------------------------------
route!(request_handoff_code => Post "/handoff/code" impl FulfillmentDatabase where requires [Role::Courier]);
pub async fn request_handoff_code<B: FulfillmentDatabase>(
    claims: JwtClaims,
    api: web::Data<HandoffApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let issued = api.request_code(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data("Handoff code sent to the customer", issued)))
}

route!(confirm_handoff => Post "/handoff/confirm" impl FulfillmentDatabase where requires [Role::Courier]);
pub async fn confirm_handoff<B: FulfillmentDatabase>(
    claims: JwtClaims,
    body: web::Json<HandoffConfirmRequest>,
    api: web::Data<HandoffApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let confirmed = api.confirm(claims.user_id, &body.otp).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data("Order delivered", confirmed)))
}

//----------------------------------------------   Tracking  ----------------------------------------------------
route!(update_location => Put "/location" impl FulfillmentDatabase);
pub async fn update_location<B: FulfillmentDatabase>(
    claims: JwtClaims,
    body: web::Json<LocationUpdate>,
    api: web::Data<TrackingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let LocationUpdate { lat, long } = body.into_inner();
    let point = api.update_location(claims.user_id, lat, long).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data("Location updated", point)))
}

//----------------------------------------------   Directory  ----------------------------------------------------
route!(update_profile => Put "/profile" impl FulfillmentDatabase);
/// Mirrors the caller's profile into the dispatch store. The role always comes from the access token.
pub async fn update_profile<B: FulfillmentDatabase>(
    claims: JwtClaims,
    body: web::Json<ProfileUpdate>,
    api: web::Data<DirectoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ProfileUpdate { full_name, email, mobile } = body.into_inner();
    let user = NewUser { id: claims.user_id, full_name, email, mobile, role: claims.role };
    let profile = api.upsert_user(user).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data("Profile updated", profile)))
}

route!(upsert_shop => Put "/shops/{shop_id}" impl FulfillmentDatabase where requires [Role::Owner]);
pub async fn upsert_shop<B: FulfillmentDatabase>(
    claims: JwtClaims,
    path: web::Path<ShopId>,
    body: web::Json<ShopUpdate>,
    api: web::Data<DirectoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    match api.fetch_shop(id).await {
        Ok(existing) if existing.owner_id != claims.user_id => {
            return Err(ServerError::InsufficientPermissions(format!("Shop {id} belongs to another owner")));
        },
        Ok(_) | Err(FulfillmentError::NotFound(_)) => {},
        Err(e) => return Err(e.into()),
    }
    let ShopUpdate { name, address } = body.into_inner();
    let shop = api.upsert_shop(Shop { id, name, owner_id: claims.user_id, address }).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::with_data("Shop updated", shop)))
}

//----------------------------------------------   Real-time  ----------------------------------------------------
#[get("/events")]
pub async fn events(claims: JwtClaims, hub: web::Data<RealtimeHub>) -> HttpResponse {
    let (session_id, receiver) = hub.connect(claims.user_id, claims.role);
    info!("📡️ Event stream {session_id} opened by {} #{}", claims.role, claims.user_id);
    let stream = futures::stream::unfold(receiver, |mut rx| async move {
        rx.recv().await.map(|frame| (Ok::<_, std::convert::Infallible>(frame), rx))
    });
    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .content_type("text/event-stream")
        .streaming(stream)
}

route!(subscribe_order => Post "/events/{session_id}/orders/{order_id}" impl FulfillmentDatabase);
pub async fn subscribe_order<B: FulfillmentDatabase>(
    claims: JwtClaims,
    path: web::Path<(String, OrderId)>,
    api: web::Data<OrderFlowApi<B>>,
    hub: web::Data<RealtimeHub>,
) -> Result<HttpResponse, ServerError> {
    let (session_id, order_id) = path.into_inner();
    api.order_for_party(claims.user_id, order_id).await?;
    let channel = Channel::Order(order_id);
    if !hub.subscribe(&session_id, claims.user_id, channel) {
        return Err(ServerError::NoRecordFound(format!("Session {session_id} not found")));
    }
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Subscribed to {channel}"))))
}

#[delete("/events/{session_id}/orders/{order_id}")]
pub async fn unsubscribe_order(
    claims: JwtClaims,
    path: web::Path<(String, OrderId)>,
    hub: web::Data<RealtimeHub>,
) -> Result<HttpResponse, ServerError> {
    let (session_id, order_id) = path.into_inner();
    let channel = Channel::Order(order_id);
    if !hub.unsubscribe(&session_id, claims.user_id, channel) {
        return Err(ServerError::NoRecordFound(format!("Session {session_id} not found")));
    }
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Unsubscribed from {channel}"))))
}
