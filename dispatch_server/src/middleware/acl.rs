//! Access control list middleware for the dispatch server.
//! This middleware can be placed on any route or service that sits behind the JWT middleware.
//!
//! It reads the claims the JWT middleware stored in the request extensions and checks the caller's role against the
//! roles allowed on the route. If the role is allowed, the request continues. Otherwise, a 403 Forbidden response is
//! returned.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use dispatch_engine::db_types::Role;
use futures::{
    future::{ok, Ready},
    Future,
};

use crate::{
    auth::JwtClaims,
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AclMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let role = req.extensions().get::<JwtClaims>().map(|c| c.role);
            match role {
                None => {
                    log::warn!("No JWT claims found in request extensions");
                    Err(ServerError::AuthenticationError(AuthError::MissingToken).into())
                },
                Some(role) if allowed_roles.contains(&role) => service.call(req).await,
                Some(role) => {
                    log::debug!("💻️ A {role} may not call {}", req.path());
                    Err(ServerError::InsufficientPermissions("Insufficient permissions".to_string()).into())
                },
            }
        })
    }
}
