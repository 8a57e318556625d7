//! Access control list middleware for the marketplace server.
//! This middleware can be placed on any route or service.
//!
//! It reads the caller from the actor headers and checks the caller's role against the roles allowed on the route.
//! Requests without an actor are answered with 401 Unauthorized, and requests from an actor with any other role with
//! 403 Forbidden. Otherwise the [`Actor`] is stored in the request extensions and the request continues.
//!
//! Ownership rules (which seller owns a product, which customer placed an order) are finer grained than a role, and
//! are enforced by the engine.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::{ok, Ready};
use log::debug;
use marketplace_engine::db_types::{Actor, Role};

use crate::{auth::actor_from_headers, errors::ServerError};

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
    type Response = ServiceResponse<EitherBody<B>>;
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
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let actor = match actor_from_headers(req.headers()) {
                Ok(actor) => actor,
                Err(e) => {
                    debug!("💻️ Rejecting {} {}. {e}", req.method(), req.path());
                    return Ok(req.error_response(ServerError::from(e)).map_into_right_body());
                },
            };
            if !is_allowed(&actor, &allowed_roles) {
                debug!("💻️ {actor} may not call {} {}", req.method(), req.path());
                let err = ServerError::InsufficientPermissions(format!("{} may not call this endpoint", actor.role));
                return Ok(req.error_response(err).map_into_right_body());
            }
            req.extensions_mut().insert::<Actor>(actor);
            service.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}

fn is_allowed(actor: &Actor, allowed_roles: &[Role]) -> bool {
    allowed_roles.contains(&actor.role)
}
