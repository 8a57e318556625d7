//! Actor extraction.
//!
//! Identities are issued upstream. The identity gateway in front of this server forwards the authenticated caller in
//! the `x-actor-id` and `x-actor-role` headers, and this module turns those into an engine [`Actor`].
use std::{
    future::{ready, Ready},
    ops::Deref,
};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use log::debug;
use marketplace_engine::db_types::{Actor, Role};

use crate::errors::{AuthError, ServerError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The caller of the current request. Handlers that take this extractor reject requests without actor headers
/// with a 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedActor(pub Actor);

impl AuthenticatedActor {
    pub fn into_inner(self) -> Actor {
        self.0
    }
}

impl Deref for AuthenticatedActor {
    type Target = Actor;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AuthenticatedActor {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // The ACL middleware has usually done the work already
        if let Some(actor) = req.extensions().get::<Actor>() {
            return ready(Ok(Self(actor.clone())));
        }
        ready(actor_from_headers(req.headers()).map(Self).map_err(ServerError::from))
    }
}

pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AuthError> {
    let id = header_value(headers, ACTOR_ID_HEADER)?;
    let role = header_value(headers, ACTOR_ROLE_HEADER)?;
    if id.is_empty() {
        return Err(AuthError::InvalidActor("The actor id is empty".into()));
    }
    let role = role.parse::<Role>().map_err(|e| {
        debug!("💻️ Rejecting request with actor role '{role}'. {e}");
        AuthError::InvalidActor(e.to_string())
    })?;
    Ok(Actor::new(id, role))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AuthError> {
    let value = headers.get(name).ok_or(AuthError::MissingActor)?;
    value
        .to_str()
        .map(str::trim)
        .map_err(|e| AuthError::InvalidActor(format!("{name} is not a valid header value. {e}")))
}
