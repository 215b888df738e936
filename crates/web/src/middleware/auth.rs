use std::collections::HashSet;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use storage::models::{Actor, ActorRole};
use uuid::Uuid;

use crate::error::WebError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Bearer API key check for mutating routes.
pub async fn require_auth(
    State(api_keys): State<ApiKeys>,
    request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let token = bearer_token(request.headers()).ok_or(WebError::Unauthorized("Missing API key"))?;

    if !api_keys.is_valid(token) {
        tracing::warn!("Invalid API key attempt");
        return Err(WebError::Unauthorized("Invalid API key"));
    }

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[derive(Clone)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    pub fn from_comma_separated(keys_str: &str) -> Self {
        let keys = keys_str
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Self { keys }
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Caller identity forwarded by the gateway in front of the API.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedActor
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(WebError::Unauthorized("Missing actor identity"))?
            .trim()
            .parse::<Uuid>()
            .map_err(|_| WebError::BadRequest(format!("{ACTOR_ID_HEADER} must be a UUID")))?;

        let role = match parts
            .headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
        {
            None | Some("user") => ActorRole::User,
            Some("admin") => ActorRole::Admin,
            Some(other) => {
                return Err(WebError::BadRequest(format!("Unknown actor role: {other}")));
            }
        };

        Ok(Self(Actor { user_id, role }))
    }
}
