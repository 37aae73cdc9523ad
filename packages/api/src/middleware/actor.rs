use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";

/// The calling player, as identified by the upstream gateway.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, ACTOR_ID_HEADER).ok_or(ApiError::MissingActor)?;
        // Display name falls back to the id
        let name = header_value(parts, ACTOR_NAME_HEADER).unwrap_or_else(|| id.clone());

        Ok(Actor { id, name })
    }
}
