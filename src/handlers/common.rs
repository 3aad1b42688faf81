use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::ServiceError;

/// Header carrying the authenticated user identity, injected by the
/// upstream session gate in front of this service.
pub const ACTING_USER_HEADER: &str = "x-user-id";

/// Extractor for the acting user. The session/authentication layer is an
/// external collaborator; by the time a request reaches these handlers it
/// must carry a verified identity.
#[derive(Debug, Clone)]
pub struct ActingUser(pub String);

impl ActingUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTING_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| ActingUser(value.to_string()))
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing authenticated user identity".into())
            })
    }
}
