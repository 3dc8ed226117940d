use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{validate_jwt, CallerIdentity};
use crate::error::ApiError;
use crate::resource::{Action, ResourceDescriptor};

/// Per-resource authentication settings shared by the middleware
#[derive(Clone, Debug)]
pub struct AuthPolicy {
    secret: Arc<str>,
    no_auth_actions: Arc<BTreeSet<Action>>,
}

impl AuthPolicy {
    pub fn new(secret: impl Into<String>, descriptor: &ResourceDescriptor) -> Self {
        Self {
            secret: Arc::from(secret.into()),
            no_auth_actions: Arc::new(descriptor.no_auth_actions().clone()),
        }
    }

    /// OPTIONS never needs a token; other actions only when the resource lists them.
    pub fn allows_anonymous(&self, action: Option<Action>) -> bool {
        match action {
            Some(Action::Options) => true,
            Some(action) => self.no_auth_actions.contains(&action),
            None => false,
        }
    }
}

/// Verify the bearer token and attach the `CallerIdentity`. Optional actions proceed
/// anonymously when the token is missing or invalid.
pub async fn jwt_auth_middleware(
    State(policy): State<AuthPolicy>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let has_id = request
        .extensions()
        .get::<MatchedPath>()
        .is_some_and(|path| path.as_str().ends_with("/:id"));
    let action = Action::from_request(request.method(), has_id);
    let optional = policy.allows_anonymous(action);

    match extract_jwt_from_headers(request.headers()) {
        Ok(token) => match validate_jwt(&token, &policy.secret) {
            Ok(claims) => {
                request.extensions_mut().insert(CallerIdentity::from(claims));
            }
            Err(e) if optional => {
                tracing::debug!("Ignoring rejected token on anonymous {:?}: {}", action, e);
            }
            Err(e) => {
                tracing::warn!("Rejected bearer token: {}", e);
                return Err(e.into());
            }
        },
        Err(_) if optional => {}
        Err(msg) => return Err(ApiError::unauthorized(msg)),
    }

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
