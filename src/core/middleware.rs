//! Request-entry guard for authenticated routes.
//!
//! Every request is verified on its own: the bearer token is checked, the
//! user it names must still exist, and only then is the handler invoked with
//! a [`CurrentUser`] extension. Nothing is cached between requests.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::stores::StoreError;

use super::{app_error::AppError, app_state::AppState};

/// Identity of the caller, injected by [`users_authorization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i32);

pub async fn users_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(req.headers()) else {
        debug!("Rejected request without bearer token");
        return Err(AppError::Unauthorized);
    };

    let user_id = state.tokens.verify(token).map_err(|err| {
        debug!(error = %err, "Rejected request with invalid token");
        AppError::Unauthorized
    })?;

    match state.users.get_by_id(user_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound) => {
            warn!(user_id, "Rejected token for a user that no longer exists");
            return Err(AppError::Unauthorized);
        }
        Err(err) => return Err(AppError::Other(err.into())),
    }

    req.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
