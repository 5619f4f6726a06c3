use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::{AppError, Result};
use crate::session::SessionTokens;
use crate::store::UserId;
use crate::AppState;

/// Resolve a raw `Authorization` header value to a user.
///
/// The header carries the token itself; a `Bearer ` prefix is tolerated.
pub fn authorize(sessions: &SessionTokens, header: Option<&str>) -> Result<UserId> {
    let token = header
        .map(str::trim)
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
        .filter(|v| !v.is_empty())
        .ok_or(AppError::InvalidToken)?;
    sessions.verify(token)
}

/// As `authorize`, additionally requiring the token's subject to be a
/// registered user.
pub fn authorize_user(state: &AppState, header: Option<&str>) -> Result<UserId> {
    let user_id = authorize(&state.sessions, header)?;
    if state.store.get_user(user_id.as_str())?.is_none() {
        return Err(AppError::InvalidToken);
    }
    Ok(user_id)
}

/// Axum middleware that rejects requests without a valid session token and
/// inserts the resolved `UserId` into request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authorize_user(&state, header) {
        Ok(user_id) => {
            request.extensions_mut().insert(user_id);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
