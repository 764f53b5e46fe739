//! Shared state and identity middleware.

use appeals_core::{Actor, AppealService, DirectoryService, SettingsService, StatisticsService};
use appeals_db::entities::user::UserRole;
use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the caller's role token.
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub appeal_service: AppealService,
    pub statistics_service: StatisticsService,
    pub directory_service: DirectoryService,
    pub settings: SettingsService,
}

/// Identity asserted by the upstream gateway, if both headers are valid.
#[must_use]
pub fn actor_from_headers(headers: &HeaderMap) -> Option<Actor> {
    let id = headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)?;
    let role = UserRole::parse(headers.get(USER_ROLE_HEADER)?.to_str().ok()?)?;
    Some(Actor::new(id, role))
}

/// Resolve the caller and stash it in request extensions.
///
/// Requests without a valid identity pass through untouched; handlers that
/// need one reject them with 401.
pub async fn identity_middleware(mut req: Request<Body>, next: Next) -> Response {
    match actor_from_headers(req.headers()) {
        Some(actor) => {
            req.extensions_mut().insert(actor);
        }
        None if req.headers().contains_key(USER_ID_HEADER) => {
            debug!(path = %req.uri().path(), "Ignoring malformed identity headers");
        }
        None => {}
    }

    next.run(req).await
}
