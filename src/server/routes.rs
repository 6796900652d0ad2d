//! Routes and shared application state.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use crate::permissions::Permissions;
use crate::purge::{ActionRouter, PurgeError, PurgeRequest, Purger, Response, ResponseBuilder};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub purger: Arc<Purger>,
    pub router: Arc<ActionRouter>,
    pub permissions: Permissions,
}

impl AppState {
    pub fn new(purger: Purger, router: ActionRouter, permissions: Permissions) -> Self {
        Self {
            purger: Arc::new(purger),
            router: Arc::new(router),
            permissions,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ajax", post(ajax))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Handle a cache action request.
async fn ajax(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PurgeRequest>, JsonRejection>,
) -> (StatusCode, Json<Response>) {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Malformed request body: {}", rejection.body_text());
            let mut builder = ResponseBuilder::new();
            builder.fail("Malformed request");
            return (rejection.status(), Json(builder.finalize()));
        }
    };

    let Some(caller) = state.permissions.authenticate(bearer_token(&headers)) else {
        warn!("Unauthenticated request for {}", request.action);
        let mut builder = ResponseBuilder::new();
        builder.fail("Authentication required");
        return (StatusCode::UNAUTHORIZED, Json(builder.finalize()));
    };

    match state.purger.dispatch(&state.router, &request, &caller).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e @ PurgeError::Forbidden { .. }) => (StatusCode::FORBIDDEN, Json(Response::failure(&e))),
        Err(e) => (StatusCode::OK, Json(Response::failure(&e))),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
