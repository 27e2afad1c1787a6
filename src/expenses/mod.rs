mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
mod services;

use crate::{auth::middleware::require_auth, state::AppState};
use axum::{middleware, Router};

/// Every expense route sits behind the bearer-token gate.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
