use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, security_headers};
use crate::handlers::{auth, events, health_check};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/events/",
            get(events::list_events).post(events::create_event),
        )
        .route(
            "/events/:id/",
            get(events::get_event)
                .put(events::replace_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/auth/register/", post(auth::register))
        .route("/auth/login/", post(auth::login))
        .route("/auth/token/refresh/", post(auth::refresh_token))
        .layer(middleware::from_fn(security_headers))
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
