use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::handlers::{
    get_notification, health, list_notifications, retry_notification, stats,
    submit_notification,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        // Notification endpoints
        .nest(
            "/api/v1",
            Router::new()
                .route(
                    "/notifications",
                    post(submit_notification).get(list_notifications),
                )
                .route("/notifications/{id}", get(get_notification))
                .route("/notifications/{id}/retry", post(retry_notification)),
        )
}
