use axum::{
    routing::{get, post, put},
    Router,
};

use crate::backend::{handlers, AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/categories",
            post(handlers::create_category).get(handlers::list_categories),
        )
        .route(
            "/api/expenses",
            post(handlers::create_expense).get(handlers::list_expenses),
        )
        .route(
            "/api/budgets",
            post(handlers::create_budget).get(handlers::list_budgets),
        )
        .route("/api/nudges", get(handlers::list_nudges))
        .route("/api/nudges/:id/dismiss", post(handlers::dismiss_nudge))
        .route("/api/nudges/preferences", get(handlers::get_preferences))
        .route("/api/nudges/preferences/:code", put(handlers::set_preference))
        .route("/api/notifications/subscribe", post(handlers::subscribe))
        .route("/api/notifications/unsubscribe", post(handlers::unsubscribe))
}
