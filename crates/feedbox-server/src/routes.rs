use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::auth_middleware;
use crate::db::UserStore;
use crate::handlers::{
    auth as auth_handlers, messages as message_handlers, preferences as preference_handlers,
    usernames as username_handlers,
};
use crate::mail::Mailer;
use crate::Config;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}

pub fn create_router(state: AppState) -> Router {
    // Public routes (no middleware)
    let public_routes = Router::new()
        .route("/sign-up", post(auth_handlers::sign_up))
        .route("/sign-in", post(auth_handlers::sign_in))
        .route("/verify-code", post(auth_handlers::verify_code))
        .route(
            "/check-username-unique",
            get(username_handlers::check_username_unique),
        )
        .route("/send-message", post(message_handlers::send_message));

    // Routes acting on the signed-in user's own record
    let protected_routes = Router::new()
        .route("/get-messages", get(message_handlers::get_messages))
        .route(
            "/delete-message/:message_id",
            delete(message_handlers::delete_message),
        )
        .route(
            "/accept-messages",
            get(preference_handlers::get_accept_messages)
                .post(preference_handlers::set_accept_messages),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
