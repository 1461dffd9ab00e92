//! Route definitions and router setup

use axum::{
    Router,
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::ServerState;
use crate::auth::{self, CONTENT_SECURITY_POLICY};
use crate::handlers;
use crate::stream;


/// Create the application router with all routes mounted under the base path
pub fn create_router(state: ServerState) -> Router {
    let config = state.config.clone();

    // Routes behind the authorization gate
    let protected = Router::new()
        .route(
            &config.path("api/logs/stream/{host}/{id}"),
            get(stream::stream_logs),
        )
        .route(
            &config.path("api/logs/download/{host}/{id}"),
            get(stream::download_logs),
        )
        .route(
            &config.path("api/logs/{host}/{id}"),
            get(stream::fetch_logs_between_dates),
        )
        .route(&config.path("api/events/stream"), get(stream::stream_events))
        .route(&config.path("logout"), get(auth::clear_session))
        .route(&config.path("version"), get(handlers::version))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authorization_required,
        ));

    let mut router = Router::new()
        .merge(protected)
        .route(
            &config.path("api/validateCredentials"),
            post(auth::validate_credentials),
        )
        .route(&config.path("healthcheck"), get(handlers::healthcheck))
        .fallback(get(handlers::index));

    if !config.prefix().is_empty() {
        let location = format!("{}/", config.prefix());
        router = router.route(
            config.prefix(),
            get(move || async move {
                (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
            }),
        );
    }

    router = router.layer(TraceLayer::new_for_http());
    if !config.dev {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ));
    }

    router.with_state(state)
}
