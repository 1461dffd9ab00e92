//! HTTP request handlers for the page, health and version routes

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::ServerState;
use crate::api::ApiError;
use crate::assets;
use crate::bootstrap::BootstrapConfig;

/// Path of the login page, relative to the base
const LOGIN_PAGE: &str = "login";

/// Catch-all handler
///
/// Bundled assets are served without authorization. Any other path gets
/// the SPA shell, or a redirect to the login page when the session is not
/// authorized.
pub async fn index(State(state): State<ServerState>, jar: CookieJar, uri: Uri) -> Response {
    let Some(path) = state.config.strip_base(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !path.is_empty() && path != "/" {
        if let Some(contents) = state.assets.get(path) {
            if let Some(pulse) = &state.pulse {
                pulse.fire(state.registry.any());
            }
            return assets::serve(path, contents.clone());
        }
    }

    if path != LOGIN_PAGE && !state.auth.is_authorized(&jar).await {
        tracing::debug!(path = %uri.path(), "redirecting to login");
        return Redirect::temporary(&state.config.path(LOGIN_PAGE)).into_response();
    }

    let authorization_needed = state.auth.authorization_needed(&jar).await;
    let config = BootstrapConfig::assemble(&state.config, &state.registry, authorization_needed);
    match state.shell.render(&config) {
        Ok(html) => Html(html).into_response(),
        Err(e) => ApiError::Render(e).into_response(),
    }
}

/// Health check endpoint
pub async fn healthcheck(State(state): State<ServerState>) -> Response {
    tracing::trace!("executing healthcheck request");

    let Some(agent) = state.registry.any() else {
        tracing::error!("healthcheck failed: no agent registered");
        return (StatusCode::INTERNAL_SERVER_ERROR, "no agent registered").into_response();
    };

    match agent.ping().await {
        Ok(ping) => (StatusCode::OK, format!("OK API Version {}", ping.api_version)).into_response(),
        Err(e) => {
            tracing::error!(host = %agent.host().name, error = %e, "healthcheck failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Build version
pub async fn version(State(state): State<ServerState>) -> Html<String> {
    Html(format!("<pre>{}</pre>", state.config.version))
}
