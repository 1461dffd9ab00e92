//! Authorization gate
//!
//! Session-cookie authorization for the gateway. When no credentials are
//! configured every request is authorized. Sessions expire after a fixed
//! lifetime and the store is capped, evicting the oldest session first.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::ServerState;
use crate::api::ApiError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "logdeck_session";

/// Lifetime of a session from login
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Sessions held at once
pub const MAX_SESSIONS: usize = 1024;

/// Content-Security-Policy sent outside dev mode
pub const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self' 'wasm-unsafe-eval'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; manifest-src 'self'; connect-src 'self'";

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// Credential check and in-memory session store
#[derive(Debug)]
pub struct SessionAuth {
    credentials: Option<Credentials>,
    /// Token to creation time
    sessions: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionAuth {
    /// Authorization is only enforced when both values are present
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        let credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };
        Self {
            credentials,
            sessions: RwLock::new(HashMap::new()),
            ttl: SESSION_TTL,
            max_sessions: MAX_SESSIONS,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn secured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Whether the request carrying `jar` may access gated routes
    pub async fn is_authorized(&self, jar: &CookieJar) -> bool {
        if !self.secured() {
            return true;
        }
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return false;
        };

        let created = self.sessions.read().await.get(cookie.value()).copied();
        match created {
            Some(created) if created.elapsed() < self.ttl => true,
            Some(_) => {
                self.sessions.write().await.remove(cookie.value());
                false
            }
            None => false,
        }
    }

    /// Whether the browser still has to log in
    pub async fn authorization_needed(&self, jar: &CookieJar) -> bool {
        self.secured() && !self.is_authorized(jar).await
    }

    /// Check credentials and open a session, returning its token
    pub async fn validate(&self, username: &str, password: &str) -> Option<String> {
        let credentials = self.credentials.as_ref()?;
        let user_ok = safe_equal(username, &credentials.username);
        let pass_ok = safe_equal(password, &credentials.password);
        if !(user_ok && pass_ok) {
            return None;
        }

        let token = uuid::Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, created| created.elapsed() < self.ttl);
        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, created)| **created)
                .map(|(token, _)| token.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            tracing::debug!("session store full, evicted oldest session");
        }
        sessions.insert(token.clone(), Instant::now());
        Some(token)
    }

    /// Number of live sessions held
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Close a session
    pub async fn clear(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }
}

/// Constant-time string comparison
///
/// Both sides are hashed first so the comparison does not reveal the
/// length of the secret.
fn safe_equal(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}

/// Middleware for gated routes
///
/// API routes answer 401; page routes redirect to the login page.
pub async fn authorization_required(
    State(state): State<ServerState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if state.auth.is_authorized(&jar).await {
        return next.run(request).await;
    }

    let api_prefix = format!("{}/", state.config.path("api"));
    if request.uri().path().starts_with(&api_prefix) {
        return ApiError::Unauthorized.into_response();
    }
    Redirect::temporary(&state.config.path("login")).into_response()
}

/// Login form
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

/// `POST /api/validateCredentials`
pub async fn validate_credentials(
    State(state): State<ServerState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    match state.auth.validate(&form.username, &form.password).await {
        Some(token) => {
            tracing::info!(username = %form.username, "login succeeded");
            let cookie = Cookie::build((SESSION_COOKIE, token))
                .path(state.config.path(""))
                .http_only(true)
                .same_site(SameSite::Strict);
            (jar.add(cookie), StatusCode::OK).into_response()
        }
        None => {
            tracing::warn!(username = %form.username, "login failed");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// `GET /logout`
pub async fn clear_session(State(state): State<ServerState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.auth.clear(cookie.value()).await;
    }

    let mut expired = Cookie::from(SESSION_COOKIE);
    expired.set_path(state.config.path(""));
    (jar.remove(expired), Redirect::temporary(&state.config.path(""))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar_with(token: &str) -> CookieJar {
        CookieJar::new().add(Cookie::new(SESSION_COOKIE, token.to_string()))
    }

    #[test]
    fn test_safe_equal() {
        assert!(safe_equal("secret", "secret"));
        assert!(!safe_equal("secret", "secreT"));
        assert!(!safe_equal("secret", "secret1"));
        assert!(!safe_equal("", "secret"));
        assert!(safe_equal("", ""));
    }

    #[tokio::test]
    async fn test_unsecured_always_authorized() {
        let auth = SessionAuth::new(Some("admin".into()), None);
        assert!(!auth.secured());
        assert!(auth.is_authorized(&CookieJar::new()).await);
        assert!(!auth.authorization_needed(&CookieJar::new()).await);
        assert!(auth.validate("admin", "").await.is_none());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let auth = SessionAuth::new(Some("admin".into()), Some("secret".into()));
        assert!(auth.secured());
        assert!(!auth.is_authorized(&CookieJar::new()).await);
        assert!(auth.authorization_needed(&CookieJar::new()).await);

        assert!(auth.validate("admin", "wrong").await.is_none());
        let token = auth.validate("admin", "secret").await.unwrap();

        let jar = jar_with(&token);
        assert!(auth.is_authorized(&jar).await);
        assert!(!auth.authorization_needed(&jar).await);
        assert!(!auth.is_authorized(&jar_with("forged")).await);

        auth.clear(&token).await;
        assert!(!auth.is_authorized(&jar).await);
    }

    #[tokio::test]
    async fn test_session_expires() {
        let auth = SessionAuth::new(Some("admin".into()), Some("secret".into()))
            .with_session_ttl(Duration::ZERO);
        let token = auth.validate("admin", "secret").await.unwrap();

        assert!(!auth.is_authorized(&jar_with(&token)).await);
        assert_eq!(auth.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_session_store_is_capped() {
        let auth = SessionAuth::new(Some("admin".into()), Some("secret".into()))
            .with_max_sessions(2);
        let first = auth.validate("admin", "secret").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = auth.validate("admin", "secret").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let third = auth.validate("admin", "secret").await.unwrap();

        assert_eq!(auth.session_count().await, 2);
        assert!(!auth.is_authorized(&jar_with(&first)).await);
        assert!(auth.is_authorized(&jar_with(&second)).await);
        assert!(auth.is_authorized(&jar_with(&third)).await);
    }
}
