//! Session resolution and access gates.
//!
//! `resolve_session` runs on every request and attaches a [`CurrentSession`];
//! the gates only read it. A gate that refuses redirects and the handler never
//! runs.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::convert::Infallible;
use std::sync::Arc;

use crate::auth::ResolvedSession;
use crate::AppState;

/// Cookie holding the opaque session identifier
pub const SESSION_COOKIE: &str = "portcullis_session";

/// Identity of the current request, if any
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<ResolvedSession>);

impl CurrentSession {
    pub fn get(&self) -> Option<&ResolvedSession> {
        self.0.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(ResolvedSession::is_admin)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Session cookie as configured: HttpOnly, SameSite=Lax, scoped to the whole site
pub fn session_cookie(state: &AppState, identifier: String) -> Cookie<'static> {
    let max_age = i64::try_from(state.config.auth.session_ttl_secs).unwrap_or(i64::MAX);
    Cookie::build((SESSION_COOKIE, identifier))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.server.secure_cookies)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// Cookie that makes the browser drop the session
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Resolve the session cookie and attach the result to the request.
///
/// Lookup failures are logged and the request continues as anonymous.
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = match jar.get(SESSION_COOKIE).map(|cookie| cookie.value()) {
        Some(identifier) if !identifier.is_empty() => {
            match state.sessions.resolve(identifier).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to resolve session");
                    None
                }
            }
        }
        _ => None,
    };

    if let Some(session) = &session {
        tracing::trace!(user_id = session.user_id, "Session resolved");
    }
    request.extensions_mut().insert(CurrentSession(session));
    next.run(request).await
}

/// Pages for signed-out visitors: a signed-in user is sent home
pub async fn require_anonymous(
    session: CurrentSession,
    request: Request<Body>,
    next: Next,
) -> Response {
    if session.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    next.run(request).await
}

pub async fn require_authenticated(
    session: CurrentSession,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !session.is_authenticated() {
        tracing::debug!(path = %request.uri().path(), "No session, redirecting to login");
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}

/// Requires the `admin` role in the session's role snapshot. Anyone else is
/// redirected to the login page, the same as an anonymous visitor.
pub async fn require_admin(
    session: CurrentSession,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !session.is_admin() {
        tracing::debug!(
            path = %request.uri().path(),
            authenticated = session.is_authenticated(),
            "Admin page refused"
        );
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}

/// Headers applied to every response
pub async fn security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("referrer-policy", HeaderValue::from_static("same-origin"));
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(
            "default-src 'self'; style-src 'self' 'unsafe-inline'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'",
        ),
    );

    response
}

/// Keep pages showing account data out of shared caches
pub async fn sensitive(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        "cache-control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
    );
    response
        .headers_mut()
        .insert("pragma", HeaderValue::from_static("no-cache"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Extension, Router};
    use chrono::Utc;
    use tower::ServiceExt;

    fn session(roles: &[&str]) -> CurrentSession {
        CurrentSession(Some(ResolvedSession {
            user_id: 1,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            expires_at: Utc::now(),
        }))
    }

    /// Router with one gated route and a fixed session injected ahead of the gate
    async fn call<F, Fut>(gate: F, current: CurrentSession) -> Response
    where
        F: Fn(CurrentSession, Request<Body>, Next) -> Fut + Clone + Send + Sync + 'static,
        Fut: std::future::Future<Output = Response> + Send + 'static,
    {
        let app = Router::new()
            .route("/page", get(|| async { "page" }))
            .route_layer(middleware::from_fn(gate))
            .layer(Extension(current));

        app.oneshot(Request::builder().uri("/page").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers().get("location").unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_require_anonymous() {
        let response = call(require_anonymous, CurrentSession::default()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(require_anonymous, session(&["user"])).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn test_require_authenticated() {
        let response = call(require_authenticated, CurrentSession::default()).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");

        let response = call(require_authenticated, session(&["user"])).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_require_admin_redirects_non_admins_to_login() {
        for current in [
            CurrentSession::default(),
            session(&["user"]),
            session(&["user", "superadmin"]),
        ] {
            let response = call(require_admin, current).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), "/login");
        }

        let response = call(require_admin, session(&["user", "admin"])).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_header_layers() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(sensitive))
            .layer(middleware::from_fn(security_headers));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert!(headers
            .get("cache-control")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("no-store"));
    }
}
