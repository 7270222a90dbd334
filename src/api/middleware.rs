//! CORS and security headers applied to every API response.
//!
//! Preflight `OPTIONS` requests are answered here with `204` before
//! routing, so they bypass the rate limiters and handlers entirely.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header},
    middleware::Next,
    response::IntoResponse,
};

/// Deployment environment. Controls whether HSTS is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Read from `APP_ENV`; anything other than `production` is development.
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

fn cors_headers(headers: &mut HeaderMap, origin: &str) {
    let origin_value =
        HeaderValue::from_str(origin).unwrap_or_else(|_| HeaderValue::from_static("*"));
    headers.insert("Access-Control-Allow-Origin", origin_value);
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PUT,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Authorization, Content-Type, X-Requested-With"),
    );
}

fn security_headers(headers: &mut HeaderMap, environment: Environment) {
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
    if environment.is_production() {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"),
        );
    }
}

/// Reflects the request origin (falling back to `*`), answers preflights,
/// and stamps the fixed security header set on every response.
pub async fn cors_and_security_middleware(
    State(environment): State<Environment>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("*")
        .to_string();

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        cors_headers(headers, &origin);
        headers.insert("Access-Control-Max-Age", HeaderValue::from_static("86400"));
        security_headers(headers, environment);
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    cors_headers(headers, &origin);
    security_headers(headers, environment);
    response
}
