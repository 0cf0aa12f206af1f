use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::{middleware::Next, response::Response};

/// Response hardening settings
#[derive(Clone, Copy, Debug, Default)]
pub struct SecurityHeaders {
    /// Emit HSTS; only meaningful behind TLS
    pub strict_transport: bool,
}

impl SecurityHeaders {
    pub fn for_environment(is_production: bool) -> Self {
        Self {
            strict_transport: is_production,
        }
    }
}

/// Adds security headers to every response. The API only serves JSON and
/// user-uploaded bytes, so nothing it returns may execute scripts or be
/// framed, and transfer codes in URLs must not leak through `Referer`.
pub async fn security_headers_middleware(
    State(settings): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; sandbox"),
    );

    if settings.strict_transport {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}
