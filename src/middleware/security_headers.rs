//! Security headers added to every response.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; \
     style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; font-src 'self'; \
     connect-src 'self'; frame-ancestors 'none'";

const PERMISSIONS_POLICY: &str = "camera=(), microphone=(), geolocation=(), payment=()";

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";

fn static_headers() -> [(HeaderName, &'static str); 6] {
    [
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_XSS_PROTECTION, "1; mode=block"),
        (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
        (
            HeaderName::from_static("permissions-policy"),
            PERMISSIONS_POLICY,
        ),
    ]
}

/// Axum Middleware: security headers.
///
/// HSTS is only sent when the request did not target localhost.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let send_hsts = !is_localhost(&req);

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in static_headers() {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if send_hsts {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }

    response
}

fn is_localhost(req: &Request<Body>) -> bool {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or_default();

    host.contains("localhost") || host.starts_with("127.0.0.1") || host.starts_with("[::1]")
}
