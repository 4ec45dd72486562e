use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// Stylesheets and scripts for the server-rendered pages come from the
/// Bootstrap CDN; everything else is same-origin.
const PAGE_CSP: &str = "default-src 'self'; \
     script-src 'self' https://cdn.jsdelivr.net; \
     style-src 'self' 'unsafe-inline' https://cdn.jsdelivr.net; \
     img-src 'self' data:; \
     font-src 'self' https://cdn.jsdelivr.net; \
     form-action 'self'; \
     frame-ancestors 'none'";

const API_CSP: &str = "default-src 'none'; frame-ancestors 'none'";

fn is_machine_route(path: &str) -> bool {
    matches!(path, "/health" | "/ready" | "/metrics")
}

pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let machine_route = is_machine_route(req.uri().path());

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        header::HeaderValue::from_static(if machine_route { API_CSP } else { PAGE_CSP }),
    );

    response
}
