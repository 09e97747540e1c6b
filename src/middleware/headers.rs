use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware::Next,
};

// Security headers middleware applied to all responses.
// img-src allows https so proxied cover posters render from the CDN.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response<Body> {
    let mut res = next.run(req).await;

    const CSP: &str = "default-src 'self'; img-src 'self' https:; object-src 'none'; \
        base-uri 'self'; form-action 'self'; frame-ancestors 'self'";

    if res.headers().get("content-security-policy").is_none() {
        let val = HeaderValue::from_static(CSP);
        res.headers_mut()
            .insert(HeaderName::from_static("content-security-policy"), val);
    }

    if res.headers().get("referrer-policy").is_none() {
        let val = HeaderValue::from_static("no-referrer");
        res.headers_mut()
            .insert(HeaderName::from_static("referrer-policy"), val);
    }
    if res.headers().get("x-content-type-options").is_none() {
        let val = HeaderValue::from_static("nosniff");
        res.headers_mut()
            .insert(HeaderName::from_static("x-content-type-options"), val);
    }

    res
}
