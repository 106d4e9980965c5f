use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "content-type, x-request-id";
const PREFLIGHT_MAX_AGE_SECS: &str = "600";

fn allowed_origin(headers: &HeaderMap, allowed: &[String]) -> Option<HeaderValue> {
    let origin = headers.get(header::ORIGIN)?;
    let s = origin.to_str().ok()?;
    allowed.iter().any(|a| a == s).then(|| origin.clone())
}

// Middleware: CORS for the browser frontend, limited to the configured origin allowlist.
//
// Requests without an allowed `Origin` pass through untouched; the browser enforces
// the missing headers. Preflights from allowed origins are answered here.
pub async fn cors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(origin) = allowed_origin(req.headers(), &state.allowed_origins) else {
        return next.run(req).await;
    };

    let mut resp = if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        let h = resp.headers_mut();
        h.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        h.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        h.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
        );
        resp
    } else {
        next.run(req).await
    };

    let h = resp.headers_mut();
    h.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    h.append(header::VARY, HeaderValue::from_static("origin"));
    h.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("x-request-id"),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(origin: Option<&str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(o) = origin {
            h.insert(header::ORIGIN, HeaderValue::from_str(o).unwrap());
        }
        h
    }

    #[test]
    fn only_listed_origins_are_allowed() {
        let allowed = vec!["http://localhost:5173".to_string()];
        assert_eq!(
            allowed_origin(&headers(Some("http://localhost:5173")), &allowed),
            Some(HeaderValue::from_static("http://localhost:5173"))
        );
        assert_eq!(allowed_origin(&headers(Some("https://evil.example")), &allowed), None);
        assert_eq!(allowed_origin(&headers(None), &allowed), None);
    }
}
