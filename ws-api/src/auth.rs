use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Header set by the authenticating proxy in front of the service.
pub const REMOTE_USER: &str = "remote_user";

/// Identity of the caller as asserted by the fronting proxy.
///
/// `username` is empty when no identity header was present; operations that
/// need a user reject that as a bad request.
#[derive(Clone, Debug, Default)]
pub struct Caller {
    pub username: String,
    pub access_token: Option<String>,
}

impl Caller {
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

/// Identity middleware - records who is calling without rejecting anyone
///
/// The proxy sets `REMOTE_USER`; `x-forwarded-user` is accepted for
/// oauth2-proxy style deployments. The bearer token is kept so it can be
/// forwarded to the policy service.
pub async fn identity_middleware(mut req: Request, next: Next) -> Response {
    let caller = caller_from_headers(req.headers());
    req.extensions_mut().insert(caller);
    next.run(req).await
}

pub fn caller_from_headers(headers: &HeaderMap) -> Caller {
    let username = headers
        .get(REMOTE_USER)
        .or_else(|| headers.get("x-forwarded-user"))
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    Caller {
        username,
        access_token: bearer_token(headers),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_caller_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REMOTE_USER, HeaderValue::from_static("alice"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));

        let caller = caller_from_headers(&headers);
        assert_eq!(caller.username, "alice");
        assert_eq!(caller.token(), Some("abc.def"));
    }

    #[test]
    fn test_missing_or_foreign_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        let caller = caller_from_headers(&headers);
        assert!(caller.username.is_empty());
        assert!(caller.token().is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   "));
        headers.insert("x-forwarded-user", HeaderValue::from_static("bob"));
        let caller = caller_from_headers(&headers);
        assert_eq!(caller.username, "bob");
        assert!(caller.token().is_none());
    }
}
