//! Loopback gatekeeper: basic-auth screening in front of the forwarder.
//!
//! Anything on the machine can connect to the bridge port, so every request
//! must present the per-run shared secret before it is forwarded (and before
//! any token is minted for it). Failures are answered directly with 401.

use std::sync::Arc;

use ara_gcp_auth::IdTokenSource;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::forward;
use crate::secret::USERNAME;

/// Everything one in-flight request needs: where to forward, what secret to
/// demand, and how to authenticate upstream.
pub struct BridgeState<S> {
    pub origin_base: String,
    pub shared_secret: String,
    pub token_source: Arc<S>,
    pub http: reqwest::Client,
}

// Derived Clone would demand S: Clone; the Arc makes that unnecessary.
impl<S> Clone for BridgeState<S> {
    fn clone(&self) -> Self {
        Self {
            origin_base: self.origin_base.clone(),
            shared_secret: self.shared_secret.clone(),
            token_source: Arc::clone(&self.token_source),
            http: self.http.clone(),
        }
    }
}

/// Build the axum router for the local bridge.
///
/// The wildcard route does not match `/` itself, so the root gets its own
/// route; both land in the same handler.
pub fn router<S>(state: BridgeState<S>) -> Router
where
    S: IdTokenSource + 'static,
{
    Router::new()
        .route("/", any(handle_request::<S>))
        .route("/{*path}", any(handle_request::<S>))
        .with_state(state)
}

async fn handle_request<S>(
    State(state): State<BridgeState<S>>,
    req: Request,
) -> Result<Response<Body>, forward::ProxyError>
where
    S: IdTokenSource + 'static,
{
    if !authorized(req.headers(), &state.shared_secret) {
        return Ok(unauthorized());
    }
    forward::forward(&state, req).await
}

fn authorized(headers: &HeaderMap, shared_secret: &str) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    match basic_credentials(value) {
        Some((user, password)) => user == USERNAME && password == shared_secret,
        None => false,
    }
}

/// Decodes `Authorization: Basic <base64(user:password)>`. The scheme is
/// matched case-insensitively per RFC 7617; the password may itself contain
/// colons.
fn basic_credentials(value: &str) -> Option<(String, String)> {
    let (scheme, payload) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(payload.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn unauthorized() -> Response<Body> {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .body(Body::from("Unauthorized"))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "1659e3adcb9b1bb2e18e7a01cfed5f1e";

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{user}:{password}")))
    }

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    // ── credential parsing ─────────────────────────────────────────────────

    #[test]
    fn parses_well_formed_basic_credentials() {
        let parsed = basic_credentials(&basic("ara", SECRET)).unwrap();
        assert_eq!(parsed, ("ara".to_string(), SECRET.to_string()));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let value = format!("basic {}", BASE64.encode(format!("ara:{SECRET}")));
        assert!(authorized(&headers_with_auth(&value), SECRET));
    }

    #[test]
    fn password_may_contain_colons() {
        let parsed = basic_credentials(&basic("ara", "a:b:c")).unwrap();
        assert_eq!(parsed.1, "a:b:c");
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(basic_credentials("Bearer tok123").is_none());
        assert!(basic_credentials("Basic !!!not-base64!!!").is_none());
        assert!(basic_credentials(&format!("Basic {}", BASE64.encode("no-colon"))).is_none());
        assert!(basic_credentials("Basic").is_none());
    }

    // ── authorization decision ─────────────────────────────────────────────

    #[test]
    fn accepts_the_shared_secret() {
        assert!(authorized(&headers_with_auth(&basic("ara", SECRET)), SECRET));
    }

    #[test]
    fn rejects_missing_header() {
        assert!(!authorized(&HeaderMap::new(), SECRET));
    }

    #[test]
    fn rejects_wrong_user_or_password() {
        assert!(!authorized(
            &headers_with_auth(&basic("admin", SECRET)),
            SECRET
        ));
        assert!(!authorized(
            &headers_with_auth(&basic("ara", "wrong-password")),
            SECRET
        ));
    }

    // ── rejection response ─────────────────────────────────────────────────

    #[tokio::test]
    async fn unauthorized_response_is_401_with_fixed_body() {
        let resp = unauthorized();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Unauthorized");
    }
}
