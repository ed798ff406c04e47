//! Authenticating forwarder: replays authorized requests against the origin.
//!
//! Each request is rebuilt from scratch: the loopback host and basic-auth
//! header are dropped, a freshly minted identity token goes on as `Bearer`,
//! and the origin's response streams back with its status intact. Failures
//! here are per-request; the bridge itself keeps serving.

use ara_gcp_auth::IdTokenSource;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::Response;
use bytes::Bytes;

use crate::gatekeeper::BridgeState;

/// Hop-by-hop headers (RFC 2616 section 13.5.1); they describe the loopback
/// connection, not the request, and are never forwarded.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub async fn forward<S>(state: &BridgeState<S>, req: Request) -> Result<Response<Body>, ProxyError>
where
    S: IdTokenSource,
{
    // Mint before touching the origin: a dead credential source must not
    // produce half-sent upstream requests.
    let token = state
        .token_source
        .id_token()
        .await
        .map_err(|e| ProxyError::Token(e.to_string()))?;
    if token.is_empty() {
        return Err(ProxyError::Token("empty token".to_string()));
    }

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.origin_base, path_and_query);

    let method = req.method().clone();
    let headers = forwardable_headers(req.headers());
    let body: Bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| ProxyError::ReadBody(e.to_string()))?;

    let mut upstream = state
        .http
        .request(method, url)
        .headers(headers)
        .bearer_auth(&token);
    if !body.is_empty() {
        upstream = upstream.body(body);
    }

    let resp = upstream
        .send()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    let status = resp.status();
    let resp_headers = response_headers(resp.headers());
    let resp_body = resp
        .bytes()
        .await
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    let mut builder = Response::builder().status(status);
    if let Some(h) = builder.headers_mut() {
        *h = resp_headers;
    }
    Ok(builder.body(Body::from(resp_body)).unwrap())
}

/// Request headers to forward: everything except the loopback's own
/// `Host`, the gatekeeper's basic auth, hop-by-hop headers, and
/// `Content-Length` (reqwest recomputes it from the buffered body).
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if skip_request_header(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

fn skip_request_header(name: &HeaderName) -> bool {
    *name == header::HOST
        || *name == header::AUTHORIZATION
        || *name == header::CONTENT_LENGTH
        || is_hop_by_hop(name)
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

fn response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers {
        if *name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// Errors for one forwarded request; each becomes a synthetic 500 while the
/// bridge keeps serving.
#[derive(Debug)]
pub enum ProxyError {
    Token(String),
    ReadBody(String),
    Upstream(String),
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(e) => write!(f, "get token: {e}"),
            Self::ReadBody(e) => write!(f, "read request body: {e}"),
            Self::Upstream(e) => write!(f, "forward request: {e}"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl axum::response::IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request forwarding failed");
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::from(self.to_string()))
            .unwrap()
    }
}
