//! [`IdTokenSource`], the seam between the bridge and token minting.

/// Trait for sources that mint short-lived identity tokens.
///
/// Implementations must be `Send + Sync` so one source can serve concurrent
/// in-flight requests (e.g. wrapped in `Arc` inside the bridge's router
/// state). The contract makes no caching promise: callers invoke
/// [`id_token`](IdTokenSource::id_token) once per forwarded request, and an
/// implementation may cache internally or mint fresh every time.
pub trait IdTokenSource: Send + Sync {
    /// The error type returned when a token cannot be minted.
    type Error: std::error::Error + Send + Sync;

    /// Mint an identity token for the audience the source was built with.
    fn id_token(&self) -> impl std::future::Future<Output = Result<String, Self::Error>> + Send;
}
