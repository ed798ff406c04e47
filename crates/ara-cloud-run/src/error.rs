use ara_gcp_auth::TokenError;

/// Errors that end the launcher before or outside the child command.
///
/// Every variant maps to exit code 1; the child's own exit code is mirrored
/// separately and never flows through here.
#[derive(Debug)]
pub enum BridgeError {
    /// Invalid or missing launch configuration. The message is printed as-is.
    Config(String),
    /// Token source construction failed at startup.
    Credentials(TokenError),
    /// The loopback listener could not be bound.
    Bind(std::io::Error),
    /// The forwarding HTTP client could not be built.
    HttpClient(reqwest::Error),
    /// The startup round-trip through the bridge did not come back 200.
    SelfTest(String),
    /// The child command could not be started or awaited.
    Child(String),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => f.write_str(msg),
            Self::Credentials(e) => write!(f, "{e}"),
            Self::Bind(e) => write!(f, "bind local listener: {e}"),
            Self::HttpClient(e) => write!(f, "build HTTP client: {e}"),
            Self::SelfTest(msg) => f.write_str(msg),
            Self::Child(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Credentials(e) => Some(e),
            Self::Bind(e) => Some(e),
            Self::HttpClient(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TokenError> for BridgeError {
    fn from(e: TokenError) -> Self {
        Self::Credentials(e)
    }
}
