#[derive(Debug)]
pub enum TokenError {
    /// Application Default Credentials could not be located or parsed.
    Credentials(String),
    /// The discovered credentials cannot mint the requested token kind.
    Unsupported { credential_type: String },
    /// Transport-level failure talking to a Google endpoint.
    Http(reqwest::Error),
    /// A Google endpoint answered with a non-success status.
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    /// Signing the service-account assertion failed.
    Jwt(jsonwebtoken::errors::Error),
    /// A token response did not have the expected shape.
    Malformed(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credentials(msg) => write!(f, "credentials error: {msg}"),
            Self::Unsupported { credential_type } => {
                write!(f, "unsupported credential type: {credential_type}")
            }
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Status {
                endpoint,
                status,
                body,
            } => {
                write!(f, "{endpoint} returned status {status}: {body}")
            }
            Self::Jwt(e) => write!(f, "JWT signing error: {e}"),
            Self::Malformed(msg) => write!(f, "malformed token response: {msg}"),
        }
    }
}

impl std::error::Error for TokenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Jwt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TokenError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Jwt(e)
    }
}
