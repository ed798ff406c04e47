//! Identity-token minting against Google endpoints.
//!
//! Three flows are supported, matching what Application Default Credentials
//! can carry:
//!
//! * the metadata server identity endpoint (GCE, GKE, Cloud Run workloads),
//! * a service-account key file, signing a JWT-bearer assertion locally,
//! * impersonation through the IAM Credentials `generateIdToken` API.
//!
//! Minted tokens are cached until shortly before their `exp` claim so a
//! burst of forwarded requests does not become a burst of token requests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::credentials::{Credentials, ServiceAccountKey, DEFAULT_TOKEN_URI};
use crate::error::TokenError;
use crate::source::IdTokenSource;

// ── Endpoints ──────────────────────────────────────────────────────────────────

const METADATA_BASE: &str = "http://metadata.google.internal";
const IAM_CREDENTIALS_BASE: &str = "https://iamcredentials.googleapis.com";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Signed assertions are valid for an hour, the maximum Google accepts.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Cached tokens are reused until this close to their expiry.
const EXPIRY_MARGIN_SECS: i64 = 30;

// ── Source ─────────────────────────────────────────────────────────────────────

/// [`IdTokenSource`] backed by Google credentials.
///
/// The flow is fixed at construction time from the discovered (or supplied)
/// credentials; every [`id_token`](IdTokenSource::id_token) call after that
/// either returns the cached token or mints a new one. Concurrent callers
/// serialize on the cache, so a cold start mints exactly once.
pub struct GoogleIdTokenSource {
    audience: String,
    flavor: Flavor,
    http: Client,
    metadata_base: String,
    iam_base: String,
    oauth_token_uri: String,
    cached: Mutex<Option<CachedToken>>,
}

enum Flavor {
    /// Ask the metadata server for an identity token.
    Metadata,
    /// Sign a JWT-bearer assertion with a local key file.
    KeyFile(ServiceAccountKey),
    /// Mint through the IAM Credentials API as `principal`, authenticating
    /// with an access token from `source`.
    Impersonated {
        principal: String,
        source: Credentials,
    },
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl GoogleIdTokenSource {
    /// Builds a source for `audience` from discovered ADC.
    ///
    /// Fails when no usable credentials are found, or when the discovered
    /// credentials are a `gcloud auth application-default login` user, which
    /// cannot mint identity tokens without impersonation.
    pub fn new(audience: &str) -> Result<Self, TokenError> {
        Self::with_credentials(audience, Credentials::discover()?)
    }

    /// Like [`new`](Self::new) with explicit credentials.
    pub fn with_credentials(audience: &str, credentials: Credentials) -> Result<Self, TokenError> {
        let flavor = match credentials {
            Credentials::ServiceAccount(key) => Flavor::KeyFile(key),
            Credentials::MetadataServer => Flavor::Metadata,
            Credentials::AuthorizedUser(_) => {
                return Err(TokenError::Unsupported {
                    credential_type: "authorized_user".to_string(),
                })
            }
        };
        Ok(Self::from_flavor(audience, flavor))
    }

    /// Builds a source that mints tokens as `principal` via the IAM
    /// Credentials API, authenticating with discovered ADC. Any credential
    /// type works here, user credentials included.
    pub fn impersonated(audience: &str, principal: &str) -> Result<Self, TokenError> {
        Ok(Self::impersonated_with_credentials(
            audience,
            principal,
            Credentials::discover()?,
        ))
    }

    /// Like [`impersonated`](Self::impersonated) with explicit credentials.
    pub fn impersonated_with_credentials(
        audience: &str,
        principal: &str,
        credentials: Credentials,
    ) -> Self {
        Self::from_flavor(
            audience,
            Flavor::Impersonated {
                principal: principal.to_string(),
                source: credentials,
            },
        )
    }

    fn from_flavor(audience: &str, flavor: Flavor) -> Self {
        // GCE_METADATA_HOST is the standard override honored by Google
        // client libraries.
        let metadata_base = std::env::var("GCE_METADATA_HOST")
            .map(|host| format!("http://{host}"))
            .unwrap_or_else(|_| METADATA_BASE.to_string());
        Self {
            audience: audience.to_string(),
            flavor,
            http: Client::new(),
            metadata_base,
            iam_base: IAM_CREDENTIALS_BASE.to_string(),
            oauth_token_uri: DEFAULT_TOKEN_URI.to_string(),
            cached: Mutex::new(None),
        }
    }

    // ── Endpoint overrides (used by tests) ─────────────────────────────────────

    pub fn with_metadata_base(mut self, base: impl Into<String>) -> Self {
        self.metadata_base = base.into();
        self
    }

    pub fn with_iam_base(mut self, base: impl Into<String>) -> Self {
        self.iam_base = base.into();
        self
    }

    pub fn with_oauth_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.oauth_token_uri = uri.into();
        self
    }

    // ── Flows ──────────────────────────────────────────────────────────────────

    async fn mint(&self) -> Result<String, TokenError> {
        match &self.flavor {
            Flavor::Metadata => self.metadata_identity().await,
            Flavor::KeyFile(key) => self.key_file_identity(key).await,
            Flavor::Impersonated { principal, source } => {
                self.impersonated_identity(principal, source).await
            }
        }
    }

    async fn metadata_identity(&self) -> Result<String, TokenError> {
        tracing::debug!(audience = %self.audience, "Requesting identity token from metadata server");
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/identity",
            self.metadata_base
        );
        let resp = self
            .http
            .get(&url)
            .query(&[("audience", self.audience.as_str()), ("format", "full")])
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let resp = require_success("metadata server", resp).await?;
        Ok(resp.text().await?)
    }

    async fn key_file_identity(&self, key: &ServiceAccountKey) -> Result<String, TokenError> {
        tracing::debug!(
            audience = %self.audience,
            client_email = %key.client_email,
            "Minting identity token from service-account key file"
        );
        let assertion = sign_assertion(key, Some(self.audience.as_str()), None)?;
        let resp = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await?;
        extract_token_field("token endpoint", resp, "id_token").await
    }

    async fn impersonated_identity(
        &self,
        principal: &str,
        source: &Credentials,
    ) -> Result<String, TokenError> {
        tracing::debug!(
            audience = %self.audience,
            principal = %principal,
            "Minting identity token through the IAM Credentials API"
        );
        let access_token = self.access_token(source).await?;
        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:generateIdToken",
            self.iam_base, principal
        );
        let body = serde_json::json!({
            "audience": self.audience,
            "includeEmail": true,
        });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        extract_token_field("IAM credentials API", resp, "token").await
    }

    /// OAuth access token for calling the IAM Credentials API.
    async fn access_token(&self, source: &Credentials) -> Result<String, TokenError> {
        match source {
            Credentials::MetadataServer => {
                let url = format!(
                    "{}/computeMetadata/v1/instance/service-accounts/default/token",
                    self.metadata_base
                );
                let resp = self
                    .http
                    .get(&url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;
                extract_token_field("metadata server", resp, "access_token").await
            }
            Credentials::ServiceAccount(key) => {
                let assertion = sign_assertion(key, None, Some(CLOUD_PLATFORM_SCOPE))?;
                let resp = self
                    .http
                    .post(&key.token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
                    .send()
                    .await?;
                extract_token_field("token endpoint", resp, "access_token").await
            }
            Credentials::AuthorizedUser(user) => {
                let resp = self
                    .http
                    .post(&self.oauth_token_uri)
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("client_id", user.client_id.as_str()),
                        ("client_secret", user.client_secret.as_str()),
                        ("refresh_token", user.refresh_token.as_str()),
                    ])
                    .send()
                    .await?;
                extract_token_field("token endpoint", resp, "access_token").await
            }
        }
    }
}

impl IdTokenSource for GoogleIdTokenSource {
    type Error = TokenError;

    async fn id_token(&self) -> Result<String, TokenError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) < entry.expires_at {
                return Ok(entry.token.clone());
            }
        }

        let token = self.mint().await?;
        *cached = decode_jwt_expiry(&token).map(|expires_at| CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }
}

// ── JWT helpers ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_audience: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

/// Signs the JWT-bearer assertion exchanged at the key's token endpoint.
/// `target_audience` requests an identity token, `scope` an access token.
fn sign_assertion(
    key: &ServiceAccountKey,
    target_audience: Option<&str>,
    scope: Option<&str>,
) -> Result<String, TokenError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.private_key_id.clone());

    let now = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        sub: &key.client_email,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
        target_audience,
        scope,
    };

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(&header, &claims, &signing_key)?)
}

/// Best-effort read of the `exp` claim. Opaque tokens yield `None` and are
/// simply not cached.
fn decode_jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.get("exp")?.as_i64()?, 0)
}

// ── Response handling ──────────────────────────────────────────────────────────

async fn require_success(
    endpoint: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, TokenError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(TokenError::Status {
        endpoint,
        status,
        body,
    })
}

async fn extract_token_field(
    endpoint: &'static str,
    resp: reqwest::Response,
    field: &str,
) -> Result<String, TokenError> {
    let resp = require_success(endpoint, resp).await?;
    let json: Value = resp.json().await?;
    json.get(field)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| TokenError::Malformed(format!("missing {field:?} in {endpoint} response")))
}
