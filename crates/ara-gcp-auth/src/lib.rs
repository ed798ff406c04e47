//! Google identity-token sources for the ARA Cloud Run bridge.
//!
//! The bridge attaches a fresh OIDC identity token to every request it
//! forwards to Cloud Run. This crate owns the minting: directly from the
//! ambient application default credentials, or by impersonating another
//! service account through the IAM Credentials API.
//!
//! # Quick Start
//!
//! ```rust
//! use ara_gcp_auth::{IdTokenSource, StaticTokenSource};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let source = StaticTokenSource::new("T1");
//!
//! let token = source.id_token().await.unwrap();
//! assert_eq!(token, "T1");
//! # }
//! ```
//!
//! Production code uses [`GoogleIdTokenSource`], selected once at startup:
//!
//! ```rust,no_run
//! use ara_gcp_auth::GoogleIdTokenSource;
//!
//! # fn main() -> Result<(), ara_gcp_auth::TokenError> {
//! // Ambient credentials (key file or metadata server):
//! let direct = GoogleIdTokenSource::new("https://ara-api-xxxx.a.run.app/")?;
//!
//! // Minting as another service account:
//! let impersonated = GoogleIdTokenSource::impersonated(
//!     "https://ara-api-xxxx.a.run.app/",
//!     "ara-invoker@my-project.iam.gserviceaccount.com",
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod error;
pub mod google;
pub mod source;
pub mod testing;

pub use credentials::Credentials;
pub use error::TokenError;
pub use google::GoogleIdTokenSource;
pub use source::IdTokenSource;
pub use testing::{FailingTokenSource, StaticTokenSource, StubTokenError};
