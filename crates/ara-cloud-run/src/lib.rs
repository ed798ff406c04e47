//! Local authenticating bridge for an ARA API hosted on Cloud Run.
//!
//! `ansible-playbook` (via the ARA callback plugin) can only do basic auth,
//! while a locked-down Cloud Run service wants a Google identity token on
//! every request. This crate runs a loopback proxy between the two for the
//! lifetime of one child command:
//!
//! ```text
//! ansible-playbook ──basic auth──▶ 127.0.0.1:<random> ──Bearer <token>──▶ Cloud Run
//!                                  (gatekeeper + forwarder)
//! ```
//!
//! The child learns the endpoint and the per-run shared secret through
//! `ARA_API_*` environment variables; nothing long-lived is written to disk.

pub mod bridge;
pub mod child;
pub mod config;
pub mod error;
pub mod forward;
pub mod gatekeeper;
pub mod secret;
pub mod signal;

pub use config::Config;
pub use error::BridgeError;
