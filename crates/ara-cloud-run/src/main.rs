//! `ara-cloud-run` binary: run Ansible against an ARA API on Cloud Run.
//!
//! Starts the loopback bridge, self-tests it, then executes the given
//! command with `ARA_API_*` pointing at the bridge. The launcher exits with
//! the child's exit code.
//!
//! # Environment variables
//!
//! | Variable                                   | Description                                      |
//! |--------------------------------------------|--------------------------------------------------|
//! | `ARA_CLOUD_RUN_URL`                        | ARA API service URL (same as `--cloud-run-url`)  |
//! | `ARA_CLOUD_RUN_IMPERSONATE_SERVICE_ACCOUNT`| Service account to impersonate for tokens        |
//! | `GOOGLE_APPLICATION_CREDENTIALS`           | Key file override for credential discovery       |
//! | `RUST_LOG`                                 | Log filter (tracing-subscriber), default `info`  |

use std::sync::Arc;

use clap::Parser;

use ara_cloud_run::bridge;
use ara_cloud_run::config::Config;
use ara_cloud_run::error::BridgeError;
use ara_gcp_auth::GoogleIdTokenSource;

/// Running Ansible while using ARA hosted on Cloud Run
#[derive(Parser, Debug)]
#[command(
    name = "ara-cloud-run",
    version,
    about,
    long_about = "ara-cloud-run is a wrapper around the ansible command that sets up a \
                  reverse proxy to an ARA instance hosted on Google Cloud Run. Forwarded \
                  requests are authenticated with identity tokens minted from the ambient \
                  Google application default credentials.",
    after_help = "Example:\n  ara-cloud-run -u https://ara-api-xxxx.a.run.app -- ansible-playbook main.yaml"
)]
struct Args {
    /// URL of the ARA API service on Cloud Run
    #[arg(short = 'u', long, env = "ARA_CLOUD_RUN_URL")]
    cloud_run_url: Option<String>,

    /// Service account to impersonate when minting identity tokens
    #[arg(long, env = "ARA_CLOUD_RUN_IMPERSONATE_SERVICE_ACCOUNT")]
    impersonate_service_account: Option<String>,

    /// Command to run against the bridged ARA API, e.g. `ansible-playbook site.yml`
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<i32, BridgeError> {
    let config = Config::new(
        args.cloud_run_url,
        args.impersonate_service_account,
        args.command,
    )?;
    let audience = config.audience();

    match &config.impersonate_service_account {
        Some(principal) => {
            tracing::debug!(principal = %principal, "Minting tokens through impersonation");
            let source = GoogleIdTokenSource::impersonated(&audience, principal)?;
            bridge::run(&config, Arc::new(source)).await
        }
        None => {
            let source = GoogleIdTokenSource::new(&audience)?;
            bridge::run(&config, Arc::new(source)).await
        }
    }
}
