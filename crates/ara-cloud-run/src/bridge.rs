//! Bridge lifecycle: bind, serve, self-test, child environment, teardown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ara_gcp_auth::IdTokenSource;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::child;
use crate::config::Config;
use crate::error::BridgeError;
use crate::gatekeeper::{self, BridgeState};
use crate::secret;

/// Upstream requests hang at most this long before the forwarder reports a
/// synthetic 500.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// The startup round-trip gets one attempt within this window.
const SELF_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A bridge that is bound and serving on the loopback interface.
pub struct RunningBridge {
    pub local_addr: SocketAddr,
    pub shared_secret: String,
    serve_task: JoinHandle<()>,
}

/// Binds `127.0.0.1:0`, generates the per-run secret, and starts serving.
///
/// The listener stays strictly loopback; the kernel-assigned port is
/// reported back through [`RunningBridge::local_addr`].
pub async fn serve<S>(origin_base: String, token_source: Arc<S>) -> Result<RunningBridge, BridgeError>
where
    S: IdTokenSource + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(BridgeError::Bind)?;
    let local_addr = listener.local_addr().map_err(BridgeError::Bind)?;
    let shared_secret = secret::generate();

    let http = reqwest::Client::builder()
        .timeout(FORWARD_TIMEOUT)
        .build()
        .map_err(BridgeError::HttpClient)?;

    let state = BridgeState {
        origin_base,
        shared_secret: shared_secret.clone(),
        token_source,
        http,
    };
    let serve_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, gatekeeper::router(state)).await {
            tracing::error!(error = %e, "Local bridge server exited");
        }
    });

    tracing::info!(addr = %local_addr, "Local bridge listening");

    Ok(RunningBridge {
        local_addr,
        shared_secret,
        serve_task,
    })
}

impl RunningBridge {
    /// Local endpoint in URL form, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// One authenticated `GET /api/` through the whole chain before the
    /// child is allowed to run. Anything but 200 is a launch failure: the
    /// child would only produce confusing per-request errors later.
    pub async fn self_test(&self) -> Result<(), BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(SELF_TEST_TIMEOUT)
            .build()
            .map_err(BridgeError::HttpClient)?;
        let resp = client
            .get(format!("{}/api/", self.base_url()))
            .basic_auth(secret::USERNAME, Some(&self.shared_secret))
            .send()
            .await
            .map_err(|e| BridgeError::SelfTest(format!("send request to ARA API: {e}")))?;

        if resp.status() != StatusCode::OK {
            return Err(BridgeError::SelfTest(format!(
                "ara API returns unexpected status code({})",
                resp.status().as_u16()
            )));
        }
        tracing::debug!("Self-test against the ARA API passed");
        Ok(())
    }

    /// Environment the child needs to reach ARA through the bridge.
    pub fn child_env(&self) -> Vec<(String, String)> {
        vec![
            ("ARA_API_CLIENT".to_string(), "http".to_string()),
            ("ARA_API_SERVER".to_string(), self.base_url()),
            ("ARA_API_USERNAME".to_string(), secret::USERNAME.to_string()),
            ("ARA_API_PASSWORD".to_string(), self.shared_secret.clone()),
        ]
    }

    /// Stops accepting connections. In-flight requests are dropped; by the
    /// time this is called the child has already exited.
    pub fn shutdown(&self) {
        self.serve_task.abort();
    }
}

/// Full launcher flow: serve, self-test, run the child, tear down. Returns
/// the exit code the launcher process should exit with.
pub async fn run<S>(config: &Config, token_source: Arc<S>) -> Result<i32, BridgeError>
where
    S: IdTokenSource + 'static,
{
    let bridge = serve(config.origin_base(), token_source).await?;

    if let Err(e) = bridge.self_test().await {
        bridge.shutdown();
        return Err(e);
    }

    let exit_code = child::run_supervised(&config.command, bridge.child_env()).await;
    bridge.shutdown();
    exit_code
}
