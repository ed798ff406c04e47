//! Child command supervision: spawn with the bridge environment, mirror the
//! exit code, forward termination signals.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::error::BridgeError;
use crate::signal;

/// Grace period between SIGTERM and SIGKILL when the launcher is stopped.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// Runs `command` with `env` added to the inherited environment, wired to
/// the launcher's stdio, and returns the exit code to mirror.
///
/// A SIGINT or SIGTERM to the launcher is passed on to the child as
/// SIGTERM; if the child ignores it for [`TERM_GRACE`], it is killed.
pub async fn run_supervised(
    command: &[String],
    env: Vec<(String, String)>,
) -> Result<i32, BridgeError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| BridgeError::Config("no command given".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }

    tracing::info!(command = %program, "Starting child command");
    let mut child = cmd
        .spawn()
        .map_err(|e| BridgeError::Child(format!("start {program}: {e}")))?;

    let status = tokio::select! {
        status = child.wait() => {
            status.map_err(|e| BridgeError::Child(format!("wait for {program}: {e}")))?
        }
        _ = signal::shutdown_signal() => {
            tracing::info!(command = %program, "Forwarding termination to child command");
            kill_gracefully(&mut child, program)
                .await
                .map_err(|e| BridgeError::Child(format!("stop {program}: {e}")))?
        }
    };

    tracing::info!(command = %program, code = exit_code(&status), "Child command finished");
    Ok(exit_code(&status))
}

/// Send SIGTERM and wait up to [`TERM_GRACE`] for a clean exit; escalate to
/// SIGKILL if needed. Returns the child's final exit status.
///
/// On non-Unix platforms SIGTERM is not available, so we go straight to the
/// kill.
async fn kill_gracefully(child: &mut Child, program: &str) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill as nix_kill, Signal};
        use nix::unistd::Pid;
        let _ = nix_kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        match tokio::time::timeout(TERM_GRACE, child.wait()).await {
            Ok(status) => return status,
            Err(_) => {
                tracing::warn!(command = %program, "SIGTERM ignored, escalating to SIGKILL")
            }
        }
    }

    // SIGKILL fallback (also the only path on non-Unix).
    if let Err(e) = child.start_kill() {
        tracing::warn!(command = %program, error = %e, "Failed to kill child command");
    }
    child.wait().await
}

/// Exit code to mirror: the child's own code when it exited, the shell
/// convention `128 + signal` when a signal ended it, 1 otherwise.
fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn mirrors_the_child_exit_code() {
        assert_eq!(run_supervised(&shell("exit 0"), vec![]).await.unwrap(), 0);
        assert_eq!(run_supervised(&shell("exit 7"), vec![]).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn passes_environment_to_the_child() {
        let env = vec![("ARA_API_CLIENT".to_string(), "http".to_string())];
        let code = run_supervised(&shell(r#"test "$ARA_API_CLIENT" = http"#), env)
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn unknown_program_is_a_start_error() {
        let command = vec!["definitely-not-a-real-binary-4731".to_string()];
        let err = run_supervised(&command, vec![]).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("start definitely-not-a-real-binary-4731:"));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = run_supervised(&[], vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "no command given");
    }

    #[cfg(unix)]
    #[test]
    fn exit_codes_follow_the_shell_convention() {
        use std::os::unix::process::ExitStatusExt;

        // Raw wait status: exit code lives in the high byte, a terminating
        // signal in the low bits.
        assert_eq!(exit_code(&ExitStatus::from_raw(7 << 8)), 7);
        assert_eq!(exit_code(&ExitStatus::from_raw(15)), 128 + 15);
        assert_eq!(exit_code(&ExitStatus::from_raw(9)), 128 + 9);
    }
}
