//! Shell command execution for `execute:` directives
//!
//! Runs through the platform shell in a scratch directory with a hard
//! timeout. Output is always returned as text; failures never propagate.

use crate::tools::security::{check_command, BLOCKED_MESSAGE};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default deadline for `execute:` commands
pub const SHELL_TIMEOUT_SECS: u64 = 30;

/// Run `command` through the shell and render the outcome as text
///
/// - success: stdout, or `Command executed successfully` when empty
/// - non-zero exit: `Error (code N): <stderr>`
/// - timeout: `Error: Command timed out`
pub async fn run_shell_command(command: &str, timeout_seconds: u64, cwd: &Path) -> String {
    if let Some(pattern) = check_command(command) {
        warn!(command = %command, pattern, "Blocked shell command");
        return BLOCKED_MESSAGE.to_string();
    }

    let mut cmd = shell_command(command);
    cmd.current_dir(cwd).kill_on_drop(true);

    debug!(command = %command, timeout_seconds, "Running shell command");

    match timeout(Duration::from_secs(timeout_seconds), cmd.output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            if output.status.success() {
                if stdout.is_empty() {
                    "Command executed successfully".to_string()
                } else {
                    stdout
                }
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let code = output.status.code().unwrap_or(-1);
                format!("Error (code {}): {}", code, stderr)
            }
        }
        Ok(Err(e)) => format!("Error: {}", e),
        Err(_) => {
            warn!(command = %command, timeout_seconds, "Shell command timed out");
            "Error: Command timed out".to_string()
        }
    }
}

fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    }
    #[cfg(not(windows))]
    {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn scratch() -> std::path::PathBuf {
        std::env::temp_dir()
    }

    #[tokio::test]
    async fn test_echo() {
        let out = run_shell_command("echo hello", 5, &scratch()).await;
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_empty_output() {
        let out = run_shell_command("true", 5, &scratch()).await;
        assert_eq!(out, "Command executed successfully");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let out = run_shell_command("echo oops >&2; exit 3", 5, &scratch()).await;
        assert!(out.starts_with("Error (code 3):"));
        assert!(out.contains("oops"));
    }

    #[tokio::test]
    async fn test_blocked() {
        let out = run_shell_command("rm -rf /tmp/nothing-here", 5, &scratch()).await;
        assert_eq!(out, BLOCKED_MESSAGE);
    }

    #[tokio::test]
    async fn test_timeout() {
        let out = run_shell_command("sleep 5", 1, &scratch()).await;
        assert_eq!(out, "Error: Command timed out");
    }
}
