//! Subprocess runtime for script plugins
//!
//! A script plugin is invoked as `<entry> <method>`. Arguments arrive twice:
//! as a JSON object on stdin and as `ALFRED_ARG_<KEY>` environment
//! variables. Stdout (trimmed) is the result.

use crate::errors::{AlfredError, Result};
use crate::tools::types::{Plugin, PluginArgs};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Environment prefix for named arguments
pub const ARG_ENV_PREFIX: &str = "ALFRED_ARG_";

/// Plugin backed by an executable entry file
#[derive(Debug, Clone)]
pub struct ScriptPlugin {
    name: String,
    entry: PathBuf,
    methods: Vec<String>,
}

impl ScriptPlugin {
    pub fn new(name: impl Into<String>, entry: impl Into<PathBuf>, methods: Vec<String>) -> Self {
        Self {
            name: name.into(),
            entry: entry.into(),
            methods,
        }
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }

    fn command(&self, method: &str) -> Command {
        let ext = self.entry.extension().and_then(|e| e.to_str()).unwrap_or("");
        let mut cmd = match ext {
            "sh" => {
                let mut c = Command::new("sh");
                c.arg(&self.entry);
                c
            }
            "py" => {
                let mut c = Command::new("python3");
                c.arg(&self.entry);
                c
            }
            _ => Command::new(&self.entry),
        };
        cmd.arg(method);
        if let Some(dir) = self.entry.parent() {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// `a-b.c` becomes `ALFRED_ARG_A_B_C`
pub fn arg_env_name(key: &str) -> String {
    let normalized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", ARG_ENV_PREFIX, normalized)
}

#[async_trait]
impl Plugin for ScriptPlugin {
    fn methods(&self) -> Vec<String> {
        self.methods.clone()
    }

    async fn call(&self, method: &str, args: &PluginArgs) -> Result<String> {
        let payload = serde_json::to_vec(args)?;

        let mut cmd = self.command(method);
        for (key, value) in args {
            cmd.env(arg_env_name(key), value);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(plugin = %self.name, method, entry = %self.entry.display(), "Spawning script plugin");

        let mut child = cmd.spawn().map_err(|e| {
            AlfredError::Execution(format!("failed to start plugin {}: {}", self.name, e))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A script that never reads stdin closes the pipe early; that is fine.
            let _ = stdin.write_all(&payload).await;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AlfredError::Execution(format!(
                "plugin {} method {} exited with code {}: {}",
                self.name,
                method,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_env_name() {
        assert_eq!(arg_env_name("a"), "ALFRED_ARG_A");
        assert_eq!(arg_env_name("file-name.ext"), "ALFRED_ARG_FILE_NAME_EXT");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_reads_env_and_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("echo.sh");
        std::fs::write(
            &entry,
            "case \"$1\" in\n  env) echo \"$ALFRED_ARG_WHO\" ;;\n  stdin) cat ;;\n  *) exit 4 ;;\nesac\n",
        )
        .unwrap();

        let plugin = ScriptPlugin::new("echo", &entry, vec!["env".into(), "stdin".into()]);
        let mut args = PluginArgs::new();
        args.insert("who".into(), "world".into());

        assert_eq!(plugin.call("env", &args).await.unwrap(), "world");
        assert_eq!(plugin.call("stdin", &args).await.unwrap(), r#"{"who":"world"}"#);

        let err = plugin.call("other", &args).await.unwrap_err();
        assert!(matches!(err, AlfredError::Execution(_)));
    }
}
