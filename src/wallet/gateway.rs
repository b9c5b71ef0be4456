//! Command gateway for the external wallet binary.
//!
//! Owns executable discovery, argument assembly, and subprocess lifecycle.
//! A non-zero exit from the binary is data, not an error: callers get the
//! full [`RawResult`] and classification is deferred to the interpreter.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use uuid::Uuid;

use crate::error::GatewayError;

/// Base name of the wallet binary, without the platform suffix.
pub const WALLET_BIN_NAME: &str = "bark";

/// Raw output of one wallet invocation. Immutable once produced.
#[derive(Debug, Clone)]
pub struct RawResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Whether the process itself exited with status zero. Not the same
    /// as the operation having failed; see the interpreter.
    pub process_succeeded: bool,
}

impl RawResult {
    fn from_output(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            process_succeeded: output.status.success(),
        }
    }

    /// The failure detail a dead process leaves behind: stderr if it said
    /// anything, otherwise the exit status.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("process exited with code {}", self.exit_code)
        } else {
            stderr.to_string()
        }
    }
}

/// Handle on the resolved wallet binary.
///
/// Stateless beyond the resolved paths; one instance is shared by all
/// request handlers. Concurrent invocations are not serialized here: the
/// external wallet's own store is the arbiter of racing mutations.
#[derive(Debug, Clone)]
pub struct WalletCli {
    executable: PathBuf,
    datadir: PathBuf,
    default_timeout: Duration,
}

impl WalletCli {
    /// Resolve the wallet binary once at startup.
    ///
    /// Preference order: explicit override, a binary sitting next to the
    /// server executable, then the `PATH`.
    pub fn locate(
        override_path: Option<PathBuf>,
        datadir: PathBuf,
        default_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let executable = resolve_executable(override_path)?;
        Ok(Self {
            executable,
            datadir,
            default_timeout,
        })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Run one wallet invocation to completion and capture its output.
    ///
    /// `operation` is a short label used in logs and timeout errors.
    /// User-supplied values must arrive as discrete `args` elements; they
    /// are never joined into a shell string.
    pub async fn execute(
        &self,
        operation: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<RawResult, GatewayError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let mut child = self
            .command(args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        tracing::debug!(%operation, args = ?args, "wallet invocation started");

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| GatewayError::Timeout {
                operation: operation.to_string(),
                timeout,
            })??;

        let raw = RawResult::from_output(output);
        tracing::debug!(
            %operation,
            exit_code = raw.exit_code,
            stdout_bytes = raw.stdout.len(),
            stderr_bytes = raw.stderr.len(),
            "wallet invocation finished"
        );
        Ok(raw)
    }

    /// Start a long-running invocation without waiting for it.
    ///
    /// Returns an invocation id immediately; the eventual outcome is only
    /// observable in the logs. Once started the process runs to completion
    /// independent of any client connection.
    pub fn execute_detached(
        &self,
        operation: &str,
        args: &[String],
    ) -> Result<Uuid, GatewayError> {
        let child = self.command(args).spawn().map_err(|e| self.spawn_error(e))?;
        let id = Uuid::new_v4();
        let operation = operation.to_string();
        tracing::info!(invocation = %id, %operation, args = ?args, "detached wallet invocation started");

        tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) => {
                    let raw = RawResult::from_output(output);
                    if raw.process_succeeded {
                        tracing::info!(invocation = %id, %operation, "detached wallet invocation finished");
                    } else {
                        tracing::error!(
                            invocation = %id,
                            %operation,
                            exit_code = raw.exit_code,
                            stderr = %raw.stderr.trim(),
                            "detached wallet invocation failed"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(invocation = %id, %operation, error = %e, "detached wallet invocation lost");
                }
            }
        });

        Ok(id)
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("--datadir")
            .arg(&self.datadir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> GatewayError {
        if source.kind() == std::io::ErrorKind::NotFound {
            GatewayError::ExecutableNotFound {
                name: self.executable.display().to_string(),
            }
        } else {
            GatewayError::SpawnFailed {
                program: self.executable.clone(),
                source,
            }
        }
    }
}

fn resolve_executable(override_path: Option<PathBuf>) -> Result<PathBuf, GatewayError> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path);
        }
        return Err(GatewayError::ExecutableNotFound {
            name: path.display().to_string(),
        });
    }

    let name = format!("{WALLET_BIN_NAME}{}", std::env::consts::EXE_SUFFIX);

    // A binary shipped next to the server wins over whatever is on PATH.
    if let Ok(current) = std::env::current_exe() {
        if let Some(dir) = current.parent() {
            let adjacent = dir.join(&name);
            if adjacent.is_file() {
                return Ok(adjacent);
            }
        }
    }

    search_path(&name).ok_or(GatewayError::ExecutableNotFound { name })
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(executable: &Path) -> WalletCli {
        WalletCli {
            executable: executable.to_path_buf(),
            datadir: PathBuf::from("/tmp/arkdeck-test-datadir"),
            default_timeout: Duration::from_secs(5),
        }
    }

    #[cfg(unix)]
    fn stub_script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("bark");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_data_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = stub_script(dir.path(), "echo noise; echo 'bad things' >&2; exit 3");
        let raw = cli_for(&script)
            .execute("balance", &[], None)
            .await
            .expect("non-zero exit must not error");

        assert!(!raw.process_succeeded);
        assert_eq!(raw.exit_code, 3);
        assert!(raw.stdout.contains("noise"));
        assert_eq!(raw.failure_detail(), "bad things");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let script = stub_script(dir.path(), "sleep 30");
        let err = cli_for(&script)
            .execute("refresh", &[], Some(Duration::from_millis(100)))
            .await
            .expect_err("must time out");

        match err {
            GatewayError::Timeout { operation, .. } => assert_eq!(operation, "refresh"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_executable_is_reported() {
        let cli = cli_for(Path::new("/nonexistent/arkdeck-test/bark"));
        let err = cli
            .execute("balance", &[], None)
            .await
            .expect_err("must fail to spawn");
        assert!(matches!(err, GatewayError::ExecutableNotFound { .. }));
    }

    #[test]
    fn explicit_override_must_exist() {
        let err = resolve_executable(Some(PathBuf::from("/nonexistent/arkdeck-test/bark")))
            .expect_err("missing override must be rejected");
        assert!(matches!(err, GatewayError::ExecutableNotFound { .. }));
    }
}
