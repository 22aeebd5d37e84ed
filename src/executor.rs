use crate::{Result, ScanError};
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Runs external commands for the scan layer.
///
/// `command[0]` names the program. Implementations return the exit code on
/// success and an error on a non-zero exit or when `timeout` elapses.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn execute(&self, command: &[String], timeout: Duration) -> Result<i32>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

#[async_trait]
impl ProcessExecutor for SystemExecutor {
    async fn execute(&self, command: &[String], limit: Duration) -> Result<i32> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ScanError::InvalidInput("empty command".to_string()))?;
        let executable =
            find_executable(program).ok_or_else(|| ScanError::ExecutableNotFound(program.clone()))?;
        let command_line = command.join(" ");

        debug!("Executing `{}` (timeout {:?})", command_line, limit);

        let mut process = Command::new(&executable);
        process.args(args).stdout(Stdio::null());

        let output = run_with_timeout(process, limit, &format!("`{}`", command_line)).await?;

        if !output.status.success() {
            return Err(ScanError::ProcessFailed {
                command: command_line,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.status.code().unwrap_or_default())
    }
}

/// Runs `command` to completion with stdin closed and stderr captured. The
/// child is killed when `limit` elapses. Stdout is captured unless the caller
/// already redirected it.
pub async fn run_with_timeout(mut command: Command, limit: Duration, operation: &str) -> Result<Output> {
    command
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match timeout(limit, command.output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(ScanError::Timeout {
            operation: operation.to_string(),
        }),
    }
}

/// Resolves a program name the way a shell would. Names containing a path
/// separator are checked as given, bare names are searched on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        executable_names(name)
            .into_iter()
            .map(|file| dir.join(file))
            .find(|path| is_executable(path))
    })
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string(), format!("{}.exe", name)]
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
