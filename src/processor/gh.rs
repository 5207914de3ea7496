//! Item processor driving the external `gh` binary

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::CloneConfig;
use crate::error::{Error, Result};

use super::{ItemProcessor, ProcessError, ProcessMode, ProcessRequest};

/// Clones with `gh repo clone` and syncs with `gh repo sync`
///
/// # Examples
///
/// ```no_run
/// use bulk_clone::processor::GhCliProcessor;
///
/// let processor = GhCliProcessor::from_path("upstream")
///     .expect("gh not found in PATH");
/// ```
pub struct GhCliProcessor {
    binary_path: PathBuf,
    upstream_remote_name: String,
}

impl GhCliProcessor {
    /// Create a processor with an explicit gh binary path
    pub fn new(binary_path: PathBuf, upstream_remote_name: impl Into<String>) -> Self {
        Self {
            binary_path,
            upstream_remote_name: upstream_remote_name.into(),
        }
    }

    /// Attempt to find gh in PATH
    pub fn from_path(upstream_remote_name: impl Into<String>) -> Option<Self> {
        which::which("gh")
            .ok()
            .map(|path| Self::new(path, upstream_remote_name))
    }

    /// Create a processor from configuration
    pub fn from_config(config: &CloneConfig) -> Result<Self> {
        let binary_path = locate_gh(config)?;
        Ok(Self::new(binary_path, config.upstream_remote_name.clone()))
    }

    /// Path of the gh binary in use
    pub fn binary_path(&self) -> &std::path::Path {
        &self.binary_path
    }

    /// Arguments for a clone of `request`
    pub fn clone_args(&self, request: &ProcessRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(7 + request.extra_args.len());
        args.push("repo".into());
        args.push("clone".into());
        args.push(request.item.as_str().into());
        args.push(request.target.clone().into_os_string());
        args.push("--upstream-remote-name".into());
        args.push(self.upstream_remote_name.clone().into());
        if !request.extra_args.is_empty() {
            args.push("--".into());
            args.extend(request.extra_args.iter().map(OsString::from));
        }
        args
    }

    async fn run(
        &self,
        mut command: Command,
        cancel: &CancellationToken,
    ) -> std::result::Result<Output, ProcessError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            ProcessError::Failed(format!(
                "failed to execute {}: {}",
                self.binary_path.display(),
                e
            ))
        })?;

        // Dropping the wait future drops the child, which kills it.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProcessError::Cancelled),
            output = child.wait_with_output() => output.map_err(|e| {
                ProcessError::Failed(format!("failed to wait for gh: {}", e))
            }),
        }
    }
}

#[async_trait]
impl ItemProcessor for GhCliProcessor {
    async fn process(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), ProcessError> {
        match request.mode {
            ProcessMode::Clone => {
                let mut command = Command::new(&self.binary_path);
                command.args(self.clone_args(request));

                let output = self.run(command, cancel).await?;
                if !output.status.success() {
                    return Err(ProcessError::Failed(format!(
                        "clone failed: {}: {}:\n{}",
                        request.item,
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
            }
            ProcessMode::Sync => {
                let mut command = Command::new(&self.binary_path);
                command.args(["repo", "sync"]).current_dir(&request.target);

                let output = self.run(command, cancel).await?;
                if !output.status.success() {
                    return Err(ProcessError::Failed(format!(
                        "sync failed: {}: {}:\n{}",
                        request.target.display(),
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gh-cli"
    }
}

/// Resolve the gh binary: explicit path first, then PATH if allowed
pub fn locate_gh(config: &CloneConfig) -> Result<PathBuf> {
    if let Some(path) = &config.gh_path {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(Error::config(
            "gh_path",
            format!("gh binary not found at {}", path.display()),
        ));
    }

    if !config.search_path {
        return Err(Error::NotSupported(
            "no gh path configured and PATH search disabled".to_string(),
        ));
    }

    which::which("gh")
        .map_err(|e| Error::NotSupported(format!("gh not found in PATH: {}", e)))
}
