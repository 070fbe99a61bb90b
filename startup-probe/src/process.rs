//! External server executables as probe targets
//!
//! The service is started as a child process. Launch values reach it through
//! the child's own environment. Its stdout is redirected to our stderr so
//! stdout carries only status lines; its stderr is forwarded too and the
//! tail is kept so a failed start can say why.

use anyhow::Context;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::config::LaunchConfig;
use crate::error::{ProbeError, ProbeResult};
use crate::service::ServiceHandle;

/// Number of stderr lines kept for failure reports
const STDERR_TAIL_LINES: usize = 20;

/// How long to wait for the stderr reader once the child has exited
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A server binary launched as a child process
#[derive(Debug, Clone)]
pub struct ProcessService {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessService {
    /// Locate `program` and build a handle for it.
    ///
    /// Bare names are searched on `PATH`; anything containing a path
    /// separator is checked as given.
    pub fn resolve(program: &str, args: Vec<String>) -> ProbeResult<Self> {
        let path = find_executable(program).ok_or_else(|| {
            ProbeError::setup(format!("executable '{}' not found on PATH", program))
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string());

        debug!("Resolved {} to {}", program, path.display());

        Ok(Self {
            name,
            program: path,
            args,
        })
    }

    /// Resolved path of the executable
    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl ServiceHandle for ProcessService {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    #[instrument(skip(self, launch), fields(program = %self.program.display()))]
    async fn run(&self, launch: &LaunchConfig) -> anyhow::Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(launch.env_vars())
            .stdin(Stdio::null())
            .stdout(std::io::stderr())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program.display()))?;

        info!(pid = ?child.id(), "Service process started");

        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let reader = child.stderr.take().map(|stderr| {
            let tail = Arc::clone(&tail);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{}", line);
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            })
        });

        let status = child
            .wait()
            .await
            .map_err(ProbeError::from)
            .context("Failed to wait for service process")?;

        if let Some(reader) = reader {
            if timeout(STDERR_DRAIN_TIMEOUT, reader).await.is_err() {
                warn!("Service stderr still open after exit, report may be incomplete");
            }
        }

        if status.success() {
            info!("Service process exited cleanly");
            return Ok(());
        }

        let stderr_tail = tail
            .lock()
            .map(|lines| lines.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();

        let message = if stderr_tail.is_empty() {
            format!("{} exited with {}", self.name, status)
        } else {
            format!("{} exited with {}: {}", self.name, status, stderr_tail)
        };

        Err(ProbeError::launch(message).into())
    }
}

fn find_executable(program: &str) -> Option<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
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
