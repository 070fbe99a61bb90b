//! Startup probe
//!
//! Launches a service under a deadline and classifies what happened. The
//! services probed here are meant to run forever, so a launch that is still
//! going when the deadline fires counts as a successful start.

use std::fmt;
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::service::ServiceHandle;

/// Result of racing a launch against its deadline
#[derive(Debug)]
pub enum LaunchResult {
    /// The run operation returned `Ok` before the deadline
    Completed,
    /// The run operation failed before the deadline
    Errored(anyhow::Error),
    /// The deadline elapsed while the run operation was still active
    TimedOut,
}

/// Race `launch` against `deadline`.
///
/// When the timer wins the launch future is dropped, which is all the
/// cancellation the probe performs.
pub async fn launch_under_deadline<F>(launch: F, deadline: Duration) -> LaunchResult
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        biased;

        result = launch => match result {
            Ok(()) => LaunchResult::Completed,
            Err(e) => LaunchResult::Errored(e),
        },
        _ = tokio::time::sleep(deadline) => LaunchResult::TimedOut,
    }
}

/// Classification of one probe run
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Still running at the deadline (success)
    TimedOut,
    /// Returned cleanly before the deadline (success)
    Completed,
    /// The run operation failed
    LaunchFailed(anyhow::Error),
    /// The service handle could not be acquired
    SetupFailed(anyhow::Error),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::TimedOut | ProbeOutcome::Completed)
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::TimedOut => "timed_out",
            ProbeOutcome::Completed => "completed",
            ProbeOutcome::LaunchFailed(_) => "launch_failed",
            ProbeOutcome::SetupFailed(_) => "setup_failed",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::TimedOut => write!(f, "started (still running at deadline)"),
            ProbeOutcome::Completed => write!(f, "started (exited cleanly before deadline)"),
            ProbeOutcome::LaunchFailed(e) => write!(f, "launch failed: {:#}", e),
            ProbeOutcome::SetupFailed(e) => write!(f, "setup failed: {:#}", e),
        }
    }
}

/// One-shot startup check for a long-running service
#[derive(Debug, Clone)]
pub struct StartupProbe {
    config: ProbeConfig,
}

impl StartupProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Resolve a service with `resolve`, launch it under the deadline and
    /// write status lines to `out`.
    ///
    /// `resolve` runs after the configuration echo; if it fails the service
    /// is never launched.
    #[instrument(skip_all, fields(timeout_seconds = self.config.timeout_seconds))]
    pub async fn run<R, W>(&self, resolve: R, out: &mut W) -> ProbeOutcome
    where
        R: FnOnce() -> anyhow::Result<Box<dyn ServiceHandle>>,
        W: Write,
    {
        let launch = &self.config.launch;

        emit(out, format_args!("🔧 Testing MCP server startup..."));
        emit(out, format_args!("Transport: {}", launch.transport));
        emit(out, format_args!("Host: {}", launch.host));
        emit(out, format_args!("Port: {}", launch.port));

        let handle = match resolve() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to resolve service: {:#}", e);
                emit(out, format_args!("❌ Failed to test startup: {:#}", e));
                emit(out, format_args!("{:?}", e));
                return ProbeOutcome::SetupFailed(e);
            }
        };

        emit(out, format_args!("✅ Successfully resolved service"));
        emit(out, format_args!("✅ Server name: {}", handle.name()));
        emit(out, format_args!("✅ Server type: {}", handle.type_name()));
        info!(
            name = handle.name(),
            type_name = handle.type_name(),
            "Service handle resolved"
        );

        emit(
            out,
            format_args!(
                "🚀 Attempting to start server (will timeout after {} seconds)...",
                self.config.timeout_seconds
            ),
        );

        let outcome =
            match launch_under_deadline(handle.run(launch), self.config.timeout()).await {
                LaunchResult::TimedOut => {
                    emit(
                        out,
                        format_args!("✅ Server started successfully (timed out as expected)"),
                    );
                    ProbeOutcome::TimedOut
                }
                LaunchResult::Completed if self.config.require_running_at_deadline => {
                    let e = anyhow::anyhow!("service exited before the deadline");
                    emit(out, format_args!("❌ Server failed to start: {}", e));
                    ProbeOutcome::LaunchFailed(e)
                }
                LaunchResult::Completed => {
                    emit(
                        out,
                        format_args!("✅ Server exited cleanly before the deadline"),
                    );
                    ProbeOutcome::Completed
                }
                LaunchResult::Errored(e) => {
                    let category = e
                        .downcast_ref::<ProbeError>()
                        .map_or("launch", ProbeError::category);
                    warn!(category, "Service run failed before the deadline");
                    emit(out, format_args!("❌ Server failed to start: {:#}", e));
                    ProbeOutcome::LaunchFailed(e)
                }
            };

        if outcome.is_success() {
            info!(outcome = outcome.label(), "Startup probe passed");
        } else {
            error!(outcome = outcome.label(), "Startup probe failed: {}", outcome);
        }

        outcome
    }
}

fn emit<W: Write>(out: &mut W, line: fmt::Arguments<'_>) {
    if let Err(e) = writeln!(out, "{}", line) {
        warn!("Failed to write probe output: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchConfig;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum Behavior {
        Forever,
        FailImmediately,
        ReturnImmediately,
    }

    struct FakeService {
        behavior: Behavior,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ServiceHandle for FakeService {
        fn name(&self) -> &str {
            "fake-mcp"
        }

        fn type_name(&self) -> &'static str {
            "FakeService"
        }

        async fn run(&self, _launch: &LaunchConfig) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Forever => std::future::pending().await,
                Behavior::FailImmediately => Err(anyhow::anyhow!("port in use")),
                Behavior::ReturnImmediately => Ok(()),
            }
        }
    }

    fn fast_probe() -> StartupProbe {
        StartupProbe::new(ProbeConfig {
            timeout_seconds: 1,
            ..Default::default()
        })
    }

    async fn probe_with(
        probe: &StartupProbe,
        behavior: Behavior,
        runs: &Arc<AtomicUsize>,
    ) -> (ProbeOutcome, String) {
        let mut out = Vec::new();
        let runs = Arc::clone(runs);
        let outcome = probe
            .run(
                move || Ok(Box::new(FakeService { behavior, runs }) as Box<dyn ServiceHandle>),
                &mut out,
            )
            .await;
        (outcome, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_running_service_times_out_as_success() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (outcome, output) = probe_with(&fast_probe(), Behavior::Forever, &runs).await;

        assert_matches!(outcome, ProbeOutcome::TimedOut);
        assert_eq!(outcome.exit_code(), 0);
        assert!(output.contains("timed out as expected"));
        assert!(output.contains("Server name: fake-mcp"));
        assert!(output.contains("Server type: FakeService"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_error_fails() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (outcome, output) = probe_with(&fast_probe(), Behavior::FailImmediately, &runs).await;

        assert_matches!(outcome, ProbeOutcome::LaunchFailed(_));
        assert_eq!(outcome.exit_code(), 1);
        assert!(output.contains("port in use"));
    }

    #[tokio::test]
    async fn test_setup_failure_never_launches() {
        let probe = fast_probe();
        let mut out = Vec::new();

        let outcome = probe
            .run(
                || {
                    Err(anyhow::anyhow!("No module named 'mcp_atlassian'")
                        .context("Failed to resolve service"))
                },
                &mut out,
            )
            .await;

        let output = String::from_utf8(out).unwrap();
        assert_matches!(outcome, ProbeOutcome::SetupFailed(_));
        assert_eq!(outcome.exit_code(), 1);
        assert!(output.contains("Failed to test startup"));
        // Debug formatting prints the full cause chain
        assert!(output.contains("Caused by:"));
        assert!(output.contains("No module named 'mcp_atlassian'"));
        assert!(!output.contains("Attempting to start server"));
    }

    #[tokio::test]
    async fn test_early_clean_return_is_success() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (outcome, output) =
            probe_with(&fast_probe(), Behavior::ReturnImmediately, &runs).await;

        assert_matches!(outcome, ProbeOutcome::Completed);
        assert_eq!(outcome.exit_code(), 0);
        assert!(output.contains("exited cleanly"));
    }

    #[tokio::test]
    async fn test_require_running_rejects_early_return() {
        let probe = StartupProbe::new(ProbeConfig {
            timeout_seconds: 1,
            require_running_at_deadline: true,
            ..Default::default()
        });
        let runs = Arc::new(AtomicUsize::new(0));
        let (outcome, output) = probe_with(&probe, Behavior::ReturnImmediately, &runs).await;

        assert_matches!(outcome, ProbeOutcome::LaunchFailed(_));
        assert!(output.contains("exited before the deadline"));
    }

    #[tokio::test]
    async fn test_repeated_runs_classify_the_same() {
        let probe = fast_probe();
        let runs = Arc::new(AtomicUsize::new(0));

        let (first, _) = probe_with(&probe, Behavior::FailImmediately, &runs).await;
        let (second, _) = probe_with(&probe, Behavior::FailImmediately, &runs).await;

        assert_eq!(first.label(), second.label());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_config_echo() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (_, output) = probe_with(&fast_probe(), Behavior::ReturnImmediately, &runs).await;

        assert!(output.contains("Transport: sse"));
        assert!(output.contains("Host: 0.0.0.0"));
        assert!(output.contains("Port: 8000"));
        assert!(output.contains("will timeout after 1 seconds"));
    }

    #[tokio::test]
    async fn test_immediate_error_wins_race() {
        let result = launch_under_deadline(
            async { Err(anyhow::anyhow!("boom")) },
            Duration::from_millis(0),
        )
        .await;
        assert_matches!(result, LaunchResult::Errored(e) if e.to_string() == "boom");
    }

    #[tokio::test]
    async fn test_slow_launch_times_out() {
        let result = launch_under_deadline(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            },
            Duration::from_millis(20),
        )
        .await;
        assert_matches!(result, LaunchResult::TimedOut);
    }
}
