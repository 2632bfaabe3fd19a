//! Supervision of the prediction subprocess
//!
//! State machine: `Stopped → Starting → Polling → Ready | TimedOut`.
//! A readiness timeout is reported, never acted on: the child keeps running.
//! An exit watcher task owns the child, records how it ended and clears the
//! handle. There is no automatic restart.

use crate::config::PredictionConfig;
use crate::types::{MatchfeedError, Result};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Polling,
    Ready,
    TimedOut,
}

/// How the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when terminated by a signal
    pub code: Option<i32>,
    /// Ended through `stop()` or drop rather than on its own
    pub requested: bool,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Service root; health is `GET {base_url}/health`
    pub base_url: String,
    /// Per-attempt health request timeout
    pub health_timeout: Duration,
}

impl SupervisorConfig {
    pub fn from_config(config: &PredictionConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
        }
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

#[derive(Debug)]
struct Inner {
    state: SupervisorState,
    poll_attempts: u32,
    pid: Option<u32>,
    last_exit: Option<ProcessExit>,
    kill_tx: Option<oneshot::Sender<()>>,
}

pub struct ServiceSupervisor {
    config: SupervisorConfig,
    http: reqwest::Client,
    inner: Arc<Mutex<Inner>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            inner: Arc::new(Mutex::new(Inner {
                state: SupervisorState::Stopped,
                poll_attempts: 0,
                pid: None,
                last_exit: None,
                kill_tx: None,
            })),
            watcher: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        self.lock().state
    }

    /// Health requests issued by the latest readiness wait
    pub fn poll_attempts(&self) -> u32 {
        self.lock().poll_attempts
    }

    pub fn is_running(&self) -> bool {
        self.lock().pid.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().pid
    }

    pub fn last_exit(&self) -> Option<ProcessExit> {
        self.lock().last_exit
    }

    /// Launch the subprocess. Its stdout/stderr are forwarded to the log.
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            return Err(MatchfeedError::Supervisor(
                "prediction service already running".into(),
            ));
        }

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            MatchfeedError::Supervisor(format!("Failed to launch {}: {}", self.config.command, e))
        })?;

        let pid = child.id();
        info!(
            "Started prediction service ({} {}) pid={:?}",
            self.config.command,
            self.config.args.join(" "),
            pid
        );

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, true));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        {
            let mut inner = self.lock();
            inner.state = SupervisorState::Starting;
            inner.poll_attempts = 0;
            inner.pid = pid;
            inner.last_exit = None;
            inner.kill_tx = Some(kill_tx);
        }

        let inner = Arc::clone(&self.inner);
        let watcher = tokio::spawn(async move {
            let (status, requested) = tokio::select! {
                status = child.wait() => (status, false),
                // Fires on an explicit stop and when the sender is dropped
                _ = kill_rx => {
                    let _ = child.start_kill();
                    (child.wait().await, true)
                }
            };

            let code = status.as_ref().ok().and_then(|s| s.code());
            if requested {
                info!("Prediction service stopped");
            } else {
                warn!("Prediction service exited unexpectedly (code {:?})", code);
            }

            let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.pid = None;
            inner.kill_tx = None;
            inner.state = SupervisorState::Stopped;
            inner.last_exit = Some(ProcessExit { code, requested });
        });
        *self.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(watcher);

        Ok(())
    }

    /// Poll the health endpoint until it answers 2xx or `max_attempts`
    /// requests have failed. Returns false on timeout; the child is left
    /// running. A child that exits during the wait leaves the state at
    /// `Stopped` rather than `TimedOut`.
    pub async fn await_ready(&self, max_attempts: u32, interval: Duration) -> bool {
        let had_child = {
            let mut inner = self.lock();
            inner.state = SupervisorState::Polling;
            inner.poll_attempts = 0;
            inner.pid.is_some()
        };
        info!("Waiting for prediction service to be ready...");

        for attempt in 1..=max_attempts {
            self.lock().poll_attempts = attempt;

            if self.check_health().await {
                self.lock().state = SupervisorState::Ready;
                info!("Prediction service is ready (attempt {})", attempt);
                return true;
            }
            debug!("Health check {}/{} failed", attempt, max_attempts);

            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        {
            let mut inner = self.lock();
            if had_child && inner.pid.is_none() {
                inner.state = SupervisorState::Stopped;
            } else {
                inner.state = SupervisorState::TimedOut;
            }
        }
        warn!(
            "Prediction service did not become ready after {} attempts",
            max_attempts
        );
        false
    }

    /// Run `warmup` exactly once, then wait for readiness
    pub async fn await_ready_after<F>(&self, warmup: F, max_attempts: u32, interval: Duration) -> bool
    where
        F: Future<Output = ()>,
    {
        warmup.await;
        self.await_ready(max_attempts, interval).await
    }

    /// Single health probe with the short per-attempt timeout
    pub async fn check_health(&self) -> bool {
        match self
            .http
            .get(self.config.health_url())
            .timeout(self.config.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Kill and reap the child. No-op when nothing is running.
    pub async fn stop(&self) {
        let kill_tx = self.lock().kill_tx.take();
        if let Some(kill_tx) = kill_tx {
            let _ = kill_tx.send(());
        }

        let watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(watcher) = watcher {
            let _ = watcher.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ServiceSupervisor {
    fn drop(&mut self) {
        if let Some(kill_tx) = self.lock().kill_tx.take() {
            let _ = kill_tx.send(());
        }
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(stream: R, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!(target: "prediction_service", "{}", line);
        } else {
            info!(target: "prediction_service", "{}", line);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{closed_port_url, StubServer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(command: &str, args: &[&str], base_url: String) -> SupervisorConfig {
        SupervisorConfig {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: None,
            base_url,
            health_timeout: Duration::from_millis(200),
        }
    }

    async fn wait_for_exit(supervisor: &ServiceSupervisor) {
        for _ in 0..200 {
            if supervisor.last_exit().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("child did not exit");
    }

    // ========== Readiness ==========

    #[tokio::test]
    async fn test_never_ready_times_out_and_keeps_child() {
        let supervisor = ServiceSupervisor::new(config("sleep", &["30"], closed_port_url().await));
        supervisor.start().await.unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Starting);

        let ready = supervisor.await_ready(3, Duration::from_millis(10)).await;

        assert!(!ready);
        assert_eq!(supervisor.poll_attempts(), 3);
        assert_eq!(supervisor.state(), SupervisorState::TimedOut);
        assert!(supervisor.is_running());

        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_ready_on_first_success() {
        let server = StubServer::start(200, "{\"status\": \"ok\"}").await;
        let supervisor = ServiceSupervisor::new(config("sleep", &["30"], server.base_url.clone()));
        supervisor.start().await.unwrap();

        let ready = supervisor.await_ready(5, Duration::from_millis(10)).await;

        assert!(ready);
        assert_eq!(supervisor.poll_attempts(), 1);
        assert_eq!(supervisor.state(), SupervisorState::Ready);
        assert!(server.requests()[0].starts_with("GET /health"));

        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_non_success_status_keeps_polling() {
        let server = StubServer::start(503, "{}").await;
        let supervisor = ServiceSupervisor::new(config("sleep", &["30"], server.base_url.clone()));

        let ready = supervisor.await_ready(2, Duration::from_millis(10)).await;

        assert!(!ready);
        assert_eq!(server.hits(), 2);
        assert_eq!(supervisor.state(), SupervisorState::TimedOut);
    }

    #[tokio::test]
    async fn test_warmup_runs_once_before_polling() {
        let server = StubServer::start(200, "{}").await;
        let supervisor = ServiceSupervisor::new(config("sleep", &["30"], server.base_url.clone()));
        let warmups = AtomicUsize::new(0);
        let hits_at_warmup = AtomicUsize::new(usize::MAX);

        let ready = supervisor
            .await_ready_after(
                async {
                    warmups.fetch_add(1, Ordering::SeqCst);
                    hits_at_warmup.store(server.hits(), Ordering::SeqCst);
                },
                3,
                Duration::from_millis(10),
            )
            .await;

        assert!(ready);
        assert_eq!(warmups.load(Ordering::SeqCst), 1);
        assert_eq!(hits_at_warmup.load(Ordering::SeqCst), 0);
    }

    // ========== Lifecycle ==========

    #[tokio::test]
    async fn test_unexpected_exit_is_recorded() {
        let supervisor = ServiceSupervisor::new(config("sh", &["-c", "exit 3"], closed_port_url().await));
        supervisor.start().await.unwrap();

        wait_for_exit(&supervisor).await;

        let exit = supervisor.last_exit().unwrap();
        assert_eq!(exit.code, Some(3));
        assert!(!exit.requested);
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn test_exit_during_wait_keeps_stopped_state() {
        let supervisor = ServiceSupervisor::new(config(
            "sh",
            &["-c", "sleep 0.1; exit 2"],
            closed_port_url().await,
        ));
        supervisor.start().await.unwrap();

        let ready = supervisor.await_ready(20, Duration::from_millis(25)).await;

        assert!(!ready);
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.last_exit().unwrap().code, Some(2));
    }

    #[tokio::test]
    async fn test_drop_kills_child() {
        let supervisor = ServiceSupervisor::new(config("sleep", &["30"], closed_port_url().await));
        supervisor.start().await.unwrap();
        let pid = supervisor.pid().unwrap();

        drop(supervisor);
        tokio::time::sleep(Duration::from_millis(300)).await;

        let alive = std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .unwrap()
            .success();
        assert!(!alive);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let supervisor = ServiceSupervisor::new(config("sleep", &["30"], closed_port_url().await));
        supervisor.start().await.unwrap();
        assert!(supervisor.pid().is_some());

        supervisor.stop().await;
        assert!(!supervisor.is_running());
        assert!(supervisor.last_exit().unwrap().requested);

        supervisor.stop().await;
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let supervisor = ServiceSupervisor::new(config("sleep", &["30"], closed_port_url().await));
        supervisor.stop().await;
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert!(supervisor.last_exit().is_none());
    }

    #[tokio::test]
    async fn test_start_twice_is_error() {
        let supervisor = ServiceSupervisor::new(config("sleep", &["30"], closed_port_url().await));
        supervisor.start().await.unwrap();

        let second = supervisor.start().await;

        assert!(matches!(second, Err(MatchfeedError::Supervisor(_))));
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_missing_binary_is_error() {
        let supervisor = ServiceSupervisor::new(config(
            "/nonexistent/prediction-service",
            &[],
            closed_port_url().await,
        ));

        let result = supervisor.start().await;

        assert!(matches!(result, Err(MatchfeedError::Supervisor(_))));
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert!(!supervisor.is_running());
    }

    #[test]
    fn test_config_from_prediction_config() {
        let mut prediction = PredictionConfig::default();
        prediction.base_url = "http://localhost:5001/".into();

        let config = SupervisorConfig::from_config(&prediction);

        assert_eq!(config.health_url(), "http://localhost:5001/health");
        assert_eq!(config.health_timeout, Duration::from_millis(500));
        assert_eq!(config.command, "python");
    }
}
