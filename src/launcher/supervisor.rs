//! Supervision of the two long-running development services.
//!
//! Each service runs under its own worker task, which owns the child process,
//! relays its output and reports its exit. The controller starts the first
//! service, waits on a [`StartupGate`], starts the second, then polls until
//! both workers finish or the shutdown future resolves. On shutdown every
//! worker is cancelled and terminates its process group: SIGTERM first, then
//! SIGKILL once the grace period runs out.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StartupConfig;
use crate::process::relay_lines;
use crate::report::{say, Reporter, Tag, Tone};

/// A service to launch.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Service name used in log messages.
    pub name: String,
    /// Output prefix.
    pub tag: Tag,
    /// Program to run.
    pub program: String,
    /// Program arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub dir: PathBuf,
    /// Address announced once the services are started.
    pub url: Option<String>,
}

/// How a supervised service ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceExit {
    /// Exited on its own with success.
    Succeeded,
    /// Exited on its own with a failure; carries the exit code when there is one.
    Failed(Option<i32>),
    /// Stopped by the supervisor on shutdown.
    Stopped,
    /// Could not be spawned.
    FailedToStart,
}

impl ServiceExit {
    /// Returns true for outcomes that count as a service failure.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed(_) | Self::FailedToStart)
    }
}

/// What gates the start of the second service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupGate {
    /// Wait a fixed time. A heuristic only: nothing confirms the first service is up.
    Delay(Duration),
    /// Poll `url` until it answers 2xx, giving up after `timeout`.
    Probe {
        /// Readiness endpoint.
        url: String,
        /// Upper bound on polling.
        timeout: Duration,
        /// Pause between attempts.
        interval: Duration,
    },
}

/// Result of waiting on a [`StartupGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The probe answered successfully.
    Ready,
    /// The fixed delay elapsed.
    Elapsed,
    /// The probe never answered within its timeout.
    TimedOut,
}

impl StartupGate {
    /// Builds the gate from launcher configuration.
    pub fn from_config(startup: &StartupConfig) -> Self {
        match &startup.readiness_url {
            Some(url) if !url.trim().is_empty() => Self::Probe {
                url: url.clone(),
                timeout: Duration::from_secs(startup.readiness_timeout_secs),
                interval: Duration::from_millis(startup.readiness_interval_ms),
            },
            _ => Self::Delay(Duration::from_millis(startup.delay_ms)),
        }
    }

    /// Waits until the gate opens.
    pub async fn wait(&self) -> Readiness {
        match self {
            Self::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Readiness::Elapsed
            }
            Self::Probe {
                url,
                timeout,
                interval,
            } => probe_until_ready(url, *timeout, *interval).await,
        }
    }
}

async fn probe_until_ready(url: &str, timeout: Duration, interval: Duration) -> Readiness {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build readiness client: {e}");
            return Readiness::TimedOut;
        }
    };

    let attempts = async {
        loop {
            match client.get(url).send().await {
                Ok(response) if response.status().is_success() => return,
                Ok(response) => debug!(status = %response.status(), "Service not ready yet"),
                Err(e) => debug!("Service not ready yet: {e}"),
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, attempts).await {
        Ok(()) => Readiness::Ready,
        Err(_) => Readiness::TimedOut,
    }
}

/// Final state of a launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    /// Whether the run ended because of the shutdown signal.
    pub interrupted: bool,
    /// Exit of every service that was started, in start order.
    pub exits: Vec<(String, ServiceExit)>,
}

impl LaunchReport {
    /// Returns the number of services that failed.
    pub fn failures(&self) -> usize {
        self.exits.iter().filter(|(_, exit)| exit.is_failure()).count()
    }
}

/// Starts and watches the development services.
pub struct Supervisor {
    reporter: Arc<Reporter>,
    poll_interval: Duration,
    grace: Duration,
}

impl Supervisor {
    /// Creates a supervisor.
    pub fn new(reporter: Arc<Reporter>, poll_interval: Duration, grace: Duration) -> Self {
        Self {
            reporter,
            poll_interval,
            grace,
        }
    }

    /// Creates a supervisor with timings from configuration.
    pub fn from_config(reporter: Arc<Reporter>, startup: &StartupConfig) -> Self {
        Self::new(
            reporter,
            Duration::from_millis(startup.poll_interval_ms),
            Duration::from_secs(startup.shutdown_grace_secs),
        )
    }

    /// Runs `first`, then `second` once `gate` opens, until both end or `shutdown` resolves.
    pub async fn run<F>(
        &self,
        first: ServiceSpec,
        second: ServiceSpec,
        gate: &StartupGate,
        shutdown: F,
    ) -> LaunchReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let cancel = CancellationToken::new();
        let mut urls = vec![(first.name.clone(), first.url.clone())];
        let mut workers = vec![(first.name.clone(), self.spawn(first, &cancel))];
        let mut interrupted = false;

        say(Tone::Progress, "\n🚀 Starting services...\n");

        tokio::select! {
            readiness = gate.wait() => {
                if readiness == Readiness::TimedOut {
                    warn!("Readiness probe timed out, starting the next service anyway");
                    say(Tone::Warning, "⚠️  Server did not report ready in time, starting client anyway");
                }
                debug!(?readiness, "Startup gate opened");
            }
            () = &mut shutdown => interrupted = true,
        }

        if !interrupted {
            urls.push((second.name.clone(), second.url.clone()));
            workers.push((second.name.clone(), self.spawn(second, &cancel)));
            announce(&urls);

            let mut ticker = tokio::time::interval(self.poll_interval);
            loop {
                tokio::select! {
                    () = &mut shutdown => {
                        interrupted = true;
                        break;
                    }
                    _ = ticker.tick() => {
                        if workers.iter().all(|(_, worker)| worker.is_finished()) {
                            break;
                        }
                    }
                }
            }
        }

        if interrupted {
            say(Tone::Warning, "\n\n🛑 Stopping services...");
            cancel.cancel();
        }

        let mut exits = Vec::with_capacity(workers.len());
        for (name, worker) in workers {
            let exit = match worker.await {
                Ok(exit) => exit,
                Err(e) => {
                    let _ = self.reporter.error(
                        &format!("Worker for {name} ended abnormally"),
                        Some(&anyhow::Error::new(e)),
                    );
                    ServiceExit::Failed(None)
                }
            };
            exits.push((name, exit));
        }

        if interrupted {
            say(Tone::Success, "✅ Services stopped");
        }

        LaunchReport { interrupted, exits }
    }

    fn spawn(&self, spec: ServiceSpec, cancel: &CancellationToken) -> JoinHandle<ServiceExit> {
        tokio::spawn(supervise(
            spec,
            cancel.child_token(),
            self.grace,
            self.reporter.clone(),
        ))
    }
}

fn announce(urls: &[(String, Option<String>)]) {
    say(Tone::Success, "\n✨ Services started:");
    for (name, url) in urls {
        if let Some(url) = url {
            say(Tone::Detail, &format!("   → {name}: {url}"));
        }
    }
    say(Tone::Warning, "\nPress Ctrl+C to stop all services\n");
}

async fn supervise(
    spec: ServiceSpec,
    cancel: CancellationToken,
    grace: Duration,
    reporter: Arc<Reporter>,
) -> ServiceExit {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so termination reaches the grandchildren npm starts.
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = reporter.error(
                &format!("Could not start {}", spec.name),
                Some(&anyhow::Error::new(e).context(format!(
                    "{} {} in {}",
                    spec.program,
                    spec.args.join(" "),
                    spec.dir.display()
                ))),
            );
            return ServiceExit::FailedToStart;
        }
    };
    info!(service = %spec.name, pid = ?child.id(), "Service started");

    let mut relays = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        relays.push(tokio::spawn(relay_lines(stdout, spec.tag.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        relays.push(tokio::spawn(relay_lines(stderr, spec.tag.clone())));
    }

    let waited = tokio::select! {
        status = child.wait() => Some(status),
        () = cancel.cancelled() => None,
    };

    let exit = match waited {
        Some(Ok(status)) if status.success() => ServiceExit::Succeeded,
        Some(Ok(status)) => {
            let _ = reporter.error(&format!("{} exited with {status}", spec.name), None);
            ServiceExit::Failed(status.code())
        }
        Some(Err(e)) => {
            let _ = reporter.error(
                &format!("Lost track of {}", spec.name),
                Some(&anyhow::Error::new(e)),
            );
            ServiceExit::Failed(None)
        }
        None => {
            terminate(&mut child, grace, &spec.name).await;
            ServiceExit::Stopped
        }
    };

    for mut relay in relays {
        if tokio::time::timeout(Duration::from_secs(1), &mut relay)
            .await
            .is_err()
        {
            relay.abort();
        }
    }

    debug!(service = %spec.name, ?exit, "Service finished");
    exit
}

async fn terminate(child: &mut Child, grace: Duration, name: &str) {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        if let Some(pid) = child.id() {
            signal_group(pid, Signal::SIGTERM);
            if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
                debug!(service = %name, %status, "Service stopped after SIGTERM");
                return;
            }
            warn!(service = %name, "Service ignored SIGTERM, killing it");
            signal_group(pid, Signal::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        debug!(service = %name, "Kill after shutdown failed: {e}");
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), signal) {
        debug!(pid, ?signal, "Signalling process group failed: {e}");
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
