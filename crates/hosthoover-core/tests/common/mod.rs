//! Shared mocks for integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use hosthoover_core::*;
use hosthoover_exec::{Auth, CommandResult, ConnectionInfo, DeviceConnector, ExecError, RemoteExecutor};
use hosthoover_notify::{NotifyError, Notifier};
use hosthoover_vcs::{CommitResult, Committer, VcsError};

/// Scripted behaviour of one connection attempt
#[derive(Debug, Clone)]
pub enum Step {
    /// Session opens and returns this configuration
    Config(String),
    /// Connect fails with this error
    Fail(ExecError),
    /// Session opens and never answers
    Hang,
}

#[derive(Default)]
struct Gauge {
    open: AtomicUsize,
    peak: AtomicUsize,
}

struct OpenGuard(Arc<Gauge>);

impl OpenGuard {
    fn new(gauge: &Arc<Gauge>) -> Self {
        let now = gauge.open.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(now, Ordering::SeqCst);
        Self(Arc::clone(gauge))
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Connector whose sessions follow a per-host script
pub struct MockConnector {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    connects: Mutex<HashMap<String, u32>>,
    delay: Duration,
    gauge: Arc<Gauge>,
    sabotage: Mutex<Option<PathBuf>>,
    cancel: Mutex<Option<(u32, CancellationToken)>>,
}

impl MockConnector {
    pub fn new(delay: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            connects: Mutex::new(HashMap::new()),
            delay,
            gauge: Arc::new(Gauge::default()),
            sabotage: Mutex::new(None),
            cancel: Mutex::new(None),
        }
    }

    /// Cancel `token` when the `connects`-th session is opened
    pub fn cancel_after(&self, connects: u32, token: CancellationToken) {
        *self.cancel.lock().unwrap() = Some((connects, token));
    }

    /// Script the attempts for one host; unscripted attempts succeed
    pub fn script(self, host: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(host.to_string(), steps.into());
        self
    }

    /// Replace `dir` with a plain file on the first connect
    pub fn sabotage_output(self, dir: PathBuf) -> Self {
        *self.sabotage.lock().unwrap() = Some(dir);
        self
    }

    pub fn connects(&self, host: &str) -> u32 {
        self.connects.lock().unwrap().get(host).copied().unwrap_or(0)
    }

    pub fn total_connects(&self) -> u32 {
        self.connects.lock().unwrap().values().sum()
    }

    pub fn peak_sessions(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.gauge.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceConnector for MockConnector {
    async fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn RemoteExecutor>, ExecError> {
        *self
            .connects
            .lock()
            .unwrap()
            .entry(info.host.clone())
            .or_insert(0) += 1;

        let total: u32 = self.connects.lock().unwrap().values().sum();
        if let Some((after, token)) = &*self.cancel.lock().unwrap() {
            if total >= *after {
                token.cancel();
            }
        }

        if let Some(dir) = self.sabotage.lock().unwrap().take() {
            std::fs::remove_dir_all(&dir).unwrap();
            std::fs::write(&dir, "not a directory").unwrap();
        }

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&info.host)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Step::Config(format!("!\nhostname dev-{}\n!\n", info.host)));

        match step {
            Step::Fail(e) => Err(e),
            Step::Config(content) => Ok(Box::new(MockSession {
                content: Some(content),
                delay: self.delay,
                _guard: OpenGuard::new(&self.gauge),
            })),
            Step::Hang => Ok(Box::new(MockSession {
                content: None,
                delay: self.delay,
                _guard: OpenGuard::new(&self.gauge),
            })),
        }
    }
}

struct MockSession {
    content: Option<String>,
    delay: Duration,
    _guard: OpenGuard,
}

#[async_trait]
impl RemoteExecutor for MockSession {
    async fn run_with_timeout(&self, _cmd: &str, _timeout: Duration) -> Result<CommandResult, ExecError> {
        let Some(content) = &self.content else {
            return std::future::pending().await;
        };
        tokio::time::sleep(self.delay).await;
        Ok(CommandResult {
            status: 0,
            stdout: content.clone(),
            stderr: String::new(),
            duration: self.delay,
        })
    }

    async fn close(&self) -> Result<(), ExecError> {
        Ok(())
    }

    fn executor_type(&self) -> &'static str {
        "mock"
    }
}

/// Prober with a fixed answer per host
pub struct MockProber {
    down: Vec<IpAddr>,
    unavailable: bool,
    /// Each probe waits out its full timeout before answering
    slow: bool,
    pub calls: AtomicUsize,
}

impl MockProber {
    pub fn down(hosts: &[&str]) -> Self {
        Self {
            down: hosts.iter().map(|h| h.parse().unwrap()).collect(),
            unavailable: false,
            slow: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::down(&[])
        }
    }

    pub fn slow() -> Self {
        Self {
            slow: true,
            ..Self::down(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn probe(&self, addr: IpAddr, timeout: Duration) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.slow {
            tokio::time::sleep(timeout).await;
        }
        if self.unavailable {
            return Err(ProbeError::Unavailable("operation not permitted".into()));
        }
        Ok(!self.down.contains(&addr))
    }

    fn method(&self) -> &'static str {
        "mock"
    }
}

/// Notifier that records every message
#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<(String, String, Vec<String>)>>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string(), recipients.to_vec()));
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "mock"
    }
}

/// Committer that records staged paths and messages
#[derive(Default)]
pub struct MockCommitter {
    pub staged: Mutex<Vec<PathBuf>>,
    pub messages: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl Committer for MockCommitter {
    async fn stage(&self, paths: &[PathBuf]) -> Result<(), VcsError> {
        if self.fail {
            return Err(VcsError::NotARepository("/nowhere".into()));
        }
        self.staged.lock().unwrap().extend_from_slice(paths);
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<CommitResult, VcsError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(CommitResult::Committed {
            id: Some("abc1234".into()),
        })
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

pub fn template() -> TargetTemplate {
    TargetTemplate::new(
        DeviceType::CiscoIos,
        Credentials::new("backup", Auth::Password("secret".into())),
    )
}

pub fn targets(range: &str) -> Vec<Target> {
    template().expand(&enumerate(range).unwrap())
}

pub fn settings() -> RunSettings {
    RunSettings {
        command_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_retries: 2,
            backoff: Backoff::Fixed(Duration::from_millis(10)),
        },
        ..RunSettings::default()
    }
}

pub fn orchestrator(
    connector: Arc<MockConnector>,
    prober: Option<Arc<dyn Prober>>,
    output: PathBuf,
    settings: RunSettings,
) -> Orchestrator {
    Orchestrator::new(OrchestratorArgs {
        connector,
        prober,
        writer: ResultWriter::new(output),
        settings,
    })
}
