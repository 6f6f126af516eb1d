//! Debounced Mutation Watcher.
//!
//! Host-page mutations arrive in bursts (one compose window opening produces dozens).
//! The watcher collapses each burst into a single "settled" callback after a quiet
//! window, fires once unconditionally shortly after start, and schedules a delayed
//! callback after the host's compose shortcut key.
//!
//! Scheduling lives in [`Debouncer`], which holds no timers and can be driven with
//! explicit instants. [`MutationWatcher`] is the service that owns one on a tokio task.

use std::time::Duration;

use coldiq_core::AgentConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Why a re-scan fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanReason {
    /// A burst of mutations went quiet.
    Mutation,
    /// The one-off scan after start.
    Initial,
    /// The host's compose shortcut was pressed.
    ComposeShortcut,
}

impl ScanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanReason::Mutation => "mutation",
            ScanReason::Initial => "initial",
            ScanReason::ComposeShortcut => "compose_shortcut",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Quiet period a mutation burst must observe before the callback fires.
    pub quiet_window: Duration,
    /// Delay of the unconditional scan after start.
    pub initial_delay: Duration,
    /// Key that opens a new compose window in the host application.
    pub shortcut_key: String,
    /// Delay of the scan after the shortcut key.
    pub shortcut_delay: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for WatcherConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            quiet_window: config.quiet_window(),
            initial_delay: config.initial_scan_delay(),
            shortcut_key: config.compose_shortcut_key.clone(),
            shortcut_delay: config.compose_shortcut_delay(),
        }
    }
}

/// Pending scan deadlines. Pure state: callers supply `now`.
#[derive(Debug)]
pub struct Debouncer {
    quiet_window: Duration,
    mutation_deadline: Option<Instant>,
    scheduled: Vec<(Instant, ScanReason)>,
}

impl Debouncer {
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            mutation_deadline: None,
            scheduled: Vec::new(),
        }
    }

    /// A mutation at `now` (re)starts the quiet window.
    pub fn record_mutation(&mut self, now: Instant) {
        self.mutation_deadline = Some(now + self.quiet_window);
    }

    /// One-off scan at `at`, independent of the mutation window.
    pub fn schedule_once(&mut self, at: Instant, reason: ScanReason) {
        self.scheduled.push((at, reason));
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.mutation_deadline
            .into_iter()
            .chain(self.scheduled.iter().map(|(at, _)| *at))
            .min()
    }

    pub fn is_idle(&self) -> bool {
        self.next_deadline().is_none()
    }

    /// Consume every deadline that has passed and report a single scan for them.
    /// The reason is that of the earliest due deadline.
    pub fn take_due(&mut self, now: Instant) -> Option<ScanReason> {
        let mut due: Vec<(Instant, ScanReason)> = Vec::new();
        if let Some(at) = self.mutation_deadline.filter(|at| *at <= now) {
            due.push((at, ScanReason::Mutation));
            self.mutation_deadline = None;
        }
        self.scheduled.retain(|(at, reason)| {
            if *at <= now {
                due.push((*at, *reason));
                false
            } else {
                true
            }
        });
        due.into_iter().min_by_key(|(at, _)| *at).map(|(_, reason)| reason)
    }
}

/// Host events fed to a running watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Mutation,
    KeyDown(String),
}

/// The page-wide watcher service. Explicitly started and stopped.
pub struct MutationWatcher {
    config: WatcherConfig,
    tx: Option<mpsc::UnboundedSender<HostEvent>>,
    task: Option<JoinHandle<()>>,
}

impl MutationWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            tx: None,
            task: None,
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Spawn the watch loop. `on_settled` runs on the loop task once per fired scan.
    /// Restarting stops the previous loop first.
    pub fn start<F>(&mut self, mut on_settled: F)
    where
        F: FnMut(ScanReason) + Send + 'static,
    {
        self.stop();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let mut debouncer = Debouncer::new(config.quiet_window);
            debouncer.schedule_once(Instant::now() + config.initial_delay, ScanReason::Initial);

            loop {
                let deadline = debouncer.next_deadline();
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(HostEvent::Mutation) => debouncer.record_mutation(Instant::now()),
                        Some(HostEvent::KeyDown(key)) => {
                            if key == config.shortcut_key {
                                debug!(target: "coldiq::bridge", key = %key, "compose shortcut, scan scheduled");
                                debouncer.schedule_once(
                                    Instant::now() + config.shortcut_delay,
                                    ScanReason::ComposeShortcut,
                                );
                            }
                        }
                        None => break,
                    },
                    _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        if let Some(reason) = debouncer.take_due(Instant::now()) {
                            debug!(target: "coldiq::bridge", reason = reason.as_str(), "page settled, scanning");
                            on_settled(reason);
                        }
                    }
                }
            }
            debug!(target: "coldiq::bridge", "mutation watcher loop ended");
        });

        self.tx = Some(tx);
        self.task = Some(task);
        info!(
            target: "coldiq::bridge",
            quiet_ms = self.config.quiet_window.as_millis() as u64,
            "mutation watcher started"
        );
    }

    /// Report a structural change of the host page.
    pub fn notify_mutation(&self) {
        self.send(HostEvent::Mutation);
    }

    /// Report a key press in the host page.
    pub fn notify_key(&self, key: &str) {
        self.send(HostEvent::KeyDown(key.to_string()));
    }

    fn send(&self, event: HostEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn stop(&mut self) {
        self.tx = None;
        if let Some(task) = self.task.take() {
            task.abort();
            info!(target: "coldiq::bridge", "mutation watcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for MutationWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
