//! Agent: the page-level facade that wires watcher, injector and orchestrator together.
//!
//! A host binding owns one `Agent` per page. It forwards mutation, key and click
//! events; the agent re-scans when the page settles and runs panel actions on the
//! tokio runtime.

use std::sync::{Arc, Mutex};

use coldiq_core::AgentConfig;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{BridgeError, BridgeResult};
use crate::injector::{ClickAction, Injector, ScanReport};
use crate::lock;
use crate::orchestrator::{ActivationOutcome, AnalysisOrchestrator};
use crate::tree::{NodeId, SurfaceTree};
use crate::watcher::{MutationWatcher, WatcherConfig};

pub struct Agent<T> {
    tree: Arc<Mutex<T>>,
    injector: Arc<Mutex<Injector>>,
    orchestrator: Arc<AnalysisOrchestrator>,
    watcher: MutationWatcher,
}

impl<T: SurfaceTree + 'static> Agent<T> {
    pub fn new(tree: T, orchestrator: AnalysisOrchestrator, config: &AgentConfig) -> Self {
        Self {
            tree: Arc::new(Mutex::new(tree)),
            injector: Arc::new(Mutex::new(Injector::new(config.links()))),
            orchestrator: Arc::new(orchestrator),
            watcher: MutationWatcher::new(WatcherConfig::from(config)),
        }
    }

    pub fn tree(&self) -> &Arc<Mutex<T>> {
        &self.tree
    }

    pub fn injector(&self) -> &Arc<Mutex<Injector>> {
        &self.injector
    }

    /// Start watching the page. Must be called within a tokio runtime.
    pub fn start(&mut self) {
        let tree = self.tree.clone();
        let injector = self.injector.clone();
        self.watcher.start(move |reason| {
            let report = scan(&tree, &injector);
            debug!(target: "coldiq::bridge", reason = reason.as_str(), ?report, "settled scan");
        });
        info!(target: "coldiq::bridge", "agent started");
    }

    pub fn stop(&mut self) {
        self.watcher.stop();
        info!(target: "coldiq::bridge", "agent stopped");
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_running()
    }

    /// Scan immediately, bypassing the debounce.
    pub fn scan_now(&self) -> ScanReport {
        scan(&self.tree, &self.injector)
    }

    pub fn on_mutation(&self) {
        self.watcher.notify_mutation();
    }

    pub fn on_key(&self, key: &str) {
        self.watcher.notify_key(key);
    }

    /// Route a click; panel actions that need the network, the clipboard or a timer
    /// run on a spawned task whose handle is returned.
    pub fn on_click(&self, target: NodeId) -> Option<JoinHandle<()>> {
        let action = {
            let mut tree = lock(&self.tree);
            lock(&self.injector).handle_click(&mut *tree, target)?
        };
        let tree = self.tree.clone();
        let orchestrator = self.orchestrator.clone();
        Some(tokio::spawn(async move {
            let result = match &action {
                ClickAction::Activate(control) => orchestrator.activate(&tree, control).await.map(|_| ()),
                ClickAction::Copy(control, target) => orchestrator.copy(&tree, control, *target).await,
                ClickAction::Apply(control) => orchestrator.apply(&tree, control).await,
            };
            if let Err(err) = result {
                info!(target: "coldiq::bridge", "panel action ended early: {}", err);
            }
        }))
    }

    /// Activate the control of the surface rooted at `root` and wait for the outcome.
    pub async fn activate(&self, root: NodeId) -> BridgeResult<ActivationOutcome> {
        let control = lock(&self.injector)
            .control_for(root)
            .cloned()
            .ok_or(BridgeError::NoControl)?;
        self.orchestrator.activate(&self.tree, &control).await
    }
}

fn scan<T: SurfaceTree>(tree: &Mutex<T>, injector: &Mutex<Injector>) -> ScanReport {
    let mut tree = lock(tree);
    lock(injector).scan(&mut *tree)
}
