//! coldiq-bridge: Surface Discovery & Injection Orchestrator for a third-party web mail page.
//!
//! Finds compose surfaces in a host page it does not control, attaches the ColdIQ
//! control and result panel to each exactly once, and runs the analyze cycle.
//!
//! - **tree**: `SurfaceTree` abstraction over the host page plus traversal helpers.
//! - **DomTree**: in-memory tree parsed from HTML (tests, CLI dry runs).
//! - **selectors**: ordered probes per field kind, body heuristic, surface discovery.
//! - **MutationWatcher**: debounced re-scan service (quiet window, initial scan, compose shortcut).
//! - **Injector**: idempotent control + panel injection, pruning, click routing.
//! - **ResultPanel**: render state machine, error classification, panel markup.
//! - **AnalysisOrchestrator**: extract → validate → token → analyze → render, copy, write-back.
//! - **Agent**: wires the above together for one page.

use std::sync::{Mutex, MutexGuard, PoisonError};

mod agent;
mod clipboard;
mod dom;
mod error;
mod injector;
mod orchestrator;
mod panel;
mod selectors;
pub mod tree;
mod watcher;

pub use agent::Agent;
pub use clipboard::{Clipboard, MemoryClipboard, SystemClipboard};
pub use dom::DomTree;
pub use error::{BridgeError, BridgeResult, DiscoveryFailure};
pub use injector::{
    ClickAction, InjectedControl, Injector, ScanReport, CONTROL_CLASS, PANEL_ATTR, PANEL_CLASS, PANEL_VISIBLE_CLASS,
};
pub use orchestrator::{write_back, ActivationOutcome, AnalysisOrchestrator};
pub use panel::{
    html_escape, score_color, text_to_html, CopyTarget, ErrorKind, RenderState, RequestId, ResultPanel,
    EMPTY_BODY_WARNING, FLASH, LOGIN_REQUIRED,
};
pub use selectors::{
    extract_request, find_surfaces, resolve, CompositionSurface, FieldKind, Probe, BODY_PROBES, CONTROL_MARKER,
    SEND_PROBES, SUBJECT_PROBES, TOOLBAR_PROBES,
};
pub use tree::{NodeId, SurfaceTree};
pub use watcher::{Debouncer, HostEvent, MutationWatcher, ScanReason, WatcherConfig};

/// Lock a std mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
