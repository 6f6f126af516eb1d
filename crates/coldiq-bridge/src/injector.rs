//! Surface Registry / Injector.
//!
//! Each scan enumerates the compose surfaces in the page and attaches one control and
//! one hidden result panel to every surface that does not carry the injection marker
//! yet. The marker goes on the surface root before any node is attached, so a scan
//! re-entered by the mutations of this one sees the surface as done. A surface nested
//! in a marked root, or already holding a control, counts as done too.
//!
//! Panels live under the document body rather than inside the surface so that the
//! host's re-layout of the compose window does not move or drop them.

use std::sync::{Arc, Mutex, PoisonError};

use coldiq_core::PanelLinks;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::DiscoveryFailure;
use crate::panel::{CopyTarget, ResultPanel};
use crate::selectors::{find_surfaces, CompositionSurface, FieldKind, CONTROL_MARKER};
use crate::tree::{add_class, attr_is, closest, contains, find_first, has_class, is_attached, remove_class, NodeId, SurfaceTree};

pub const CONTROL_CLASS: &str = "coldiq-button";
pub const PANEL_CLASS: &str = "coldiq-panel";
pub const PANEL_VISIBLE_CLASS: &str = "coldiq-panel-visible";
pub const PANEL_ATTR: &str = "data-coldiq-panel";

const PANEL_SHELL: &str = r#"<div class="coldiq-panel-header"><span class="coldiq-panel-title">ColdIQ Analysis</span><button class="coldiq-panel-close" data-action="close">&times;</button></div><div class="coldiq-panel-content"></div>"#;

/// One control + panel pair attached to a surface.
#[derive(Debug, Clone)]
pub struct InjectedControl {
    pub surface: CompositionSurface,
    /// The "Analyze" button inside the surface toolbar.
    pub control: NodeId,
    /// Panel root under the document body.
    pub panel_node: NodeId,
    /// Region re-painted from the panel state.
    pub content: NodeId,
    pub close: NodeId,
    pub panel: Arc<Mutex<ResultPanel>>,
}

impl InjectedControl {
    /// Repaint the panel content and visibility from its current state.
    pub fn paint(&self, tree: &mut dyn SurfaceTree, now: Instant) {
        let (html, visible) = {
            let panel = self.panel.lock().unwrap_or_else(PoisonError::into_inner);
            (panel.render_html(now), panel.is_visible())
        };
        tree.set_inner_html(self.content, &html);
        if visible {
            add_class(tree, self.panel_node, PANEL_VISIBLE_CLASS);
        } else {
            remove_class(tree, self.panel_node, PANEL_VISIBLE_CLASS);
        }
    }

    fn set_visible(&self, tree: &mut dyn SurfaceTree, visible: bool) {
        {
            let mut panel = self.panel.lock().unwrap_or_else(PoisonError::into_inner);
            if visible {
                panel.show();
            } else {
                panel.hide();
            }
        }
        if visible {
            add_class(tree, self.panel_node, PANEL_VISIBLE_CLASS);
        } else {
            remove_class(tree, self.panel_node, PANEL_VISIBLE_CLASS);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.panel.lock().unwrap_or_else(PoisonError::into_inner).is_visible()
    }
}

/// Outcome counts of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub discovered: usize,
    pub injected: usize,
    pub already_injected: usize,
    pub skipped: usize,
    pub pruned: usize,
}

/// Work a click asks for that must run outside the tree lock.
#[derive(Debug, Clone)]
pub enum ClickAction {
    Activate(InjectedControl),
    Copy(InjectedControl, CopyTarget),
    Apply(InjectedControl),
}

fn is_close_button(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "data-action", "close")
}

fn is_panel_content(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    has_class(tree, node, "coldiq-panel-content")
}

/// Registry of injected controls, one per live surface.
#[derive(Debug, Default)]
pub struct Injector {
    controls: Vec<InjectedControl>,
    links: PanelLinks,
    next_panel: usize,
}

impl Injector {
    pub fn new(links: PanelLinks) -> Self {
        Self {
            controls: Vec::new(),
            links,
            next_panel: 0,
        }
    }

    pub fn controls(&self) -> &[InjectedControl] {
        &self.controls
    }

    /// Control attached to the surface rooted at `root`.
    pub fn control_for(&self, root: NodeId) -> Option<&InjectedControl> {
        self.controls.iter().find(|c| c.surface.root == root)
    }

    /// Inject into every unmarked surface. Never fails: surfaces whose toolbar cannot
    /// be found are logged and skipped until a later scan.
    pub fn scan(&mut self, tree: &mut dyn SurfaceTree) -> ScanReport {
        let mut report = ScanReport {
            pruned: self.prune(tree),
            ..ScanReport::default()
        };

        let surfaces = find_surfaces(tree);
        report.discovered = surfaces.len();
        for surface in surfaces {
            if surface.has_control(tree) || covered_by_neighbour(tree, surface.root) {
                report.already_injected += 1;
                continue;
            }
            let Some(toolbar) = surface.field(tree, FieldKind::Toolbar) else {
                warn!(
                    target: "coldiq::bridge",
                    root = surface.root.0,
                    error = %DiscoveryFailure::MissingToolbar,
                    "surface skipped"
                );
                report.skipped += 1;
                continue;
            };
            let injected = self.inject(tree, surface, toolbar);
            info!(
                target: "coldiq::bridge",
                root = surface.root.0,
                panel = injected.panel_node.0,
                "control injected"
            );
            self.controls.push(injected);
            report.injected += 1;
        }

        debug!(target: "coldiq::bridge", ?report, "scan finished");
        report
    }

    fn inject(&mut self, tree: &mut dyn SurfaceTree, surface: CompositionSurface, toolbar: NodeId) -> InjectedControl {
        tree.set_attr(surface.root, CONTROL_MARKER, "true");

        let control = tree.create_element("div");
        tree.set_attr(control, "class", CONTROL_CLASS);
        tree.set_attr(control, "role", "button");
        tree.set_attr(control, "title", "Analyze with ColdIQ");
        tree.set_inner_html(control, r#"<span class="coldiq-button-label">Analyze</span>"#);
        tree.prepend_child(toolbar, control);

        self.next_panel += 1;
        let panel_node = tree.create_element("div");
        tree.set_attr(panel_node, "class", PANEL_CLASS);
        tree.set_attr(panel_node, PANEL_ATTR, &self.next_panel.to_string());
        tree.set_inner_html(panel_node, PANEL_SHELL);
        let content = find_first(tree, panel_node, is_panel_content).unwrap_or(panel_node);
        let close = find_first(tree, panel_node, is_close_button).unwrap_or(panel_node);
        let body = tree.body();
        tree.append_child(body, panel_node);

        InjectedControl {
            surface,
            control,
            panel_node,
            content,
            close,
            panel: Arc::new(Mutex::new(ResultPanel::new(self.links.clone()))),
        }
    }

    /// Forget controls whose surface the host removed. The panel, the control and the
    /// marker all go, so a surface the host re-attaches later is injected afresh.
    fn prune(&mut self, tree: &mut dyn SurfaceTree) -> usize {
        let before = self.controls.len();
        self.controls.retain(|c| {
            if is_attached(tree, c.surface.root) {
                return true;
            }
            tree.remove(c.panel_node);
            tree.remove(c.control);
            tree.remove_attr(c.surface.root, CONTROL_MARKER);
            debug!(target: "coldiq::bridge", root = c.surface.root.0, "surface gone, control pruned");
            false
        });
        before - self.controls.len()
    }

    /// Route a click on `target`.
    ///
    /// Visible panels are dismissed when the click lands outside both the panel and
    /// its control. The close button hides its panel. Control and panel-button clicks
    /// come back as a [`ClickAction`].
    pub fn handle_click(&self, tree: &mut dyn SurfaceTree, target: NodeId) -> Option<ClickAction> {
        for c in &self.controls {
            let inside = contains(tree, c.panel_node, target) || contains(tree, c.control, target);
            if !inside && c.is_visible() {
                c.set_visible(tree, false);
            }
        }

        if let Some(c) = self.controls.iter().find(|c| contains(tree, c.control, target)) {
            return Some(ClickAction::Activate(c.clone()));
        }

        let c = self.controls.iter().find(|c| contains(tree, c.panel_node, target))?;
        let button = action_node(tree, c.panel_node, target)?;
        if tree.attr(button, "disabled").is_some() {
            return None;
        }
        match tree.attr(button, "data-action").as_deref() {
            Some("close") => {
                c.set_visible(tree, false);
                None
            }
            Some("copy") => {
                let copy = tree.attr(button, "data-copy").and_then(|s| CopyTarget::parse(&s))?;
                Some(ClickAction::Copy(c.clone(), copy))
            }
            Some("apply") => Some(ClickAction::Apply(c.clone())),
            _ => None,
        }
    }
}

fn is_control(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    has_class(tree, node, CONTROL_CLASS)
}

fn is_marked(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, CONTROL_MARKER, "true")
}

/// Nested roots (an inline reply inside a pop-out dialog) share one toolbar; whichever
/// was injected first owns it.
fn covered_by_neighbour(tree: &dyn SurfaceTree, root: NodeId) -> bool {
    closest(tree, root, is_marked).is_some() || find_first(tree, root, is_control).is_some()
}

/// Nearest node at or above `target`, within `panel`, carrying `data-action`.
fn action_node(tree: &dyn SurfaceTree, panel: NodeId, target: NodeId) -> Option<NodeId> {
    let mut current = Some(target);
    while let Some(node) = current {
        if tree.attr(node, "data-action").is_some() {
            return Some(node);
        }
        if node == panel {
            return None;
        }
        current = tree.parent(node);
    }
    None
}
