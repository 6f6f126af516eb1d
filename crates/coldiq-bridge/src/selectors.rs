//! Selector Resolver: locate compose surfaces and their fields in the host page.
//!
//! The host mail client's markup is not a stable contract, so every field kind has
//! an ordered list of probes and the first match wins. The body field additionally
//! falls back to a heuristic scan over editable regions.

use coldiq_core::AnalysisRequest;

use crate::tree::{attr_is, closest, contains, descendants, find_all, find_first, has_class, NodeId, SurfaceTree};

/// Attribute written on a surface root once its control has been injected.
pub const CONTROL_MARKER: &str = "data-coldiq-injected";

/// Which part of a compose surface to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Subject,
    Body,
    Toolbar,
    SendAffordance,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Subject => "subject",
            FieldKind::Body => "body",
            FieldKind::Toolbar => "toolbar",
            FieldKind::SendAffordance => "send",
        }
    }

    /// Probes for this field, most specific first.
    pub fn probes(&self) -> &'static [Probe] {
        match self {
            FieldKind::Subject => SUBJECT_PROBES,
            FieldKind::Body => BODY_PROBES,
            FieldKind::Toolbar => TOOLBAR_PROBES,
            FieldKind::SendAffordance => SEND_PROBES,
        }
    }
}

/// One structural query: a name for logs and a predicate over a node.
#[derive(Clone, Copy)]
pub struct Probe {
    pub name: &'static str,
    pub matches: fn(&dyn SurfaceTree, NodeId) -> bool,
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Probe").field(&self.name).finish()
    }
}

pub const SUBJECT_PROBES: &[Probe] = &[
    Probe { name: r#"input[name="subjectbox"]"#, matches: is_subjectbox },
    Probe { name: r#"input[aria-label="Subject"]"#, matches: is_labelled_subject },
    Probe { name: r#"input[placeholder="Subject"]"#, matches: is_placeholder_subject },
];

pub const BODY_PROBES: &[Probe] = &[
    Probe { name: r#"div[aria-label="Message Body"]"#, matches: is_message_body },
    Probe { name: r#"div[contenteditable="true"][aria-multiline="true"]"#, matches: is_multiline_editable },
    Probe { name: ".Am.Al.editable", matches: is_legacy_editable },
];

pub const TOOLBAR_PROBES: &[Probe] = &[
    Probe { name: "tr.btC td.gU", matches: is_toolbar_cell },
    Probe { name: r#"[role="toolbar"]"#, matches: is_role_toolbar },
];

pub const SEND_PROBES: &[Probe] = &[
    Probe { name: r#"[role="button"][data-tooltip^="Send"]"#, matches: is_send_tooltip },
    Probe { name: ".T-I.aoO", matches: is_send_classes },
    Probe { name: r#"[role="button"][aria-label^="Send"]"#, matches: is_send_label },
];

fn is_subjectbox(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "input" && attr_is(tree, node, "name", "subjectbox")
}

fn is_labelled_subject(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "input" && attr_is(tree, node, "aria-label", "Subject")
}

fn is_placeholder_subject(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "input" && attr_is(tree, node, "placeholder", "Subject")
}

fn is_any_subject(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    SUBJECT_PROBES.iter().any(|p| (p.matches)(tree, node))
}

fn is_editable(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "contenteditable", "true")
}

fn is_message_body(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "div" && attr_is(tree, node, "aria-label", "Message Body")
}

fn is_multiline_editable(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "div" && is_editable(tree, node) && attr_is(tree, node, "aria-multiline", "true")
}

fn is_legacy_editable(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    ["Am", "Al", "editable"].iter().all(|c| has_class(tree, node, c))
}

fn is_button_row(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "tr" && has_class(tree, node, "btC")
}

fn is_toolbar_cell(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "td" && has_class(tree, node, "gU") && closest(tree, node, is_button_row).is_some()
}

fn is_role_toolbar(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "role", "toolbar")
}

fn attr_starts_with(tree: &dyn SurfaceTree, node: NodeId, name: &str, prefix: &str) -> bool {
    tree.attr(node, name).is_some_and(|v| v.starts_with(prefix))
}

fn is_send_tooltip(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "role", "button") && attr_starts_with(tree, node, "data-tooltip", "Send")
}

fn is_send_classes(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    has_class(tree, node, "T-I") && has_class(tree, node, "aoO")
}

fn is_send_label(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "role", "button") && attr_starts_with(tree, node, "aria-label", "Send")
}

fn is_compose_dialog(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "div"
        && has_class(tree, node, "nH")
        && has_class(tree, node, "Hd")
        && attr_is(tree, node, "role", "dialog")
}

fn is_inline_reply(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "div" && has_class(tree, node, "nH") && has_class(tree, node, "if")
}

fn is_form(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.tag(node) == "form"
}

fn is_dialog(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "role", "dialog")
}

/// Resolve `kind` inside `root`; `None` when nothing matches.
pub fn resolve(tree: &dyn SurfaceTree, root: NodeId, kind: FieldKind) -> Option<NodeId> {
    for probe in kind.probes() {
        if let Some(found) = find_first(tree, root, probe.matches) {
            tracing::trace!(target: "coldiq::bridge", field = kind.as_str(), probe = probe.name, "field resolved");
            return Some(found);
        }
    }
    match kind {
        FieldKind::Body => heuristic_body(tree, root),
        _ => None,
    }
}

/// Editable regions under `root`, excluding any tied to the subject field; the first
/// with visible text wins, else the first candidate.
fn heuristic_body(tree: &dyn SurfaceTree, root: NodeId) -> Option<NodeId> {
    let subject = resolve(tree, root, FieldKind::Subject);
    let candidates: Vec<NodeId> = find_all(tree, root, is_editable)
        .into_iter()
        .filter(|&c| match subject {
            Some(s) => !contains(tree, s, c) && !contains(tree, c, s),
            None => true,
        })
        .collect();

    let chosen = candidates
        .iter()
        .copied()
        .find(|&c| !tree.rendered_text(c).trim().is_empty())
        .or_else(|| candidates.first().copied());
    if chosen.is_some() {
        tracing::debug!(target: "coldiq::bridge", candidates = candidates.len(), "body resolved by heuristic scan");
    }
    chosen
}

/// One compose instance in the host page, identified by its root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositionSurface {
    pub root: NodeId,
}

impl CompositionSurface {
    pub fn new(root: NodeId) -> Self {
        Self { root }
    }

    /// True once the injector has marked this surface.
    pub fn has_control(&self, tree: &dyn SurfaceTree) -> bool {
        attr_is(tree, self.root, CONTROL_MARKER, "true")
    }

    pub fn field(&self, tree: &dyn SurfaceTree, kind: FieldKind) -> Option<NodeId> {
        resolve(tree, self.root, kind)
    }
}

/// Every composition surface currently in the page, in document order.
///
/// Pop-out dialogs and inline replies are matched structurally. Any subject field
/// outside those contributes its nearest `form`, else nearest dialog, else parent.
pub fn find_surfaces(tree: &dyn SurfaceTree) -> Vec<CompositionSurface> {
    let body = tree.body();
    let mut roots: Vec<NodeId> = Vec::new();
    for node in descendants(tree, body) {
        if is_compose_dialog(tree, node) || is_inline_reply(tree, node) {
            roots.push(node);
        }
    }

    for subject in find_all(tree, body, is_any_subject) {
        if roots.iter().any(|&r| contains(tree, r, subject)) {
            continue;
        }
        let fallback = closest(tree, subject, is_form)
            .or_else(|| closest(tree, subject, is_dialog))
            .or_else(|| tree.parent(subject));
        if let Some(root) = fallback {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
    }

    let order: Vec<NodeId> = descendants(tree, body);
    roots.sort_by_key(|r| order.iter().position(|n| n == r).unwrap_or(usize::MAX));
    roots.dedup();
    roots.into_iter().map(CompositionSurface::new).collect()
}

/// Current subject and body text of the surface at `root`. Missing fields read as empty.
pub fn extract_request(tree: &dyn SurfaceTree, root: NodeId) -> AnalysisRequest {
    let subject = resolve(tree, root, FieldKind::Subject)
        .and_then(|n| tree.value(n))
        .unwrap_or_default();
    let body = resolve(tree, root, FieldKind::Body)
        .map(|n| tree.rendered_text(n))
        .unwrap_or_default();
    AnalysisRequest::new(subject, body)
}
