//! SurfaceTree: the bridge's view of the host page.
//!
//! Discovery, injection and write-back never talk to a browser document directly;
//! they go through this trait so the whole pipeline runs against synthetic trees
//! (`DomTree`) in tests and against the live page in a browser binding.

/// Opaque handle to one node of a `SurfaceTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Predicate over a node, used by the ordered selector probes.
pub type NodePredicate = fn(&dyn SurfaceTree, NodeId) -> bool;

/// Minimal read/write surface over a host page tree.
pub trait SurfaceTree: Send {
    /// The document body; injected panels are appended here.
    fn body(&self) -> NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child nodes (elements and text) in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lower-case tag name; empty for text nodes.
    fn tag(&self, node: NodeId) -> String;

    fn attr(&self, node: NodeId, name: &str) -> Option<String>;

    /// Inner-text of the node: descendant text concatenated, `<br>` as `\n`.
    fn rendered_text(&self, node: NodeId) -> String;

    /// Current value of a form control (`input`, `textarea`); `None` otherwise.
    fn value(&self, node: NodeId) -> Option<String>;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    fn prepend_child(&mut self, parent: NodeId, child: NodeId);

    /// Detach `node` (and its subtree) from its parent.
    fn remove(&mut self, node: NodeId);

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str);

    fn remove_attr(&mut self, node: NodeId, name: &str);

    fn set_value(&mut self, node: NodeId, value: &str);

    /// Replace the children of `node` with the parsed `html` fragment.
    fn set_inner_html(&mut self, node: NodeId, html: &str);

    /// Fire the host's "input changed" notification on `node`.
    fn dispatch_input(&mut self, node: NodeId);
}

/// All descendants of `root` (excluding `root`) in document order.
pub fn descendants(tree: &dyn SurfaceTree, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(root).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(tree.children(node).into_iter().rev());
    }
    out
}

/// First descendant of `root` matching `pred`, in document order.
pub fn find_first(tree: &dyn SurfaceTree, root: NodeId, pred: NodePredicate) -> Option<NodeId> {
    descendants(tree, root).into_iter().find(|&n| pred(tree, n))
}

/// Every descendant of `root` matching `pred`, in document order.
pub fn find_all(tree: &dyn SurfaceTree, root: NodeId, pred: NodePredicate) -> Vec<NodeId> {
    descendants(tree, root)
        .into_iter()
        .filter(|&n| pred(tree, n))
        .collect()
}

/// Nearest ancestor of `node` (excluding `node`) matching `pred`.
pub fn closest(tree: &dyn SurfaceTree, node: NodeId, pred: NodePredicate) -> Option<NodeId> {
    let mut current = tree.parent(node);
    while let Some(n) = current {
        if pred(tree, n) {
            return Some(n);
        }
        current = tree.parent(n);
    }
    None
}

/// True when `node` is `ancestor` or lies beneath it.
pub fn contains(tree: &dyn SurfaceTree, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if n == ancestor {
            return true;
        }
        current = tree.parent(n);
    }
    false
}

/// True when `node` is still connected to the document body.
pub fn is_attached(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    contains(tree, tree.body(), node)
}

pub fn has_class(tree: &dyn SurfaceTree, node: NodeId, class: &str) -> bool {
    tree.attr(node, "class")
        .is_some_and(|c| c.split_whitespace().any(|c| c == class))
}

pub fn add_class(tree: &mut dyn SurfaceTree, node: NodeId, class: &str) {
    if has_class(tree, node, class) {
        return;
    }
    let classes = match tree.attr(node, "class") {
        Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
        _ => class.to_string(),
    };
    tree.set_attr(node, "class", &classes);
}

pub fn remove_class(tree: &mut dyn SurfaceTree, node: NodeId, class: &str) {
    let Some(existing) = tree.attr(node, "class") else {
        return;
    };
    let kept: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
    tree.set_attr(node, "class", &kept.join(" "));
}

/// Attribute equality shorthand used by the probes.
pub fn attr_is(tree: &dyn SurfaceTree, node: NodeId, name: &str, expected: &str) -> bool {
    tree.attr(node, name).as_deref() == Some(expected)
}
