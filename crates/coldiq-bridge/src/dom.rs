//! In-memory `SurfaceTree`: an arena of element and text nodes.
//!
//! Built from an HTML snapshot with `scraper` (the host page as saved from the
//! browser, or a test fixture), mutated through the `SurfaceTree` write operations,
//! and serialised back with [`DomTree::inner_html`]. Every `dispatch_input` is
//! recorded so callers can count change notifications per node.

use scraper::{ElementRef, Html, Node as HtmlNode};

use crate::tree::{NodeId, SurfaceTree};

const VOID_ELEMENTS: &[&str] = &["area", "br", "col", "hr", "img", "input", "link", "meta", "source", "wbr"];
const BLOCK_ELEMENTS: &[&str] = &["div", "p", "li", "tr", "h1", "h2", "h3", "h4", "ul", "ol"];

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        value: Option<String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed document with a single `<body>` root.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
    body: NodeId,
    input_events: Vec<NodeId>,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Empty document: just `<body>`.
    pub fn new() -> Self {
        let body = Node {
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
                value: None,
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
            input_events: Vec::new(),
        }
    }

    /// Parse `html` as a body fragment.
    ///
    /// Whitespace-only text nodes are dropped. Table parts (`tr`, `td`) must sit
    /// inside a `<table>` or the HTML parser discards them.
    pub fn from_html(html: &str) -> Self {
        let mut tree = Self::new();
        let body = tree.body;
        tree.import_fragment(body, html);
        tree
    }

    /// Serialised children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_outer(child, &mut out);
        }
        out
    }

    /// Serialised `node` including its own tag.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_outer(node, &mut out);
        out
    }

    /// Number of `dispatch_input` calls made on `node`.
    pub fn input_events_for(&self, node: NodeId) -> usize {
        self.input_events.iter().filter(|n| **n == node).count()
    }

    /// Total number of `dispatch_input` calls.
    pub fn input_event_count(&self) -> usize {
        self.input_events.len()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.parent = None;
        }
    }

    fn import_fragment(&mut self, parent: NodeId, html: &str) {
        let fragment = Html::parse_fragment(html);
        let mut pending: Vec<_> = fragment
            .root_element()
            .children()
            .rev()
            .map(|child| (parent, child))
            .collect();

        while let Some((parent, source)) = pending.pop() {
            let kind = match source.value() {
                HtmlNode::Element(el) => {
                    let tag = el.name().to_ascii_lowercase();
                    let attrs: Vec<(String, String)> = el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();
                    let value = match tag.as_str() {
                        "input" => Some(el.attr("value").unwrap_or_default().to_string()),
                        "textarea" => ElementRef::wrap(source).map(|e| e.text().collect::<String>()),
                        _ => None,
                    };
                    NodeKind::Element { tag, attrs, value }
                }
                HtmlNode::Text(t) => {
                    let text: &str = t;
                    if text.trim().is_empty() {
                        continue;
                    }
                    NodeKind::Text(text.to_string())
                }
                _ => continue,
            };
            let id = self.push(kind);
            self.nodes[parent.0].children.push(id);
            self.nodes[id.0].parent = Some(parent);
            pending.extend(source.children().rev().map(|child| (id, child)));
        }
    }

    fn write_outer(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(t) => out.push_str(&escape_text(t)),
            NodeKind::Element { tag, attrs, .. } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(v));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &n.children {
                    self.write_outer(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element { tag, .. } if tag == "br" => out.push('\n'),
            NodeKind::Element { tag, .. } => {
                let block = BLOCK_ELEMENTS.contains(&tag.as_str());
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }
}

impl SurfaceTree for DomTree {
    fn body(&self) -> NodeId {
        self.body
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn tag(&self, node: NodeId) -> String {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Element { tag, .. }) => tag.clone(),
            _ => String::new(),
        }
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Element { attrs, .. }) => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    fn rendered_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(n) = self.node(node) {
            for child in &n.children {
                self.collect_text(*child, &mut out);
            }
            if let NodeKind::Text(t) = &n.kind {
                out.push_str(t);
            }
        }
        out
    }

    fn value(&self, node: NodeId) -> Option<String> {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Element { value, .. }) => value.clone(),
            _ => None,
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let value = matches!(tag.as_str(), "input" | "textarea").then(String::new);
        self.push(NodeKind::Element {
            tag,
            attrs: Vec::new(),
            value,
        })
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.node(parent).is_none() || self.node(child).is_none() {
            return;
        }
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.node(parent).is_none() || self.node(child).is_none() {
            return;
        }
        self.detach(child);
        self.nodes[parent.0].children.insert(0, child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn remove(&mut self, node: NodeId) {
        if self.parent(node).is_some() {
            self.detach(node);
        }
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(Node {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        else {
            return;
        };
        match attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(Node {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        {
            attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }

    fn set_value(&mut self, node: NodeId, new_value: &str) {
        if let Some(Node {
            kind: NodeKind::Element { value, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *value = Some(new_value.to_string());
        }
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        if self.node(node).is_none() {
            return;
        }
        for child in self.children(node) {
            self.detach(child);
        }
        self.import_fragment(node, html);
    }

    fn dispatch_input(&mut self, node: NodeId) {
        self.input_events.push(node);
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
