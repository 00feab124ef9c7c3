//! HTML fragment parsing
//!
//! Uses html5ever's built-in RcDom and converts to our DOM format.
//! Fragments get wrapped in html/head/body by the HTML5 algorithm; the
//! converter re-roots on the body so callers see only fragment content.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use crate::{DomTree, NodeId};

/// Fragment parser
pub struct FragmentParser;

impl FragmentParser {
    /// Create a new fragment parser
    pub fn new() -> Self {
        Self
    }

    /// Parse markup into a tree whose ROOT children are the fragment's
    /// top-level nodes
    pub fn parse(&self, html: &str) -> DomTree {
        self.parse_with_title(html).0
    }

    /// Parse markup, also extracting a `<title>` if the fragment carried
    /// one (the parser hoists it into the synthetic head)
    pub fn parse_with_title(&self, html: &str) -> (DomTree, Option<String>) {
        tracing::trace!("Parsing fragment ({} bytes)", html.len());

        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .unwrap_or_else(|_| {
                parse_document(RcDom::default(), Default::default()).one("")
            });

        let mut full = DomTree::new();
        convert_children(&dom.document, &mut full, NodeId::ROOT);

        let title = find_tag(&full, "title").map(|t| full.text_content(t).trim().to_string());

        // Re-root on body content
        let mut out = DomTree::new();
        if let Some(body) = find_tag(&full, "body") {
            for child in full.children(body) {
                let copied = out.adopt(&full, child);
                out.append_child(NodeId::ROOT, copied);
            }
        }
        (out, title.filter(|t| !t.is_empty()))
    }
}

impl Default for FragmentParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_tag(tree: &DomTree, tag: &str) -> Option<NodeId> {
    tree.descendants(NodeId::ROOT)
        .into_iter()
        .find(|n| tree.get(*n).and_then(|node| node.as_element()).is_some_and(|e| e.tag == tag))
}

/// Convert an RcDom node's children into our DOM format
fn convert_children(handle: &Handle, tree: &mut DomTree, parent: NodeId) {
    for child in handle.children.borrow().iter() {
        match &child.data {
            RcNodeData::Document => {
                convert_children(child, tree, parent);
            }
            RcNodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if !text.trim().is_empty() {
                    let id = tree.create_text(&text);
                    tree.append_child(parent, id);
                }
            }
            RcNodeData::Comment { contents } => {
                let id = tree.create_comment(&contents.to_string());
                tree.append_child(parent, id);
            }
            RcNodeData::Element { name, attrs, .. } => {
                let id = tree.create_element(&name.local);
                if let Some(elem) = tree.get_mut(id).and_then(|n| n.as_element_mut()) {
                    for attr in attrs.borrow().iter() {
                        elem.set_attr(&attr.name.local, &attr.value);
                    }
                }
                tree.append_child(parent, id);
                convert_children(child, tree, id);
            }
            // DOCTYPE and processing instructions are irrelevant inside
            // response fragments
            RcNodeData::Doctype { .. } | RcNodeData::ProcessingInstruction { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_fragment() {
        let tree = FragmentParser::new().parse(r#"<div id="x"><span>Hi</span></div>"#);
        let roots = tree.children(NodeId::ROOT);
        assert_eq!(roots.len(), 1);

        let div = tree.get(roots[0]).unwrap().as_element().unwrap();
        assert_eq!(div.tag, "div");
        assert_eq!(div.id(), Some("x"));
        assert_eq!(tree.text_content(roots[0]), "Hi");
    }

    #[test]
    fn test_parse_multiple_roots() {
        let tree = FragmentParser::new().parse("<p>a</p><p>b</p>");
        assert_eq!(tree.children(NodeId::ROOT).len(), 2);
    }

    #[test]
    fn test_parse_malformed() {
        // The HTML5 algorithm recovers; we should never panic
        let tree = FragmentParser::new().parse("<div><p>Unclosed<span>nested</div>");
        assert!(!tree.children(NodeId::ROOT).is_empty());
    }

    #[test]
    fn test_title_extraction() {
        let (tree, title) =
            FragmentParser::new().parse_with_title("<title>New Title</title><div>body</div>");
        assert_eq!(title.as_deref(), Some("New Title"));
        assert_eq!(tree.children(NodeId::ROOT).len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let tree = FragmentParser::new().parse("");
        assert!(tree.children(NodeId::ROOT).is_empty());
    }
}
