//! Document
//!
//! A DomTree with the standard html/head/body scaffolding, query helpers
//! and the `data-` attribute alias convention used by the engine.

use crate::{DomTree, FragmentParser, NodeId, Selector};

/// Live document the engine reads and mutates
#[derive(Debug, Clone)]
pub struct Document {
    tree: DomTree,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    title: Option<String>,
}

impl Document {
    /// Create an empty document with html/head/body scaffolding
    pub fn new() -> Self {
        let mut tree = DomTree::new();
        let html = tree.create_element("html");
        let head = tree.create_element("head");
        let body = tree.create_element("body");
        tree.append_child(NodeId::ROOT, html);
        tree.append_child(html, head);
        tree.append_child(html, body);
        Self { tree, html, head, body, title: None }
    }

    /// Create a document whose body holds the given markup
    pub fn from_html(body_html: &str) -> Self {
        let mut doc = Self::new();
        let frag = FragmentParser::new().parse(body_html);
        for child in frag.children(NodeId::ROOT) {
            let copied = doc.tree.adopt(&frag, child);
            doc.tree.append_child(doc.body, copied);
        }
        doc
    }

    /// The backing tree
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// The backing tree, mutable
    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    /// Root `<html>` element
    pub fn html(&self) -> NodeId {
        self.html
    }

    /// `<head>` element
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// `<body>` element
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Document title
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Set the document title
    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    /// First attached element with the given id
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree
            .descendants(NodeId::ROOT)
            .into_iter()
            .find(|n| {
                self.tree.get(*n)
                    .and_then(|node| node.as_element())
                    .is_some_and(|e| e.id() == Some(id))
            })
    }

    /// First element matching the selector, in document order
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        let sel = Selector::parse(selector).ok()?;
        self.tree
            .descendants(NodeId::ROOT)
            .into_iter()
            .find(|n| sel.matches(self, *n))
    }

    /// All elements matching the selector, in document order
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let Ok(sel) = Selector::parse(selector) else { return Vec::new() };
        self.tree
            .descendants(NodeId::ROOT)
            .into_iter()
            .filter(|n| sel.matches(self, *n))
            .collect()
    }

    /// First matching descendant of `root` (the `find` relative form)
    pub fn find_within(&self, root: NodeId, selector: &str) -> Option<NodeId> {
        let sel = Selector::parse(selector).ok()?;
        self.tree
            .descendants(root)
            .into_iter()
            .filter(|n| *n != root)
            .find(|n| sel.matches(self, *n))
    }

    /// Closest matching ancestor-or-self (the `closest` relative form)
    pub fn closest(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let sel = Selector::parse(selector).ok()?;
        if sel.matches(self, node) {
            return Some(node);
        }
        self.tree.ancestors(node).into_iter().find(|a| sel.matches(self, *a))
    }

    /// Next match after `node` in document order (the `next` relative form)
    pub fn next_match(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let sel = Selector::parse(selector).ok()?;
        let all = self.tree.descendants(NodeId::ROOT);
        let pos = all.iter().position(|n| *n == node)?;
        all[pos + 1..].iter().copied().find(|n| sel.matches(self, *n))
    }

    /// Previous match before `node` in document order (`previous`)
    pub fn previous_match(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let sel = Selector::parse(selector).ok()?;
        let all = self.tree.descendants(NodeId::ROOT);
        let pos = all.iter().position(|n| *n == node)?;
        all[..pos].iter().rev().copied().find(|n| sel.matches(self, *n))
    }

    /// Attribute lookup honoring the `data-` alias: `name` first, then
    /// `data-name`.
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        let elem = self.tree.get(node)?.as_element()?;
        elem.get_attr(name)
            .or_else(|| elem.get_attr(&format!("data-{name}")))
    }

    /// Does the node carry the attribute (either spelling)?
    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Closest ancestor-or-self carrying the attribute, with its value
    pub fn closest_attr(&self, node: NodeId, name: &str) -> Option<(NodeId, String)> {
        if let Some(v) = self.attr(node, name) {
            return Some((node, v.to_string()));
        }
        for anc in self.tree.ancestors(node) {
            if let Some(v) = self.attr(anc, name) {
                return Some((anc, v.to_string()));
            }
        }
        None
    }

    /// Tag name of a node, if it is an element
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.tree.get(node)?.as_element().map(|e| e.tag.as_str())
    }

    /// Element id of a node
    pub fn id_of(&self, node: NodeId) -> Option<&str> {
        self.tree.get(node)?.as_element()?.id()
    }

    /// Current value of a form control (`value` attribute)
    pub fn value_of(&self, node: NodeId) -> Option<&str> {
        self.tree.get(node)?.as_element()?.get_attr("value")
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffolding() {
        let doc = Document::new();
        assert_eq!(doc.tag(doc.head()), Some("head"));
        assert_eq!(doc.tag(doc.body()), Some("body"));
        assert!(doc.tree().is_attached(doc.body()));
        assert!(doc.head() < doc.body());
    }

    #[test]
    fn test_from_html_and_query() {
        let doc = Document::from_html(r#"<div id="list"><span class="item">A</span></div>"#);
        let list = doc.get_element_by_id("list").unwrap();
        assert_eq!(doc.tag(list), Some("div"));

        let item = doc.query_selector(".item").unwrap();
        assert_eq!(doc.closest(item, "#list"), Some(list));
        assert_eq!(doc.find_within(list, "span"), Some(item));
    }

    #[test]
    fn test_attr_alias() {
        let doc = Document::from_html(r#"<div id="a" data-hw-get="/x"></div><div id="b" hw-get="/y" data-hw-get="/z"></div>"#);
        let a = doc.get_element_by_id("a").unwrap();
        let b = doc.get_element_by_id("b").unwrap();
        assert_eq!(doc.attr(a, "hw-get"), Some("/x"));
        // Bare spelling wins over the data- alias
        assert_eq!(doc.attr(b, "hw-get"), Some("/y"));
    }

    #[test]
    fn test_next_previous() {
        let doc = Document::from_html(r#"<input id="i"><div class="err"></div>"#);
        let input = doc.get_element_by_id("i").unwrap();
        let err = doc.query_selector(".err").unwrap();
        assert_eq!(doc.next_match(input, ".err"), Some(err));
        assert_eq!(doc.previous_match(err, "input"), Some(input));
    }
}
