//! HTML serialization
//!
//! Used for history snapshots and for tree-equality checks in tests.

use crate::{DomTree, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Serialize the children of a node
pub fn inner_html(tree: &DomTree, node: NodeId) -> String {
    let mut out = String::new();
    for child in tree.children(node) {
        write_node(tree, child, &mut out);
    }
    out
}

/// Serialize a node including itself
pub fn outer_html(tree: &DomTree, node: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, node, &mut out);
    out
}

fn write_node(tree: &DomTree, id: NodeId, out: &mut String) {
    let Some(node) = tree.get(id) else { return };
    match &node.data {
        NodeData::Document => {
            for child in tree.children(id) {
                write_node(tree, child, out);
            }
        }
        NodeData::Element(elem) => {
            out.push('<');
            out.push_str(&elem.tag);
            for attr in &elem.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_into(&attr.value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&elem.tag.as_str()) {
                return;
            }
            for child in tree.children(id) {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(&elem.tag);
            out.push('>');
        }
        NodeData::Text(text) => escape_into(text, false, out),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn escape_into(text: &str, in_attr: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FragmentParser;

    #[test]
    fn test_round_trip() {
        let html = r#"<div id="x" class="a b"><span>Hi</span><br></div>"#;
        let tree = FragmentParser::new().parse(html);
        assert_eq!(inner_html(&tree, NodeId::ROOT), html);
    }

    #[test]
    fn test_escaping() {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        let text = tree.create_text("a < b & c");
        tree.append_child(NodeId::ROOT, div);
        tree.append_child(div, text);
        assert_eq!(outer_html(&tree, div), "<div>a &lt; b &amp; c</div>");
    }

    #[test]
    fn test_void_elements() {
        let tree = FragmentParser::new().parse(r#"<input type="text">"#);
        assert_eq!(inner_html(&tree, NodeId::ROOT), r#"<input type="text">"#);
    }
}
