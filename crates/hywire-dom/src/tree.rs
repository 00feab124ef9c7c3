//! DOM Tree (arena-based allocation)
//!
//! Nodes are never freed from the arena; removal detaches a subtree from
//! its parent, after which `is_attached` reports false for every node in
//! it. Callers that adopt nodes from another tree get fresh ids.

use crate::{Node, NodeData, ElementData, NodeId};

/// Arena-based DOM tree
#[derive(Debug, Default, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Create a tree containing only the document root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Number of nodes in the arena (including detached ones)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::new(NodeData::Element(ElementData::new(tag))))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(Node::new(NodeData::Text(content.to_string())))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.push(Node::new(NodeData::Comment(content.to_string())))
    }

    /// Append a detached node as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.get(child).is_some_and(|n| n.parent.is_none()));
        let old_last = self.nodes[parent.index()].last_child;
        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = old_last;
            node.next_sibling = NodeId::NONE;
        }
        if old_last.is_some() {
            self.nodes[old_last.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        self.nodes[parent.index()].last_child = child;
    }

    /// Insert a detached node immediately before `sibling`
    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        let parent = self.nodes[sibling.index()].parent;
        let prev = self.nodes[sibling.index()].prev_sibling;
        {
            let n = &mut self.nodes[node.index()];
            n.parent = parent;
            n.prev_sibling = prev;
            n.next_sibling = sibling;
        }
        self.nodes[sibling.index()].prev_sibling = node;
        if prev.is_some() {
            self.nodes[prev.index()].next_sibling = node;
        } else if parent.is_some() {
            self.nodes[parent.index()].first_child = node;
        }
    }

    /// Insert a detached node immediately after `sibling`
    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        let next = self.nodes[sibling.index()].next_sibling;
        if next.is_some() {
            self.insert_before(next, node);
        } else {
            let parent = self.nodes[sibling.index()].parent;
            self.append_child(parent, node);
        }
    }

    /// Prepend a detached node as the first child of `parent`
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        let first = self.nodes[parent.index()].first_child;
        if first.is_some() {
            self.insert_before(first, child);
        } else {
            self.append_child(parent, child);
        }
    }

    /// Detach a node (and its subtree) from its parent
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let n = &self.nodes[id.index()];
            (n.parent, n.prev_sibling, n.next_sibling)
        };
        if prev.is_some() {
            self.nodes[prev.index()].next_sibling = next;
        } else if parent.is_some() {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_some() {
            self.nodes[next.index()].prev_sibling = prev;
        } else if parent.is_some() {
            self.nodes[parent.index()].last_child = prev;
        }
        let n = &mut self.nodes[id.index()];
        n.parent = NodeId::NONE;
        n.prev_sibling = NodeId::NONE;
        n.next_sibling = NodeId::NONE;
    }

    /// Remove all children of a node
    pub fn remove_children(&mut self, parent: NodeId) {
        while self.nodes[parent.index()].first_child.is_some() {
            let child = self.nodes[parent.index()].first_child;
            self.detach(child);
        }
    }

    /// Is the node reachable from the document root?
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            if cur == NodeId::ROOT {
                return true;
            }
            match self.get(cur) {
                Some(n) if n.parent.is_some() => cur = n.parent,
                _ => return false,
            }
        }
    }

    /// Children of a node, in order
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.get(parent).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        while cur.is_some() {
            out.push(cur);
            cur = self.nodes[cur.index()].next_sibling;
        }
        out
    }

    /// Ancestors of a node, nearest first, ending at the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.get(id).map(|n| n.parent).unwrap_or(NodeId::NONE);
        while cur.is_some() {
            out.push(cur);
            cur = self.nodes[cur.index()].parent;
        }
        out
    }

    /// Depth-first walk of a subtree (including the root)
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.children(id);
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Deep-copy a subtree from another tree into this one.
    ///
    /// Returns the id of the copied root, detached.
    pub fn adopt(&mut self, other: &DomTree, root: NodeId) -> NodeId {
        let new_id = match &other.nodes[root.index()].data {
            NodeData::Document => self.push(Node::new(NodeData::Document)),
            NodeData::Element(e) => self.push(Node::new(NodeData::Element(e.clone()))),
            NodeData::Text(t) => self.create_text(t),
            NodeData::Comment(c) => self.create_comment(c),
        };
        for child in other.children(root) {
            let copied = self.adopt(other, child);
            self.append_child(new_id, copied);
        }
        new_id
    }

    /// Concatenated text content of a subtree
    pub fn text_content(&self, root: NodeId) -> String {
        let mut out = String::new();
        for id in self.descendants(root) {
            if let Some(text) = self.nodes[id.index()].as_text() {
                out.push_str(text);
            }
        }
        out
    }
}
