//! DOM Node
//!
//! Compact node representation: sibling/child links are NodeIds into the
//! arena, node-specific payload lives in the NodeData enum.

use crate::NodeId;

/// DOM node: tree links plus payload
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (NONE if detached or root)
    pub parent: NodeId,
    /// First child
    pub first_child: NodeId,
    /// Last child (for O(1) append)
    pub last_child: NodeId,
    /// Previous sibling
    pub prev_sibling: NodeId,
    /// Next sibling
    pub next_sibling: NodeId,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root
    Document,
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
}

/// Element-specific data
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Tag name (lowercase)
    pub tag: String,
    /// Attributes in document order
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    /// Get an attribute value
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute (replaces existing)
    pub fn set_attr(&mut self, name: &str, value: &str) {
        for attr in self.attrs.iter_mut() {
            if attr.name == name {
                attr.value = value.to_string();
                return;
            }
        }
        self.attrs.push(Attribute {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    /// Remove an attribute, returning whether it existed
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        self.attrs.len() != before
    }

    /// Cached-style id lookup
    pub fn id(&self) -> Option<&str> {
        self.get_attr("id")
    }

    /// Class list iterator
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.get_attr("class").unwrap_or("").split_whitespace()
    }

    /// Check for a class
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Add a class if absent
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let mut list = self.get_attr("class").unwrap_or("").to_string();
        if !list.is_empty() {
            list.push(' ');
        }
        list.push_str(class);
        self.set_attr("class", &list);
    }

    /// Remove a class if present
    pub fn remove_class(&mut self, class: &str) {
        let Some(current) = self.get_attr("class") else { return };
        let list: Vec<&str> = current.split_whitespace().filter(|c| *c != class).collect();
        if list.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", &list.join(" "));
        }
    }
}

/// Attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attrs() {
        let mut e = ElementData::new("DIV");
        assert_eq!(e.tag, "div");

        e.set_attr("id", "main");
        e.set_attr("id", "other");
        assert_eq!(e.id(), Some("other"));
        assert_eq!(e.attrs.len(), 1);

        assert!(e.remove_attr("id"));
        assert!(!e.remove_attr("id"));
    }

    #[test]
    fn test_class_list() {
        let mut e = ElementData::new("div");
        e.add_class("a");
        e.add_class("b");
        e.add_class("a");
        assert_eq!(e.get_attr("class"), Some("a b"));

        e.remove_class("a");
        assert_eq!(e.get_attr("class"), Some("b"));
        e.remove_class("b");
        assert_eq!(e.get_attr("class"), None);
    }
}
