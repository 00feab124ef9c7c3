//! Synthetic DOM events
//!
//! Events are plain values dispatched through the engine rather than a
//! browser event loop. Propagation walks the ancestor chain explicitly;
//! a `consume` trigger modifier stops it.

use std::collections::{BTreeMap, HashSet};

use hywire_dom::{Document, NodeId};
use hywire_expr::{Scope, Value};

/// An event flowing through the engine
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub name: String,
    /// Node the event was dispatched on
    pub target: NodeId,
    /// Named payload fields, readable from trigger conditions
    pub fields: BTreeMap<String, Value>,
    /// Nodes whose triggers already handled this event (for `once`-style
    /// dedup during a single propagation pass)
    pub handled: HashSet<NodeId>,
    /// Set by a `consume` modifier; stops further ancestor handling
    pub consumed: bool,
}

impl DomEvent {
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            fields: BTreeMap::new(),
            handled: HashSet::new(),
            consumed: false,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Resolution scope for trigger conditions: event fields first, then a
/// few well-known properties of the target element.
pub struct EventScope<'a> {
    pub event: &'a DomEvent,
    pub doc: &'a Document,
}

impl Scope for EventScope<'_> {
    fn resolve(&self, path: &[String]) -> Option<Value> {
        match path {
            [key] => {
                if let Some(v) = self.event.fields.get(key) {
                    return Some(v.clone());
                }
                match key.as_str() {
                    "type" => Some(Value::Str(self.event.name.clone())),
                    _ => None,
                }
            }
            [head, rest @ ..] if head == "event" => self.resolve_event(rest),
            [head, rest @ ..] if head == "target" => self.resolve_target(rest),
            _ => None,
        }
    }
}

impl EventScope<'_> {
    fn resolve_event(&self, path: &[String]) -> Option<Value> {
        match path {
            [key] => match key.as_str() {
                "type" => Some(Value::Str(self.event.name.clone())),
                _ => self.event.fields.get(key).cloned(),
            },
            [head, rest @ ..] if head == "target" => self.resolve_target(rest),
            _ => None,
        }
    }

    fn resolve_target(&self, path: &[String]) -> Option<Value> {
        let [key] = path else { return None };
        match key.as_str() {
            "value" => self
                .doc
                .value_of(self.event.target)
                .map(|v| Value::Str(v.to_string())),
            "id" => self
                .doc
                .id_of(self.event.target)
                .map(|v| Value::Str(v.to_string())),
            "tagName" => self
                .doc
                .tag(self.event.target)
                .map(|t| Value::Str(t.to_uppercase())),
            other => self
                .doc
                .attr(self.event.target, other)
                .map(|v| Value::Str(v.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hywire_expr::{compile_condition, CondExpr, Tokenizer, Value};

    fn cond(src: &str) -> CondExpr {
        compile_condition(&Tokenizer::tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn test_field_resolution() {
        let doc = Document::from_html("<input id=\"q\" value=\"abc\">");
        let node = doc.get_element_by_id("q").unwrap();
        let ev = DomEvent::new("keyup", node).with_field("ctrlKey", Value::Bool(true));
        let scope = EventScope { event: &ev, doc: &doc };

        assert!(cond("ctrlKey").eval(&scope).unwrap().is_truthy());
    }

    #[test]
    fn test_target_value_resolution() {
        let doc = Document::from_html("<input id=\"q\" value=\"hello\">");
        let node = doc.get_element_by_id("q").unwrap();
        let ev = DomEvent::new("input", node);
        let scope = EventScope { event: &ev, doc: &doc };

        assert!(cond("target.value == 'hello'").eval(&scope).unwrap().is_truthy());
        assert!(!cond("event.target.value == 'nope'").eval(&scope).unwrap().is_truthy());
    }
}
