//! Form controls
//!
//! Input value collection and the native constraint checks the engine
//! runs before dispatching a request.

use crate::{Document, NodeId};

/// A collected parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Single(String),
    Multi(Vec<String>),
}

impl FormValue {
    /// All values, single or multi
    pub fn values(&self) -> Vec<&str> {
        match self {
            FormValue::Single(v) => vec![v.as_str()],
            FormValue::Multi(vs) => vs.iter().map(|v| v.as_str()).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            FormValue::Single(v) => {
                *self = FormValue::Multi(vec![std::mem::take(v), value]);
            }
            FormValue::Multi(vs) => vs.push(value),
        }
    }
}

/// Ordered key -> value|value[] mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    entries: Vec<(String, FormValue)>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, merging into a multi-value on repeated names
    pub fn append(&mut self, name: &str, value: &str) {
        for (k, v) in self.entries.iter_mut() {
            if k == name {
                v.push(value.to_string());
                return;
            }
        }
        self.entries.push((name.to_string(), FormValue::Single(value.to_string())));
    }

    /// Replace any existing value for `name`
    pub fn set(&mut self, name: &str, value: FormValue) {
        self.entries.retain(|(k, _)| k != name);
        self.entries.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| k != name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keep only names accepted by the filter
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|(k, _)| keep(k));
    }

    /// Merge `other` in, overriding on name conflicts
    pub fn override_with(&mut self, other: FormValues) {
        for (name, value) in other.entries {
            self.set(&name, value);
        }
    }
}

const CONTROL_TAGS: &[&str] = &["input", "select", "textarea", "button"];

fn is_control(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(|t| CONTROL_TAGS.contains(&t))
}

/// Should this control contribute a value?
fn is_submittable(doc: &Document, node: NodeId) -> bool {
    let Some(elem) = doc.tree().get(node).and_then(|n| n.as_element()) else {
        return false;
    };
    if elem.get_attr("name").is_none_or(|n| n.is_empty()) {
        return false;
    }
    if elem.get_attr("disabled").is_some() {
        return false;
    }
    if elem.tag == "input" {
        let ty = elem.get_attr("type").unwrap_or("text");
        if (ty == "checkbox" || ty == "radio") && elem.get_attr("checked").is_none() {
            return false;
        }
    }
    true
}

fn append_control(doc: &Document, node: NodeId, out: &mut FormValues) {
    if !is_submittable(doc, node) {
        return;
    }
    let elem = doc.tree().get(node).and_then(|n| n.as_element());
    let Some(elem) = elem else { return };
    let name = elem.get_attr("name").unwrap_or_default().to_string();

    if elem.tag == "select" {
        for option in doc.tree().descendants(node) {
            let Some(opt) = doc.tree().get(option).and_then(|n| n.as_element()) else { continue };
            if opt.tag == "option" && opt.get_attr("selected").is_some() {
                let value = opt
                    .get_attr("value")
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| doc.tree().text_content(option));
                out.append(&name, &value);
            }
        }
    } else if elem.tag == "textarea" {
        out.append(&name, &doc.tree().text_content(node));
    } else {
        out.append(&name, elem.get_attr("value").unwrap_or_default());
    }
}

/// Collect request parameters for a triggering node.
///
/// Values from the enclosing form come first; the node's own value
/// overrides on name conflict. Unchecked checkboxes/radios and disabled
/// or nameless controls never contribute.
pub fn collect_values(doc: &Document, node: NodeId) -> FormValues {
    let mut values = FormValues::new();

    let form = if doc.tag(node) == Some("form") {
        Some(node)
    } else {
        doc.closest(node, "form")
    };
    if let Some(form) = form {
        for desc in doc.tree().descendants(form) {
            if is_control(doc, desc) {
                append_control(doc, desc, &mut values);
            }
        }
    }

    if Some(node) != form && is_control(doc, node) && is_submittable(doc, node) {
        let mut own = FormValues::new();
        append_control(doc, node, &mut own);
        values.override_with(own);
    }

    values
}

/// Validity state for form controls
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidityState {
    /// The element's value is missing (for required)
    pub value_missing: bool,
    /// The element's value is too long
    pub too_long: bool,
    /// The element's value is too short
    pub too_short: bool,
}

impl ValidityState {
    /// Check if the control is valid
    pub fn is_valid(&self) -> bool {
        !self.value_missing && !self.too_long && !self.too_short
    }
}

/// One failed native constraint
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub node: NodeId,
    pub name: String,
    pub message: String,
    pub validity: ValidityState,
}

fn validate_control(doc: &Document, node: NodeId) -> Option<ValidationError> {
    let elem = doc.tree().get(node)?.as_element()?;
    if elem.get_attr("disabled").is_some() {
        return None;
    }
    let value = if elem.tag == "textarea" {
        doc.tree().text_content(node)
    } else {
        elem.get_attr("value").unwrap_or_default().to_string()
    };

    let mut state = ValidityState::default();
    if elem.get_attr("required").is_some() && value.is_empty() {
        state.value_missing = true;
    }
    if let Some(max) = elem.get_attr("maxlength").and_then(|v| v.parse::<usize>().ok()) {
        if value.chars().count() > max {
            state.too_long = true;
        }
    }
    if let Some(min) = elem.get_attr("minlength").and_then(|v| v.parse::<usize>().ok()) {
        if !value.is_empty() && value.chars().count() < min {
            state.too_short = true;
        }
    }

    if state.is_valid() {
        return None;
    }
    let name = elem.get_attr("name").unwrap_or_default().to_string();
    let message = if state.value_missing {
        "Please fill out this field".to_string()
    } else if state.too_long {
        "Value is too long".to_string()
    } else {
        "Value is too short".to_string()
    };
    Some(ValidationError { node, name, message, validity: state })
}

/// Run native constraint checks over the node and, for forms, every
/// descendant control. Errors are collected per control.
pub fn validate_node(doc: &Document, node: NodeId) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if doc.tag(node) == Some("form") {
        for desc in doc.tree().descendants(node) {
            if is_control(doc, desc) {
                if let Some(err) = validate_control(doc, desc) {
                    errors.push(err);
                }
            }
        }
    } else if is_control(doc, node) {
        if let Some(err) = validate_control(doc, node) {
            errors.push(err);
        }
    }
    errors
}
