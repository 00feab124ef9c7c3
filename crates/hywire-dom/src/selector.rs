//! Simple CSS selector matching
//!
//! Supports the subset the engine needs: tag, `#id`, `.class`, `[attr]`,
//! `[attr=value]`, `*`, descendant combinators and comma-separated lists.

use crate::{Document, DomError, NodeId};

/// Parsed selector list (comma-separated alternatives)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Each alternative is a descendant chain, rightmost last
    pub chains: Vec<Vec<CompoundSelector>>,
}

/// One compound selector (e.g. `input.note[type=text]`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, Option<String>)>,
}

impl Selector {
    /// Parse a selector string
    pub fn parse(input: &str) -> Result<Selector, DomError> {
        let mut chains = Vec::new();
        for alt in input.split(',') {
            let alt = alt.trim();
            if alt.is_empty() {
                return Err(DomError::InvalidSelector(input.to_string()));
            }
            let mut chain = Vec::new();
            for part in alt.split_whitespace() {
                chain.push(parse_compound(part)
                    .ok_or_else(|| DomError::InvalidSelector(input.to_string()))?);
            }
            chains.push(chain);
        }
        if chains.is_empty() {
            return Err(DomError::InvalidSelector(input.to_string()));
        }
        Ok(Selector { chains })
    }

    /// Does `node` match this selector?
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.chains.iter().any(|chain| matches_chain(doc, node, chain))
    }
}

fn matches_chain(doc: &Document, node: NodeId, chain: &[CompoundSelector]) -> bool {
    let Some((last, rest)) = chain.split_last() else { return false };
    if !matches_compound(doc, node, last) {
        return false;
    }
    // Remaining compounds must match ancestors, in order, outermost first
    let mut remaining: &[CompoundSelector] = rest;
    let mut ancestors = doc.tree().ancestors(node);
    while let Some((inner, outer)) = remaining.split_last() {
        let mut found = false;
        while let Some(anc) = ancestors.first().copied() {
            ancestors.remove(0);
            if matches_compound(doc, anc, inner) {
                found = true;
                break;
            }
        }
        if !found {
            return false;
        }
        remaining = outer;
    }
    true
}

fn matches_compound(doc: &Document, node: NodeId, sel: &CompoundSelector) -> bool {
    let Some(elem) = doc.tree().get(node).and_then(|n| n.as_element()) else {
        return false;
    };
    if let Some(tag) = &sel.tag {
        if tag != "*" && elem.tag != *tag {
            return false;
        }
    }
    if let Some(id) = &sel.id {
        if elem.id() != Some(id.as_str()) {
            return false;
        }
    }
    for class in &sel.classes {
        if !elem.has_class(class) {
            return false;
        }
    }
    for (name, value) in &sel.attrs {
        match (elem.get_attr(name), value) {
            (None, _) => return false,
            (Some(_), None) => {}
            (Some(actual), Some(expected)) => {
                if actual != expected {
                    return false;
                }
            }
        }
    }
    true
}

fn parse_compound(input: &str) -> Option<CompoundSelector> {
    let mut sel = CompoundSelector::default();
    let mut chars = input.chars().peekable();
    let mut any = false;

    // Leading tag or universal
    if matches!(chars.peek(), Some(c) if c.is_ascii_alphanumeric() || *c == '*') {
        let mut tag = String::new();
        while matches!(chars.peek(), Some(c) if c.is_ascii_alphanumeric() || *c == '-' || *c == '*') {
            tag.push(chars.next()?);
        }
        sel.tag = Some(tag.to_ascii_lowercase());
        any = true;
    }

    while let Some(c) = chars.next() {
        match c {
            '#' | '.' => {
                let mut name = String::new();
                while matches!(chars.peek(), Some(n) if *n != '#' && *n != '.' && *n != '[') {
                    name.push(chars.next()?);
                }
                if name.is_empty() {
                    return None;
                }
                if c == '#' {
                    sel.id = Some(name);
                } else {
                    sel.classes.push(name);
                }
                any = true;
            }
            '[' => {
                let mut body = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == ']' {
                        closed = true;
                        break;
                    }
                    body.push(n);
                }
                if !closed || body.is_empty() {
                    return None;
                }
                let (name, value) = match body.split_once('=') {
                    Some((n, v)) => (n, Some(v.trim_matches(|q| q == '"' || q == '\'').to_string())),
                    None => (body.as_str(), None),
                };
                sel.attrs.push((name.trim().to_string(), value));
                any = true;
            }
            _ => return None,
        }
    }

    any.then_some(sel)
}
