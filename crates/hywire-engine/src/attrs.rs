//! Attribute vocabulary and inheritance
//!
//! All engine behavior is declared through `hw-*` attributes (with a
//! `data-hw-*` alias handled at the DOM layer). Most attributes are
//! inherited from ancestors unless an ancestor opts out with
//! `hw-disinherit`.

use hywire_dom::{Document, NodeId};

pub const GET: &str = "hw-get";
pub const POST: &str = "hw-post";
pub const PUT: &str = "hw-put";
pub const PATCH: &str = "hw-patch";
pub const DELETE: &str = "hw-delete";

pub const TRIGGER: &str = "hw-trigger";
pub const TARGET: &str = "hw-target";
pub const SWAP: &str = "hw-swap";
pub const SWAP_OOB: &str = "hw-swap-oob";
pub const SELECT: &str = "hw-select";
pub const SELECT_OOB: &str = "hw-select-oob";
pub const SYNC: &str = "hw-sync";
pub const HEADERS: &str = "hw-headers";
pub const VALS: &str = "hw-vals";
pub const VARS: &str = "hw-vars";
pub const PARAMS: &str = "hw-params";
pub const ENCODING: &str = "hw-encoding";
pub const VALIDATE: &str = "hw-validate";
pub const INCLUDE: &str = "hw-include";
pub const BOOST: &str = "hw-boost";
pub const PUSH_URL: &str = "hw-push-url";
pub const REPLACE_URL: &str = "hw-replace-url";
pub const CONFIRM: &str = "hw-confirm";
pub const PROMPT: &str = "hw-prompt";
pub const EXT: &str = "hw-ext";
pub const WS_CONNECT: &str = "hw-ws-connect";
pub const WS_SEND: &str = "hw-ws-send";
pub const SSE_CONNECT: &str = "hw-sse-connect";
pub const SSE_SWAP: &str = "hw-sse-swap";
pub const PRESERVE: &str = "hw-preserve";
pub const HISTORY: &str = "hw-history";
pub const HISTORY_ELT: &str = "hw-history-elt";
pub const INDICATOR: &str = "hw-indicator";
pub const DISABLED_ELT: &str = "hw-disabled-elt";
pub const DISINHERIT: &str = "hw-disinherit";
pub const DISABLE: &str = "hw-disable";

/// The five verb attributes, checked in order
pub const VERB_ATTRS: [(&str, hywire_net::Verb); 5] = [
    (GET, hywire_net::Verb::Get),
    (POST, hywire_net::Verb::Post),
    (PUT, hywire_net::Verb::Put),
    (PATCH, hywire_net::Verb::Patch),
    (DELETE, hywire_net::Verb::Delete),
];

fn disinherits(doc: &Document, ancestor: NodeId, name: &str) -> bool {
    match doc.attr(ancestor, DISINHERIT) {
        Some(list) => list.split_whitespace().any(|t| t == "*" || t == name),
        None => false,
    }
}

/// Look up `name` on `node`, then on each ancestor. An ancestor that
/// declares `hw-disinherit` for the attribute (or `*`) does not pass
/// its value down.
pub fn inherited_attr(doc: &Document, node: NodeId, name: &str) -> Option<(NodeId, String)> {
    if let Some(v) = doc.attr(node, name) {
        return Some((node, v.to_string()));
    }
    for ancestor in doc.tree().ancestors(node) {
        if let Some(v) = doc.attr(ancestor, name) {
            if disinherits(doc, ancestor, name) {
                return None;
            }
            return Some((ancestor, v.to_string()));
        }
        if disinherits(doc, ancestor, name) {
            return None;
        }
    }
    None
}

/// Inherited lookup returning only the value
pub fn inherited_value(doc: &Document, node: NodeId, name: &str) -> Option<String> {
    inherited_attr(doc, node, name).map(|(_, v)| v)
}
