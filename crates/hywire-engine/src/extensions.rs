//! Extensions
//!
//! Named plugins activated per subtree with `hw-ext`. An extension can
//! observe signals, rewrite response text, take over parameter encoding
//! and implement custom swap styles. Activation is inherited: a name
//! declared on an ancestor covers the whole subtree unless a closer
//! node lists it as `ignore:<name>`.

use hywire_dom::{Document, DomTree, NodeId};
use hywire_net::Verb;

use crate::attrs;
use crate::signals::Signal;

/// Context handed to response-transforming hooks
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub status: u16,
    pub request_url: String,
    pub source: NodeId,
}

/// An engine plugin. Every hook has a no-op default.
pub trait Extension {
    fn name(&self) -> &'static str;

    /// Called once per node the extension becomes active on
    fn init(&mut self, _node: NodeId, _doc: &Document) {}

    /// Observe a signal; returning false vetoes vetoable signals
    fn on_signal(&mut self, _signal: &Signal) -> bool {
        true
    }

    /// Rewrite response text before fragment parsing
    fn transform_response(&mut self, text: String, _ctx: &ResponseContext) -> String {
        text
    }

    /// Claim an unrecognized swap style name
    fn handles_swap(&self, _style: &str) -> bool {
        false
    }

    /// Perform a claimed swap; returns the inserted node ids
    fn handle_swap(
        &mut self,
        _style: &str,
        _target: NodeId,
        _fragment: &DomTree,
        _doc: &mut Document,
    ) -> Vec<NodeId> {
        Vec::new()
    }

    /// Take over body encoding; `Some((content_type, body))` replaces
    /// the default urlencoded form
    fn encode_parameters(
        &mut self,
        _values: &hywire_dom::FormValues,
        _verb: Verb,
    ) -> Option<(String, String)> {
        None
    }
}

/// All registered extensions, by name
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Box<dyn Extension>>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.extensions.iter().map(|e| e.name()))
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ext: Box<dyn Extension>) {
        self.extensions.retain(|e| e.name() != ext.name());
        self.extensions.push(ext);
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn Extension>> {
        self.extensions.iter_mut().find(|e| e.name() == name)
    }

    /// Registered extensions active for a node, nearest declaration
    /// first. Unregistered names in `hw-ext` are skipped.
    pub fn active_for(&self, doc: &Document, node: NodeId) -> Vec<String> {
        let mut active: Vec<String> = Vec::new();
        let mut ignored: Vec<String> = Vec::new();

        let mut chain = vec![node];
        chain.extend(doc.tree().ancestors(node));
        for n in chain {
            let Some(list) = doc.attr(n, attrs::EXT) else { continue };
            for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                if let Some(name) = token.strip_prefix("ignore:") {
                    ignored.push(name.to_string());
                    continue;
                }
                if ignored.iter().any(|i| i == token) {
                    continue;
                }
                if self.extensions.iter().any(|e| e.name() == token)
                    && !active.iter().any(|a| a == token)
                {
                    active.push(token.to_string());
                }
            }
        }
        active
    }

    /// Run `transform_response` through every active extension, in
    /// activation order
    pub fn transform_response(
        &mut self,
        names: &[String],
        mut text: String,
        ctx: &ResponseContext,
    ) -> String {
        for name in names {
            if let Some(ext) = self.get_mut(name) {
                text = ext.transform_response(text, ctx);
            }
        }
        text
    }

    /// Offer a vetoable signal to every active extension; false on veto
    pub fn offer_signal(&mut self, names: &[String], signal: &Signal) -> bool {
        for name in names {
            if let Some(ext) = self.get_mut(name) {
                if !ext.on_signal(signal) {
                    return false;
                }
            }
        }
        true
    }

    /// First active extension claiming a swap style
    pub fn swap_handler(&mut self, names: &[String], style: &str) -> Option<&mut Box<dyn Extension>> {
        let name = names
            .iter()
            .find(|n| {
                self.extensions
                    .iter()
                    .any(|e| e.name() == n.as_str() && e.handles_swap(style))
            })?
            .clone();
        self.get_mut(&name)
    }

    /// First active extension offering a parameter encoding
    pub fn encode_parameters(
        &mut self,
        names: &[String],
        values: &hywire_dom::FormValues,
        verb: Verb,
    ) -> Option<(String, String)> {
        for name in names {
            if let Some(ext) = self.get_mut(name) {
                if let Some(encoded) = ext.encode_parameters(values, verb) {
                    return Some(encoded);
                }
            }
        }
        None
    }
}
