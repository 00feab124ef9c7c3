//! Per-node runtime state
//!
//! The engine keeps all of its bookkeeping outside the tree: bound
//! triggers, the listener table, and reference counts for indicator and
//! disabled classes. Nodes are re-processed whenever their attributes
//! change; the stored revision detects that.

use std::collections::HashMap;

use hywire_dom::NodeId;
use hywire_expr::TriggerSpec;
use hywire_net::RequestId;

use crate::scheduler::TimerId;

/// Listener identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Where a listener is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachPoint {
    Node(NodeId),
    /// `from:document` and `from:window` both attach here; every
    /// dispatched event reaches document-level listeners.
    Document,
}

/// One trigger spec bound to a node, with its firing state
#[derive(Debug)]
pub struct BoundTrigger {
    pub spec: TriggerSpec,
    pub once_fired: bool,
    /// Last observed target value, for the `changed` modifier
    pub last_value: Option<String>,
    pub throttled_until: u64,
    pub debounce_timer: Option<TimerId>,
    pub poll_timer: Option<TimerId>,
    /// Set when a 286 response stops the poll
    pub poll_stopped: bool,
    pub revealed_fired: bool,
}

impl BoundTrigger {
    pub fn new(spec: TriggerSpec) -> Self {
        Self {
            spec,
            once_fired: false,
            last_value: None,
            throttled_until: 0,
            debounce_timer: None,
            poll_timer: None,
            poll_stopped: false,
            revealed_fired: false,
        }
    }
}

#[derive(Debug)]
pub struct ListenerRecord {
    pub id: ListenerId,
    pub event: String,
    pub attach: AttachPoint,
    /// Node whose trigger fires when the listener matches
    pub owner: NodeId,
    /// Index into the owner's bound triggers
    pub trigger_index: usize,
}

/// State for one processed node
#[derive(Debug, Default)]
pub struct NodeState {
    /// Hash of the node's engine attributes at processing time
    pub attr_revision: u64,
    pub triggers: Vec<BoundTrigger>,
    /// Requests governed by this node as sync reference, not yet resolved
    pub in_flight: Vec<RequestId>,
}

/// All engine bookkeeping, keyed off the live tree
#[derive(Debug, Default)]
pub struct StateStore {
    nodes: HashMap<NodeId, NodeState>,
    listeners: Vec<ListenerRecord>,
    next_listener: u64,
    indicator_counts: HashMap<NodeId, u32>,
    disabled_counts: HashMap<NodeId, u32>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeState> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeState {
        self.nodes.entry(id).or_default()
    }

    /// Has this node been processed at this attribute revision?
    pub fn is_current(&self, id: NodeId, revision: u64) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|s| s.attr_revision == revision)
    }

    /// Reset a node for (re)processing: drop its triggers and listeners,
    /// keep in-flight request tracking.
    pub fn begin_processing(&mut self, id: NodeId, revision: u64) {
        self.listeners.retain(|l| l.owner != id);
        let state = self.nodes.entry(id).or_default();
        state.attr_revision = revision;
        state.triggers.clear();
    }

    /// Forget a node entirely (removed from the document)
    pub fn remove_node(&mut self, id: NodeId) {
        self.nodes.remove(&id);
        self.listeners.retain(|l| l.owner != id && l.attach != AttachPoint::Node(id));
        self.indicator_counts.remove(&id);
        self.disabled_counts.remove(&id);
    }

    pub fn add_listener(
        &mut self,
        event: &str,
        attach: AttachPoint,
        owner: NodeId,
        trigger_index: usize,
    ) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push(ListenerRecord {
            id,
            event: event.to_string(),
            attach,
            owner,
            trigger_index,
        });
        id
    }

    /// Listeners matching an event name, in registration order
    pub fn listeners_for(&self, event: &str) -> Vec<(ListenerId, AttachPoint, NodeId, usize)> {
        self.listeners
            .iter()
            .filter(|l| l.event == event)
            .map(|l| (l.id, l.attach, l.owner, l.trigger_index))
            .collect()
    }

    pub fn trigger_mut(&mut self, owner: NodeId, index: usize) -> Option<&mut BoundTrigger> {
        self.nodes.get_mut(&owner).and_then(|s| s.triggers.get_mut(index))
    }

    /// Bump the indicator refcount; true when the class should be added
    pub fn indicator_acquire(&mut self, id: NodeId) -> bool {
        let count = self.indicator_counts.entry(id).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop the indicator refcount; true when the class should be removed
    pub fn indicator_release(&mut self, id: NodeId) -> bool {
        match self.indicator_counts.get_mut(&id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.indicator_counts.remove(&id);
                true
            }
            None => false,
        }
    }

    pub fn disabled_acquire(&mut self, id: NodeId) -> bool {
        let count = self.disabled_counts.entry(id).or_insert(0);
        *count += 1;
        *count == 1
    }

    pub fn disabled_release(&mut self, id: NodeId) -> bool {
        match self.disabled_counts.get_mut(&id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.disabled_counts.remove(&id);
                true
            }
            None => false,
        }
    }

    /// Nodes with at least one bound trigger of the given kind
    pub fn nodes_with_triggers(
        &self,
        pred: impl Fn(&BoundTrigger) -> bool,
    ) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        for (&id, state) in &self.nodes {
            for (i, t) in state.triggers.iter().enumerate() {
                if pred(t) {
                    out.push((id, i));
                }
            }
        }
        out.sort_by_key(|(id, i)| (id.index(), *i));
        out
    }
}
