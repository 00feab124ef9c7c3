//! Engine facade
//!
//! Owns the live document, the run loop and every collaborator seam.
//! The host drives it with `dispatch` (events) and `advance` (time);
//! everything else follows from attributes on the tree.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use hywire_dom::{Document, NodeId};
use hywire_net::{RequestId, SocketId, StreamId, Transport, TransportEvent, Verb};
use tracing::debug;

use crate::attrs;
use crate::config::EngineConfig;
use crate::env::{
    AcceptAllPrompter, Geometry, LocationApi, MemoryLocation, MemoryStorage, NullGeometry,
    Prompter, Storage,
};
use crate::event::DomEvent;
use crate::extensions::ExtensionRegistry;
use crate::history::HistoryCache;
use crate::request::{ActiveRequest, QueuedRequest, RequestCause};
use crate::scheduler::Scheduler;
use crate::signals::{names, Signal, SignalHub};
use crate::state::{AttachPoint, StateStore};
use crate::swap::{SettleJob, SwapJob};

/// Jitter sample used for reconnect backoff. Hosts needing real jitter
/// randomize the policy instead.
pub(crate) const RECONNECT_JITTER: f64 = 0.5;

/// Deferred work, drained by the virtual clock
#[derive(Debug, Clone)]
pub(crate) enum Task {
    Poll { node: NodeId, index: usize },
    Load { node: NodeId, index: usize },
    Debounced { node: NodeId, index: usize },
    Timeout { request: RequestId },
    ApplySwap { job: u64 },
    Settle { job: u64 },
    RevealScan,
    StreamReconnect { binding: u64 },
    SocketReconnect { binding: u64 },
}

#[derive(Debug)]
pub(crate) struct StreamBinding {
    pub owner: NodeId,
    pub url: String,
    pub stream: StreamId,
    pub attempts: u32,
}

#[derive(Debug)]
pub(crate) struct SocketBinding {
    pub owner: NodeId,
    pub url: String,
    pub socket: SocketId,
    pub attempts: u32,
}

/// The attribute-driven hypermedia engine
pub struct Engine<T: Transport> {
    pub doc: Document,
    pub config: EngineConfig,
    pub signals: SignalHub,
    pub transport: T,
    pub extensions: ExtensionRegistry,
    pub(crate) state: StateStore,
    pub(crate) scheduler: Scheduler<Task>,
    pub(crate) history: HistoryCache,
    pub(crate) storage: Box<dyn Storage>,
    pub(crate) location: Box<dyn LocationApi>,
    pub(crate) prompter: Box<dyn Prompter>,
    pub(crate) geometry: Box<dyn Geometry>,
    pub(crate) active: HashMap<RequestId, ActiveRequest>,
    pub(crate) sync_queues: HashMap<NodeId, std::collections::VecDeque<QueuedRequest>>,
    pub(crate) swap_jobs: HashMap<u64, SwapJob>,
    pub(crate) settle_jobs: HashMap<u64, SettleJob>,
    pub(crate) streams: HashMap<u64, StreamBinding>,
    pub(crate) sockets: HashMap<u64, SocketBinding>,
    pub(crate) job_seq: u64,
    pub(crate) reveal_scan_active: bool,
    pub(crate) focused: Option<NodeId>,
    pub(crate) selection: Option<(usize, usize)>,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    pub fn with_config(transport: T, config: EngineConfig) -> Self {
        let storage = MemoryStorage::new();
        let history = HistoryCache::load(
            config.history_cache_size,
            &storage,
            &config.history_storage_key,
        );
        Self {
            doc: Document::new(),
            config,
            signals: SignalHub::new(),
            transport,
            extensions: ExtensionRegistry::new(),
            state: StateStore::new(),
            scheduler: Scheduler::new(),
            history,
            storage: Box::new(storage),
            location: Box::new(MemoryLocation::default()),
            prompter: Box::new(AcceptAllPrompter),
            geometry: Box::new(NullGeometry),
            active: HashMap::new(),
            sync_queues: HashMap::new(),
            swap_jobs: HashMap::new(),
            settle_jobs: HashMap::new(),
            streams: HashMap::new(),
            sockets: HashMap::new(),
            job_seq: 0,
            reveal_scan_active: false,
            focused: None,
            selection: None,
        }
    }

    pub fn set_storage(&mut self, storage: impl Storage + 'static) {
        self.storage = Box::new(storage);
        self.history = HistoryCache::load(
            self.config.history_cache_size,
            self.storage.as_ref(),
            &self.config.history_storage_key,
        );
    }

    pub fn set_location(&mut self, location: impl LocationApi + 'static) {
        self.location = Box::new(location);
    }

    pub fn set_prompter(&mut self, prompter: impl Prompter + 'static) {
        self.prompter = Box::new(prompter);
    }

    pub fn set_geometry(&mut self, geometry: impl Geometry + 'static) {
        self.geometry = Box::new(geometry);
    }

    /// Current virtual time
    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    pub fn current_url(&self) -> String {
        self.location.current_url()
    }

    /// Give a control focus, as the host's focus events report it
    pub fn focus(&mut self, selector: &str) {
        self.focused = self.doc.query_selector(selector);
        self.selection = None;
    }

    /// Record the text selection range of the focused control
    pub fn set_selection(&mut self, start: usize, end: usize) {
        if self.focused.is_some() {
            self.selection = Some((start, end));
        }
    }

    /// The element currently holding focus, if any survives in the
    /// document
    pub fn focused(&self) -> Option<NodeId> {
        self.focused.filter(|n| self.doc.tree().is_attached(*n))
    }

    /// Recorded selection range on the focused control
    pub fn selection(&self) -> Option<(usize, usize)> {
        self.selection
    }

    /// Replace the document and process every element in it
    pub fn load_html(&mut self, html: &str) {
        self.doc = Document::from_html(html);
        self.state = StateStore::new();
        self.focused = None;
        self.selection = None;
        self.process_tree(NodeId::ROOT);
    }

    /// Process every element under `root` (including it)
    pub fn process_tree(&mut self, root: NodeId) {
        let mut nodes = vec![root];
        nodes.extend(self.doc.tree().descendants(root));
        for node in nodes {
            if self.doc.tree().get(node).is_some_and(|n| n.is_element()) {
                self.process_node(node);
            }
        }
    }

    /// Hash of the node's own attributes, for change detection
    pub(crate) fn attr_revision(&self, node: NodeId) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        if let Some(elem) = self.doc.tree().get(node).and_then(|n| n.as_element()) {
            elem.tag.hash(&mut hasher);
            for attr in &elem.attrs {
                attr.name.hash(&mut hasher);
                attr.value.hash(&mut hasher);
            }
        }
        hasher.finish().max(1)
    }

    /// Emit a signal through the hub and the node's active extensions.
    /// Returns false when any observer vetoes.
    pub(crate) fn emit(&mut self, name: &str, node: NodeId, detail: impl Into<String>) -> bool {
        let signal = Signal::new(name, node, detail);
        let exts = if node.is_some() && self.doc.tree().get(node).is_some() {
            self.extensions.active_for(&self.doc, node)
        } else {
            Vec::new()
        };
        let ext_ok = self.extensions.offer_signal(&exts, &signal);
        let hub_ok = self.signals.emit(signal);
        ext_ok && hub_ok
    }

    pub(crate) fn next_job(&mut self) -> u64 {
        self.job_seq += 1;
        self.job_seq
    }

    /// Resolve an extended selector relative to `node`
    pub(crate) fn resolve_extended(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let selector = selector.trim();
        match selector {
            "this" => Some(node),
            "body" => Some(self.doc.body()),
            _ => {
                if let Some(rest) = selector.strip_prefix("closest ") {
                    self.doc.closest(node, rest.trim())
                } else if let Some(rest) = selector.strip_prefix("find ") {
                    self.doc.find_within(node, rest.trim())
                } else if let Some(rest) = selector.strip_prefix("next ") {
                    self.doc.next_match(node, rest.trim())
                } else if let Some(rest) = selector.strip_prefix("previous ") {
                    self.doc.previous_match(node, rest.trim())
                } else {
                    self.doc.query_selector(selector)
                }
            }
        }
    }

    /// Dispatch an event through the engine: listeners on the target and
    /// its ancestors run closest-first, document-level listeners last.
    pub fn dispatch(&mut self, mut event: DomEvent) {
        let mut path = vec![event.target];
        path.extend(self.doc.tree().ancestors(event.target));

        let listeners = self.state.listeners_for(&event.name);
        let mut matched: Vec<(usize, usize, NodeId, usize)> = Vec::new();
        for (order, (_id, attach, owner, index)) in listeners.into_iter().enumerate() {
            let depth = match attach {
                AttachPoint::Node(n) => match path.iter().position(|p| *p == n) {
                    Some(d) => d,
                    None => continue,
                },
                AttachPoint::Document => path.len(),
            };
            matched.push((depth, order, owner, index));
        }
        matched.sort();

        for (_, _, owner, index) in matched {
            if event.consumed {
                break;
            }
            self.handle_trigger_match(owner, index, &mut event);
        }
    }

    /// Dispatch a named event on the first node matching `selector`
    pub fn trigger(&mut self, selector: &str, event_name: &str) {
        if let Some(node) = self.doc.query_selector(selector) {
            self.dispatch(DomEvent::new(event_name, node));
        }
    }

    /// Programmatic request entry point. Without a target selector the
    /// body receives the response.
    pub fn ajax(&mut self, verb: Verb, path: &str, target: Option<&str>) {
        let source = target
            .and_then(|s| self.doc.query_selector(s))
            .unwrap_or_else(|| self.doc.body());
        self.issue_request(source, verb, path, RequestCause::default());
    }

    /// Advance the virtual clock, running every due task and draining
    /// the transport between tasks.
    pub fn advance(&mut self, ms: u64) {
        let deadline = self.scheduler.now_ms().saturating_add(ms);
        loop {
            self.pump_transport();
            match self.scheduler.pop_due(deadline) {
                Some((_, task)) => self.run_task(task),
                None => break,
            }
        }
        self.pump_transport();
    }

    /// Drain transport completions without advancing time
    pub fn tick(&mut self) {
        self.advance(0);
    }

    fn pump_transport(&mut self) {
        loop {
            let events = self.transport.poll();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.handle_transport_event(event);
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Completed { id, response } => self.handle_completed(id, response),
            TransportEvent::Failed { id, error } => self.handle_failed(id, error),
            TransportEvent::StreamMessage { id, event } => self.handle_stream_message(id, event),
            TransportEvent::StreamClosed { id } => self.handle_stream_closed(id),
            TransportEvent::SocketMessage { id, text } => self.handle_socket_message(id, &text),
            TransportEvent::SocketClosed { id } => self.handle_socket_closed(id),
        }
    }

    fn run_task(&mut self, task: Task) {
        debug!("task {:?} at t={}", task, self.scheduler.now_ms());
        match task {
            Task::Poll { node, index } => self.run_poll(node, index),
            Task::Load { node, index } => self.run_load(node, index),
            Task::Debounced { node, index } => self.run_debounced(node, index),
            Task::Timeout { request } => self.run_timeout(request),
            Task::ApplySwap { job } => self.run_swap_job(job),
            Task::Settle { job } => self.run_settle_job(job),
            Task::RevealScan => self.run_reveal_scan(),
            Task::StreamReconnect { binding } => self.run_stream_reconnect(binding),
            Task::SocketReconnect { binding } => self.run_socket_reconnect(binding),
        }
    }

    // --- streams ---------------------------------------------------

    pub(crate) fn open_stream(&mut self, owner: NodeId, url: &str) {
        let stream = self.transport.open_stream(url);
        let key = self.next_job();
        self.streams.insert(
            key,
            StreamBinding { owner, url: url.to_string(), stream, attempts: 0 },
        );
    }

    fn handle_stream_message(&mut self, id: StreamId, event: hywire_net::SseEvent) {
        let Some((key, owner)) = self
            .streams
            .iter()
            .find(|(_, b)| b.stream == id)
            .map(|(k, b)| (*k, b.owner))
        else {
            return;
        };
        // A source whose owner left the document is closed lazily here
        if !self.doc.tree().is_attached(owner) {
            self.transport.close_stream(id);
            self.streams.remove(&key);
            return;
        }
        if let Some(binding) = self.streams.get_mut(&key) {
            binding.attempts = 0;
        }

        // Declarative content swaps within the connecting subtree
        let mut subtree = vec![owner];
        subtree.extend(self.doc.tree().descendants(owner));
        let swap_targets: Vec<NodeId> = subtree
            .iter()
            .copied()
            .filter(|n| {
                self.doc.attr(*n, attrs::SSE_SWAP).is_some_and(|v| {
                    v.split(',').map(str::trim).any(|t| t == event.event_type)
                })
            })
            .collect();
        for target in swap_targets {
            self.swap_inner(target, &event.data);
        }

        // sse: trigger specs bound within the connecting subtree
        let hits = self.state.nodes_with_triggers(|t| {
            t.spec.kind == hywire_expr::TriggerKind::Sse
                && t.spec.event_name == event.event_type
                && !t.once_fired
        });
        for (node, index) in hits {
            let in_subtree =
                node == owner || self.doc.tree().ancestors(node).contains(&owner);
            if in_subtree && self.doc.tree().is_attached(node) {
                if let Some(t) = self.state.trigger_mut(node, index) {
                    if t.spec.once {
                        t.once_fired = true;
                    }
                }
                self.fire_action(node, index);
            }
        }
    }

    fn handle_stream_closed(&mut self, id: StreamId) {
        let Some((key, owner)) = self
            .streams
            .iter()
            .find(|(_, b)| b.stream == id)
            .map(|(k, b)| (*k, b.owner))
        else {
            return;
        };
        self.emit(names::STREAM_ERROR, owner, "stream closed");
        let attempts = self.streams.get(&key).map(|b| b.attempts).unwrap_or(0);
        let delay = self
            .config
            .stream_reconnect
            .delay_ms(attempts, RECONNECT_JITTER);
        if let Some(binding) = self.streams.get_mut(&key) {
            binding.attempts += 1;
        }
        self.scheduler.schedule(delay, Task::StreamReconnect { binding: key });
    }

    fn run_stream_reconnect(&mut self, key: u64) {
        let Some((owner, url)) = self
            .streams
            .get(&key)
            .map(|b| (b.owner, b.url.clone()))
        else {
            return;
        };
        if !self.doc.tree().is_attached(owner) {
            self.streams.remove(&key);
            return;
        }
        let stream = self.transport.open_stream(&url);
        if let Some(binding) = self.streams.get_mut(&key) {
            binding.stream = stream;
        }
    }

    // --- sockets ---------------------------------------------------

    pub(crate) fn open_socket(&mut self, owner: NodeId, url: &str) {
        let socket = self.transport.open_socket(url);
        let key = self.next_job();
        self.sockets.insert(
            key,
            SocketBinding { owner, url: url.to_string(), socket, attempts: 0 },
        );
    }

    /// The socket governing a node: nearest `hw-ws-connect` ancestor
    pub(crate) fn socket_for(&self, node: NodeId) -> Option<SocketId> {
        let (owner, _) = self.doc.closest_attr(node, attrs::WS_CONNECT)?;
        self.sockets
            .values()
            .find(|b| b.owner == owner)
            .map(|b| b.socket)
    }

    fn handle_socket_message(&mut self, id: SocketId, text: &str) {
        let Some((key, owner)) = self
            .sockets
            .iter()
            .find(|(_, b)| b.socket == id)
            .map(|(k, b)| (*k, b.owner))
        else {
            return;
        };
        if !self.doc.tree().is_attached(owner) {
            self.transport.close_socket(id);
            self.sockets.remove(&key);
            return;
        }
        if let Some(binding) = self.sockets.get_mut(&key) {
            binding.attempts = 0;
        }
        self.swap_message_content(text);
    }

    fn handle_socket_closed(&mut self, id: SocketId) {
        let Some((key, owner)) = self
            .sockets
            .iter()
            .find(|(_, b)| b.socket == id)
            .map(|(k, b)| (*k, b.owner))
        else {
            return;
        };
        self.emit(names::STREAM_ERROR, owner, "socket closed");
        let attempts = self.sockets.get(&key).map(|b| b.attempts).unwrap_or(0);
        let delay = self
            .config
            .stream_reconnect
            .delay_ms(attempts, RECONNECT_JITTER);
        if let Some(binding) = self.sockets.get_mut(&key) {
            binding.attempts += 1;
        }
        self.scheduler.schedule(delay, Task::SocketReconnect { binding: key });
    }

    fn run_socket_reconnect(&mut self, key: u64) {
        let Some((owner, url)) = self
            .sockets
            .get(&key)
            .map(|b| (b.owner, b.url.clone()))
        else {
            return;
        };
        if !self.doc.tree().is_attached(owner) {
            self.sockets.remove(&key);
            return;
        }
        let socket = self.transport.open_socket(&url);
        if let Some(binding) = self.sockets.get_mut(&key) {
            binding.socket = socket;
        }
    }

    // --- history ---------------------------------------------------

    /// The element whose content history snapshots capture
    pub(crate) fn history_root(&self) -> NodeId {
        self.doc
            .query_selector(&format!("[{}]", attrs::HISTORY_ELT))
            .unwrap_or_else(|| self.doc.body())
    }

    /// Back/forward navigation entry point
    pub fn popstate(&mut self, url: &str) {
        if let Some(entry) = self.history.get(url).cloned() {
            let root = self.history_root();
            self.swap_inner(root, &entry.content);
            if let Some(title) = &entry.title {
                self.doc.set_title(title);
            }
            self.location.replace(url);
            self.emit(names::HISTORY_RESTORE, root, url);
            return;
        }

        self.emit(names::HISTORY_CACHE_MISS, NodeId::NONE, url);
        match self.config.history_cache_miss {
            crate::config::CacheMissPolicy::Fetch => {
                let root = self.history_root();
                self.location.replace(url);
                self.issue_request(
                    root,
                    Verb::Get,
                    url,
                    RequestCause { history_restore: true, ..RequestCause::default() },
                );
            }
            crate::config::CacheMissPolicy::FullReload => {
                self.location.assign(url);
                self.location.reload();
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("now_ms", &self.scheduler.now_ms())
            .field("active_requests", &self.active.len())
            .field("streams", &self.streams.len())
            .field("sockets", &self.sockets.len())
            .finish()
    }
}
