//! Node processing and trigger firing
//!
//! `process_node` turns attributes into bound triggers and listeners;
//! `handle_trigger_match` runs the firing gates for a dispatched event,
//! in order: liveness, origin filter, per-event dedup, conditional,
//! changed, throttle, once, consume, then delay or immediate firing.

use hywire_dom::{NodeId, Selector};
use hywire_expr::{default_event_for, parse_triggers, TriggerKind, TriggerSpec};
use hywire_net::Verb;

use crate::attrs;
use crate::engine::{Engine, Task};
use crate::event::{DomEvent, EventScope};
use crate::request::RequestCause;
use crate::signals::names;
use crate::state::{AttachPoint, BoundTrigger};

/// What firing a node's trigger does
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Request { verb: Verb, path: String },
    SocketSend,
    Boost,
}

impl<T: hywire_net::Transport> Engine<T> {
    /// Read attributes on one element and bind its behavior. A node
    /// whose attributes have not changed since last time is skipped.
    pub fn process_node(&mut self, node: NodeId) {
        // `hw-disable` turns the engine off for a whole subtree
        if self.doc.closest_attr(node, attrs::DISABLE).is_some() {
            return;
        }
        let revision = self.attr_revision(node);
        if self.state.is_current(node, revision) {
            return;
        }
        if !self.emit(names::BEFORE_PROCESS, node, "") {
            return;
        }
        self.state.begin_processing(node, revision);

        if let Some(url) = self.doc.attr(node, attrs::SSE_CONNECT).map(str::to_string) {
            if !self.streams.values().any(|b| b.owner == node) {
                self.open_stream(node, &url);
            }
        }
        if let Some(url) = self.doc.attr(node, attrs::WS_CONNECT).map(str::to_string) {
            if !self.sockets.values().any(|b| b.owner == node) {
                self.open_socket(node, &url);
            }
        }

        if self.node_action(node).is_some() {
            let specs = match attrs::inherited_value(&self.doc, node, attrs::TRIGGER) {
                Some(source) => {
                    let (specs, warnings) = parse_triggers(&source);
                    for w in warnings {
                        self.emit(names::SYNTAX_ERROR, node, format!("{}: {}", w.source, w.message));
                    }
                    specs
                }
                None => vec![self.default_trigger(node)],
            };
            for spec in specs {
                self.bind_trigger(node, spec);
            }
        }

        self.emit(names::AFTER_PROCESS, node, "");
    }

    /// Default spec when `hw-trigger` is absent: forms submit, most
    /// controls change, everything else click.
    fn default_trigger(&self, node: NodeId) -> TriggerSpec {
        let tag = self.doc.tag(node).unwrap_or("div");
        let input_type = self.doc.attr(node, "type");
        TriggerSpec::event(default_event_for(tag, input_type))
    }

    pub(crate) fn node_action(&self, node: NodeId) -> Option<Action> {
        for (attr, verb) in attrs::VERB_ATTRS {
            if let Some(path) = self.doc.attr(node, attr) {
                return Some(Action::Request { verb, path: path.to_string() });
            }
        }
        if self.doc.has_attr(node, attrs::WS_SEND) {
            return Some(Action::SocketSend);
        }
        let tag = self.doc.tag(node)?;
        let boostable = match tag {
            "a" => self
                .doc
                .attr(node, "href")
                .is_some_and(|h| !h.is_empty() && !h.starts_with('#')),
            "form" => true,
            _ => false,
        };
        if boostable && attrs::inherited_value(&self.doc, node, attrs::BOOST).as_deref() == Some("true")
        {
            return Some(Action::Boost);
        }
        None
    }

    fn bind_trigger(&mut self, node: NodeId, spec: TriggerSpec) {
        let index = {
            let state = self.state.node_mut(node);
            state.triggers.push(BoundTrigger::new(spec.clone()));
            state.triggers.len() - 1
        };
        // Baseline for the changed gate is the value at bind time
        if spec.changed {
            let value = self.doc.value_of(node).map(str::to_string);
            if let Some(bt) = self.state.trigger_mut(node, index) {
                bt.last_value = Some(value.unwrap_or_default());
            }
        }

        match spec.kind {
            TriggerKind::Event => {
                let attach = match spec.from.as_deref() {
                    None => Some(AttachPoint::Node(node)),
                    Some("document") | Some("window") => Some(AttachPoint::Document),
                    Some(sel) => match self.resolve_extended(node, sel) {
                        Some(n) => Some(AttachPoint::Node(n)),
                        None => {
                            self.emit(
                                names::TARGET_ERROR,
                                node,
                                format!("from:{sel} matched nothing"),
                            );
                            None
                        }
                    },
                };
                if let Some(attach) = attach {
                    self.state.add_listener(&spec.event_name, attach, node, index);
                }
            }
            TriggerKind::Poll => {
                let interval = spec.poll_interval_ms.unwrap_or(0);
                let timer = self.scheduler.schedule(interval, Task::Poll { node, index });
                if let Some(bt) = self.state.trigger_mut(node, index) {
                    bt.poll_timer = Some(timer);
                }
            }
            TriggerKind::Load => {
                self.scheduler
                    .schedule(spec.delay_ms.unwrap_or(0), Task::Load { node, index });
            }
            TriggerKind::Revealed | TriggerKind::Intersect => {
                self.ensure_reveal_scan();
                self.check_reveal(node, index);
            }
            // Routed from stream messages
            TriggerKind::Sse => {}
        }
    }

    /// Run the firing gates for one matched listener
    pub(crate) fn handle_trigger_match(
        &mut self,
        owner: NodeId,
        index: usize,
        event: &mut DomEvent,
    ) {
        if !self.doc.tree().is_attached(owner) {
            return;
        }
        let Some(bt) = self.state.node(owner).and_then(|s| s.triggers.get(index)) else {
            return;
        };
        if bt.once_fired || bt.poll_stopped {
            return;
        }
        let spec = bt.spec.clone();

        // The conditional is judged first, then origin filtering, then
        // the once-per-dispatch mark
        if let Some(filter) = &spec.filter {
            if !self.config.eval_allowed {
                self.emit(names::EVAL_DISALLOWED, owner, event.name.clone());
                return;
            }
            let scope = EventScope { event, doc: &self.doc };
            let verdict = filter.eval(&scope);
            match verdict {
                Ok(v) if v.is_truthy() => {}
                Ok(_) => return,
                Err(e) => {
                    self.emit(names::SYNTAX_ERROR, owner, e.to_string());
                    return;
                }
            }
        }

        if let Some(sel) = &spec.target {
            match Selector::parse(sel) {
                Ok(s) if s.matches(&self.doc, event.target) => {}
                Ok(_) => return,
                Err(e) => {
                    self.emit(names::SYNTAX_ERROR, owner, e.to_string());
                    return;
                }
            }
        }

        if event.handled.contains(&owner) {
            return;
        }
        event.handled.insert(owner);

        if spec.changed {
            let current = self.doc.value_of(owner).unwrap_or_default().to_string();
            let Some(bt) = self.state.trigger_mut(owner, index) else { return };
            if bt.last_value.as_deref() == Some(current.as_str()) {
                return;
            }
            bt.last_value = Some(current);
        }

        if let Some(throttle) = spec.throttle_ms {
            let now = self.scheduler.now_ms();
            let Some(bt) = self.state.trigger_mut(owner, index) else { return };
            if now < bt.throttled_until {
                return;
            }
            bt.throttled_until = now + throttle;
        }

        if spec.once {
            if let Some(bt) = self.state.trigger_mut(owner, index) {
                bt.once_fired = true;
            }
        }
        if spec.consume {
            event.consumed = true;
        }

        if let Some(delay) = spec.delay_ms {
            let previous = self
                .state
                .trigger_mut(owner, index)
                .and_then(|bt| bt.debounce_timer.take());
            if let Some(timer) = previous {
                self.scheduler.cancel(timer);
            }
            let timer = self
                .scheduler
                .schedule(delay, Task::Debounced { node: owner, index });
            if let Some(bt) = self.state.trigger_mut(owner, index) {
                bt.debounce_timer = Some(timer);
            }
            return;
        }

        self.fire_action(owner, index);
    }

    /// Perform the node's declared action
    pub(crate) fn fire_action(&mut self, node: NodeId, index: usize) {
        let Some(action) = self.node_action(node) else { return };
        let is_poll = self
            .state
            .node(node)
            .and_then(|s| s.triggers.get(index))
            .is_some_and(|t| t.spec.kind == TriggerKind::Poll);
        match action {
            Action::Request { verb, path } => {
                let cause = RequestCause {
                    poll_origin: is_poll.then_some((node, index)),
                    ..RequestCause::default()
                };
                self.issue_request(node, verb, &path, cause);
            }
            Action::SocketSend => self.send_socket_message(node),
            Action::Boost => self.issue_boost(node),
        }
    }

    // --- deferred tasks --------------------------------------------

    pub(crate) fn run_poll(&mut self, node: NodeId, index: usize) {
        if !self.doc.tree().is_attached(node) {
            self.emit(names::POLL_CANCELLED, node, "node removed");
            return;
        }
        let Some(bt) = self.state.node(node).and_then(|s| s.triggers.get(index)) else {
            return;
        };
        if bt.poll_stopped {
            return;
        }
        let spec = bt.spec.clone();

        let mut fire = true;
        if let Some(filter) = &spec.filter {
            if self.config.eval_allowed {
                let event = DomEvent::new(&spec.event_name, node);
                let scope = EventScope { event: &event, doc: &self.doc };
                fire = matches!(filter.eval(&scope), Ok(v) if v.is_truthy());
            } else {
                self.emit(names::EVAL_DISALLOWED, node, spec.event_name.clone());
                fire = false;
            }
        }
        if fire {
            self.fire_action(node, index);
        }

        let stopped = self
            .state
            .node(node)
            .and_then(|s| s.triggers.get(index))
            .is_none_or(|t| t.poll_stopped);
        if !stopped {
            let interval = spec.poll_interval_ms.unwrap_or(0);
            let timer = self.scheduler.schedule(interval, Task::Poll { node, index });
            if let Some(bt) = self.state.trigger_mut(node, index) {
                bt.poll_timer = Some(timer);
            }
        }
    }

    pub(crate) fn run_load(&mut self, node: NodeId, index: usize) {
        if !self.doc.tree().is_attached(node) {
            return;
        }
        let Some(spec) = self.state.node(node).and_then(|s| s.triggers.get(index)).map(|t| t.spec.clone())
        else {
            return;
        };
        if let Some(filter) = &spec.filter {
            if !self.config.eval_allowed {
                self.emit(names::EVAL_DISALLOWED, node, spec.event_name.clone());
                return;
            }
            let event = DomEvent::new(&spec.event_name, node);
            let scope = EventScope { event: &event, doc: &self.doc };
            if !matches!(filter.eval(&scope), Ok(v) if v.is_truthy()) {
                return;
            }
        }
        self.fire_action(node, index);
    }

    pub(crate) fn run_debounced(&mut self, node: NodeId, index: usize) {
        if let Some(bt) = self.state.trigger_mut(node, index) {
            bt.debounce_timer = None;
        }
        if self.doc.tree().is_attached(node) {
            self.fire_action(node, index);
        }
    }

    // --- reveal / intersect ----------------------------------------

    fn ensure_reveal_scan(&mut self) {
        if !self.reveal_scan_active {
            self.reveal_scan_active = true;
            self.scheduler
                .schedule(self.config.reveal_scan_interval_ms, Task::RevealScan);
        }
    }

    pub(crate) fn run_reveal_scan(&mut self) {
        let hits = self.state.nodes_with_triggers(|t| {
            matches!(t.spec.kind, TriggerKind::Revealed | TriggerKind::Intersect)
        });
        if hits.is_empty() {
            self.reveal_scan_active = false;
            return;
        }
        for (node, index) in hits {
            self.check_reveal(node, index);
        }
        self.scheduler
            .schedule(self.config.reveal_scan_interval_ms, Task::RevealScan);
    }

    pub(crate) fn check_reveal(&mut self, node: NodeId, index: usize) {
        if !self.doc.tree().is_attached(node) {
            return;
        }
        let Some(bt) = self.state.node(node).and_then(|s| s.triggers.get(index)) else {
            return;
        };
        if bt.once_fired {
            return;
        }
        let spec = bt.spec.clone();
        let was_visible = bt.revealed_fired;

        let Some(bounds) = self.geometry.bounds(node) else { return };
        let root = spec
            .root
            .as_deref()
            .and_then(|sel| self.resolve_extended(node, sel))
            .and_then(|n| self.geometry.bounds(n))
            .unwrap_or_else(|| self.geometry.viewport());

        match spec.kind {
            TriggerKind::Revealed => {
                let visible = bounds.intersects(&root);
                if visible && !was_visible {
                    if let Some(bt) = self.state.trigger_mut(node, index) {
                        bt.revealed_fired = true;
                        if bt.spec.once {
                            bt.once_fired = true;
                        }
                    }
                    self.fire_action(node, index);
                }
            }
            TriggerKind::Intersect => {
                let ratio = bounds.intersection_ratio(&root);
                let threshold = spec.threshold.unwrap_or(0.0);
                let inside = if threshold == 0.0 { ratio > 0.0 } else { ratio >= threshold };
                if inside && !was_visible {
                    if let Some(bt) = self.state.trigger_mut(node, index) {
                        bt.revealed_fired = true;
                        if bt.spec.once {
                            bt.once_fired = true;
                        }
                    }
                    self.fire_action(node, index);
                } else if !inside && was_visible {
                    if let Some(bt) = self.state.trigger_mut(node, index) {
                        bt.revealed_fired = false;
                    }
                }
            }
            _ => {}
        }
    }
}
