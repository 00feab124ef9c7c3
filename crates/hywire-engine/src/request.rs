//! Request orchestration
//!
//! Turns a fired trigger into a transport request: target resolution,
//! confirm/prompt preconditions, native validation, sync disciplines,
//! parameter assembly, correlation headers, then hands the completion
//! to the swap pipeline. Overlapping dispatches on one sync node are
//! arbitrated here.

use std::collections::VecDeque;

use hywire_dom::{collect_values, validate_node, FormValues, NodeId};
use hywire_net::{NetError, RequestId, TransportRequest, TransportResponse, Verb};
use hywire_expr::{compile_condition, parse_sync, QueueMode, SyncStrategy, Tokenizer};
use tracing::debug;

use crate::attrs;
use crate::engine::{Engine, Task};
use crate::event::DomEvent;
use crate::signals::names;
use crate::swap::SwapJob;

const MULTIPART_BOUNDARY: &str = "hywire-boundary";

/// How the address bar should change after a successful swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PushPlan {
    None,
    Push(String),
    Replace(String),
}

/// Why a request is being issued
#[derive(Debug, Clone, Default)]
pub struct RequestCause {
    pub(crate) poll_origin: Option<(NodeId, usize)>,
    pub(crate) history_restore: bool,
    pub(crate) boosted: bool,
}

/// A dispatch deferred by a queue discipline
#[derive(Debug, Clone)]
pub(crate) struct QueuedRequest {
    pub node: NodeId,
    pub verb: Verb,
    pub path: String,
    pub cause: RequestCause,
}

/// Bookkeeping for an in-flight request
#[derive(Debug, Clone)]
pub(crate) struct ActiveRequest {
    pub source: NodeId,
    pub target: NodeId,
    pub sync_node: NodeId,
    pub path: String,
    pub push: PushPlan,
    pub history_restore: bool,
    pub poll_origin: Option<(NodeId, usize)>,
    pub abortable: bool,
    pub timeout_timer: Option<crate::scheduler::TimerId>,
    pub indicators: Vec<NodeId>,
    pub disabled: Vec<NodeId>,
}

impl<T: hywire_net::Transport> Engine<T> {
    /// Issue a request on behalf of `node`. Every precondition gate may
    /// stop it; each stop is signalled.
    pub(crate) fn issue_request(&mut self, node: NodeId, verb: Verb, path: &str, cause: RequestCause) {
        // Target resolution fails hard: no request without a target
        let target = match attrs::inherited_attr(&self.doc, node, attrs::TARGET) {
            Some((owner, sel)) => {
                let resolved = if sel == "this" {
                    Some(owner)
                } else {
                    self.resolve_extended(node, &sel)
                };
                match resolved {
                    Some(t) => t,
                    None => {
                        self.emit(names::TARGET_ERROR, node, sel);
                        return;
                    }
                }
            }
            None if cause.boosted || cause.history_restore => self.doc.body(),
            None => node,
        };

        if let Some(message) = attrs::inherited_value(&self.doc, node, attrs::CONFIRM) {
            if !self.prompter.confirm(&message) {
                self.emit(names::PROMPT_CANCELLED, node, message);
                return;
            }
        }
        let prompt_answer = match attrs::inherited_value(&self.doc, node, attrs::PROMPT) {
            Some(message) => match self.prompter.prompt(&message) {
                Some(answer) => Some(answer),
                None => {
                    self.emit(names::PROMPT_CANCELLED, node, message);
                    return;
                }
            },
            None => None,
        };

        if self.should_validate(node) {
            self.emit(names::VALIDATION_VALIDATE, node, "");
            let errors = validate_node(&self.doc, node);
            if !errors.is_empty() {
                for err in &errors {
                    self.emit(names::VALIDATION_FAILED, err.node, err.message.clone());
                }
                self.emit(names::VALIDATION_HALTED, node, format!("{} invalid", errors.len()));
                return;
            }
        }

        // Sync arbitration
        let (sync_node, strategy, declared) =
            match attrs::inherited_attr(&self.doc, node, attrs::SYNC) {
                Some((owner, source)) => {
                    let (decl, warnings) = parse_sync(&source);
                    for w in warnings {
                        self.emit(names::SYNTAX_ERROR, node, format!("{}: {}", w.source, w.message));
                    }
                    let sync_node = if decl.reference == "this" {
                        owner
                    } else {
                        self.resolve_extended(node, &decl.reference).unwrap_or(node)
                    };
                    (sync_node, decl.strategy, true)
                }
                None => (node, SyncStrategy::Drop, false),
            };

        let in_flight: Vec<RequestId> = self
            .state
            .node(sync_node)
            .map(|s| s.in_flight.clone())
            .unwrap_or_default();
        if !in_flight.is_empty() {
            let abortable: Vec<RequestId> = in_flight
                .iter()
                .copied()
                .filter(|id| self.active.get(id).is_some_and(|a| a.abortable))
                .collect();
            if !abortable.is_empty() {
                // An in-flight abort-strategy request yields to any newcomer
                for id in abortable {
                    self.transport.abort(id);
                }
            } else if !declared {
                // Implicit last-queue: an undeclared overlap coalesces to
                // the newest dispatch
                let queue = self.sync_queues.entry(sync_node).or_default();
                queue.clear();
                queue.push_back(QueuedRequest {
                    node,
                    verb,
                    path: path.to_string(),
                    cause,
                });
                return;
            } else {
                match strategy {
                    SyncStrategy::Drop | SyncStrategy::Abort => {
                        debug!("sync {:?}: dropping dispatch from {:?}", strategy, node);
                        return;
                    }
                    SyncStrategy::Replace => {
                        for id in in_flight {
                            self.transport.abort(id);
                        }
                    }
                    SyncStrategy::Queue(mode) => {
                        let queue = self.sync_queues.entry(sync_node).or_default();
                        let entry = QueuedRequest {
                            node,
                            verb,
                            path: path.to_string(),
                            cause,
                        };
                        match mode {
                            QueueMode::First => {
                                if queue.is_empty() {
                                    queue.push_back(entry);
                                }
                            }
                            QueueMode::Last => {
                                queue.clear();
                                queue.push_back(entry);
                            }
                            QueueMode::All => queue.push_back(entry),
                            QueueMode::None => {}
                        }
                        return;
                    }
                }
            }
        }

        // Parameters
        let mut values = collect_values(&self.doc, node);
        if let Some(list) = attrs::inherited_value(&self.doc, node, attrs::INCLUDE) {
            for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let extra: Vec<NodeId> = if part.starts_with("closest ")
                    || part.starts_with("find ")
                    || part.starts_with("next ")
                    || part.starts_with("previous ")
                    || part == "this"
                {
                    self.resolve_extended(node, part).into_iter().collect()
                } else {
                    self.doc.query_selector_all(part)
                };
                for n in extra {
                    let collected = collect_values(&self.doc, n);
                    for (k, v) in collected.iter() {
                        for value in v.values() {
                            values.append(k, value);
                        }
                    }
                }
            }
        }
        self.apply_declared_vars(node, &mut values);
        self.apply_declared_values(node, attrs::VALS, &mut values);
        if let Some(filter) = attrs::inherited_value(&self.doc, node, attrs::PARAMS) {
            apply_params_filter(&mut values, &filter);
        }

        // Correlation headers
        let mut headers: Vec<(String, String)> = vec![
            ("HW-Request".to_string(), "true".to_string()),
            ("HW-Current-URL".to_string(), self.location.current_url()),
        ];
        if let Some(id) = self.doc.id_of(node) {
            headers.push(("HW-Trigger".to_string(), id.to_string()));
        }
        if let Some(name) = self.doc.attr(node, "name") {
            headers.push(("HW-Trigger-Name".to_string(), name.to_string()));
        }
        if let Some(id) = self.doc.id_of(target) {
            headers.push(("HW-Target".to_string(), id.to_string()));
        }
        if cause.boosted {
            headers.push(("HW-Boosted".to_string(), "true".to_string()));
        }
        if let Some(answer) = &prompt_answer {
            headers.push(("HW-Prompt".to_string(), answer.clone()));
        }
        if cause.history_restore {
            headers.push(("HW-History-Restore-Request".to_string(), "true".to_string()));
        }
        self.apply_declared_headers(node, &mut headers);

        if !self.emit(
            names::CONFIG_REQUEST,
            node,
            format!("{} {} ({} params)", verb.as_str(), path, values.len()),
        ) {
            return;
        }
        if !self.emit(names::BEFORE_REQUEST, node, format!("{} {}", verb.as_str(), path)) {
            return;
        }

        // Encoding
        let exts = self.extensions.active_for(&self.doc, node);
        let (url, body) = if verb.has_body() {
            let encoded = if let Some((content_type, body)) =
                self.extensions.encode_parameters(&exts, &values, verb)
            {
                (content_type, body)
            } else if attrs::inherited_value(&self.doc, node, attrs::ENCODING).as_deref()
                == Some("multipart/form-data")
            {
                encode_multipart(&values)
            } else {
                (
                    "application/x-www-form-urlencoded".to_string(),
                    encode_urlencoded(&values),
                )
            };
            headers.push(("Content-Type".to_string(), encoded.0));
            (path.to_string(), Some(encoded.1))
        } else {
            (append_query(path, &encode_urlencoded(&values)), None)
        };

        // Address-bar plan, resolved before send so headers can override
        // it at response time
        let push = if let Some(v) = attrs::inherited_value(&self.doc, node, attrs::PUSH_URL) {
            match v.as_str() {
                "false" => PushPlan::None,
                "true" => PushPlan::Push(url.clone()),
                other => PushPlan::Push(other.to_string()),
            }
        } else if let Some(v) = attrs::inherited_value(&self.doc, node, attrs::REPLACE_URL) {
            match v.as_str() {
                "false" => PushPlan::None,
                "true" => PushPlan::Replace(url.clone()),
                other => PushPlan::Replace(other.to_string()),
            }
        } else if cause.boosted {
            PushPlan::Push(url.clone())
        } else {
            PushPlan::None
        };

        if !self.emit(names::BEFORE_SEND, node, url.clone()) {
            return;
        }

        // Busy markers
        let indicators = self.indicator_targets(node);
        for id in &indicators {
            if self.state.indicator_acquire(*id) {
                self.add_class(*id, &self.config.indicator_class.clone());
            }
        }
        let disabled = self.disabled_targets(node);
        for id in &disabled {
            if self.state.disabled_acquire(*id) {
                self.set_node_attr(*id, "disabled", "");
            }
        }
        self.add_class(node, &self.config.request_class.clone());

        let request = TransportRequest {
            verb,
            url: url.clone(),
            headers,
            body,
            credentials: self.config.with_credentials,
            timeout_ms: (self.config.timeout_ms > 0).then_some(self.config.timeout_ms),
        };
        let id = self.transport.send(request);
        self.state.node_mut(sync_node).in_flight.push(id);
        let timeout_timer = (self.config.timeout_ms > 0)
            .then(|| self.scheduler.schedule(self.config.timeout_ms, Task::Timeout { request: id }));

        self.active.insert(
            id,
            ActiveRequest {
                source: node,
                target,
                sync_node,
                path: url,
                push,
                history_restore: cause.history_restore,
                poll_origin: cause.poll_origin,
                abortable: declared && strategy == SyncStrategy::Abort,
                timeout_timer,
                indicators,
                disabled,
            },
        );
    }

    /// Boosted navigation: anchors fetch their href, forms submit their
    /// action, the response lands in the body by default.
    pub(crate) fn issue_boost(&mut self, node: NodeId) {
        let (verb, path) = match self.doc.tag(node) {
            Some("form") => {
                let verb = self
                    .doc
                    .attr(node, "method")
                    .and_then(Verb::parse)
                    .unwrap_or(Verb::Get);
                let action = self
                    .doc
                    .attr(node, "action")
                    .map(str::to_string)
                    .unwrap_or_else(|| self.location.current_url());
                (verb, action)
            }
            _ => {
                let Some(href) = self.doc.attr(node, "href").map(str::to_string) else {
                    return;
                };
                (Verb::Get, href)
            }
        };
        self.issue_request(node, verb, &path, RequestCause { boosted: true, ..RequestCause::default() });
    }

    fn should_validate(&self, node: NodeId) -> bool {
        if self.doc.tag(node) == Some("form") {
            return true;
        }
        attrs::inherited_value(&self.doc, node, attrs::VALIDATE).as_deref() == Some("true")
    }

    /// Merge `hw-vals`/`hw-vars` declarations into the parameter set
    fn apply_declared_values(&mut self, node: NodeId, attr: &str, values: &mut FormValues) {
        let Some((_, raw)) = attrs::inherited_attr(&self.doc, node, attr) else {
            return;
        };
        let Some(object) = self.parse_declared_object(node, &raw) else {
            return;
        };
        for (key, value) in object {
            values.set(&key, hywire_dom::FormValue::Single(json_to_param(&value)));
        }
    }

    /// `hw-vars`: comma-separated `name:expr` pairs evaluated with the
    /// conditional interpreter. Gated by the eval flag.
    fn apply_declared_vars(&mut self, node: NodeId, values: &mut FormValues) {
        let Some((_, raw)) = attrs::inherited_attr(&self.doc, node, attrs::VARS) else {
            return;
        };
        if !self.config.eval_allowed {
            self.emit(names::EVAL_DISALLOWED, node, raw);
            return;
        }
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((name, expr)) = part.split_once(':') else {
                self.emit(names::SYNTAX_ERROR, node, format!("expected name:expr, got '{part}'"));
                continue;
            };
            let compiled = Tokenizer::tokenize(expr.trim())
                .map_err(|e| e.to_string())
                .and_then(|tokens| compile_condition(&tokens).map_err(|e| e.to_string()));
            let ast = match compiled {
                Ok(ast) => ast,
                Err(e) => {
                    self.emit(names::SYNTAX_ERROR, node, format!("{part}: {e}"));
                    continue;
                }
            };
            match ast.eval(&VarsScope) {
                Ok(v) => {
                    values.set(name.trim(), hywire_dom::FormValue::Single(value_to_param(&v)));
                }
                Err(e) => {
                    self.emit(names::SYNTAX_ERROR, node, format!("{part}: {e}"));
                }
            }
        }
    }

    fn apply_declared_headers(&mut self, node: NodeId, headers: &mut Vec<(String, String)>) {
        let Some((_, raw)) = attrs::inherited_attr(&self.doc, node, attrs::HEADERS) else {
            return;
        };
        let Some(object) = self.parse_declared_object(node, &raw) else {
            return;
        };
        for (key, value) in object {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
            headers.push((key, json_to_param(&value)));
        }
    }

    /// Shared parsing for JSON-object attributes; the dynamic prefix is
    /// gated by configuration.
    fn parse_declared_object(
        &mut self,
        node: NodeId,
        raw: &str,
    ) -> Option<serde_json::Map<String, serde_json::Value>> {
        let body = if let Some(rest) = raw.strip_prefix("js:").or_else(|| raw.strip_prefix("javascript:")) {
            if !self.config.eval_allowed {
                self.emit(names::EVAL_DISALLOWED, node, raw.to_string());
                return None;
            }
            rest
        } else {
            raw
        };
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            Ok(_) => {
                self.emit(names::SYNTAX_ERROR, node, format!("expected an object: {raw}"));
                None
            }
            Err(e) => {
                self.emit(names::SYNTAX_ERROR, node, format!("{raw}: {e}"));
                None
            }
        }
    }

    fn indicator_targets(&self, node: NodeId) -> Vec<NodeId> {
        match attrs::inherited_value(&self.doc, node, attrs::INDICATOR) {
            Some(list) => self.resolve_selector_list(node, &list),
            None => vec![node],
        }
    }

    fn disabled_targets(&self, node: NodeId) -> Vec<NodeId> {
        match attrs::inherited_value(&self.doc, node, attrs::DISABLED_ELT) {
            Some(list) => self.resolve_selector_list(node, &list),
            None => Vec::new(),
        }
    }

    fn resolve_selector_list(&self, node: NodeId, list: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part == "this"
                || part.starts_with("closest ")
                || part.starts_with("find ")
                || part.starts_with("next ")
                || part.starts_with("previous ")
            {
                out.extend(self.resolve_extended(node, part));
            } else {
                out.extend(self.doc.query_selector_all(part));
            }
        }
        out
    }

    // --- completion ------------------------------------------------

    pub(crate) fn handle_completed(&mut self, id: RequestId, response: TransportResponse) {
        let Some(req) = self.active.remove(&id) else { return };
        self.finish_request(&req, id);
        self.emit(names::AFTER_REQUEST, req.source, response.status.to_string());

        if req.history_restore {
            self.finish_history_restore(&req, &response);
            self.flush_sync_queue(req.sync_node);
            return;
        }

        // Out-of-band header directives
        if let Some(url) = response.header("HW-Redirect").map(str::to_string) {
            self.emit(names::RESPONSE_REDIRECT, req.source, url.clone());
            self.location.assign(&url);
            self.flush_sync_queue(req.sync_node);
            return;
        }
        if response.header("HW-Refresh") == Some("true") {
            self.location.reload();
            self.flush_sync_queue(req.sync_node);
            return;
        }
        if let Some(value) = response.header("HW-Location").map(str::to_string) {
            self.emit(names::RESPONSE_REDIRECT, req.source, value.clone());
            self.handle_location_header(&value);
            self.flush_sync_queue(req.sync_node);
            return;
        }
        if let Some(value) = response.header("HW-Trigger").map(str::to_string) {
            self.dispatch_trigger_header(req.source, &value);
        }

        let mut target = req.target;
        if let Some(sel) = response.header("HW-Retarget").map(str::to_string) {
            match self.doc.query_selector(&sel) {
                Some(t) => target = t,
                None => {
                    self.emit(names::TARGET_ERROR, req.source, sel);
                }
            }
        }
        let mut push = req.push.clone();
        if let Some(v) = response.header("HW-Push-Url").map(str::to_string) {
            push = if v == "false" { PushPlan::None } else { PushPlan::Push(v) };
        }
        if let Some(v) = response.header("HW-Replace-Url").map(str::to_string) {
            push = if v == "false" { PushPlan::None } else { PushPlan::Replace(v) };
        }

        let status = response.status;
        if status == 286 {
            if let Some((node, index)) = req.poll_origin {
                if let Some(bt) = self.state.trigger_mut(node, index) {
                    bt.poll_stopped = true;
                    if let Some(timer) = bt.poll_timer.take() {
                        self.scheduler.cancel(timer);
                    }
                }
                self.emit(names::POLL_CANCELLED, node, "stopped by response");
            }
        }

        let error = status >= 400;
        if error {
            self.emit(names::RESPONSE_ERROR, req.source, status.to_string());
        }
        let swappable = matches!(status, 200..=203 | 205..=399) || (error && self.config.swap_on_error);
        if swappable {
            let job = SwapJob {
                source: req.source,
                target,
                body: response.body.clone(),
                status,
                path: req.path.clone(),
                reswap: response.header("HW-Reswap").map(str::to_string),
                push,
                trigger_after_swap: response.header("HW-Trigger-After-Swap").map(str::to_string),
                trigger_after_settle: response
                    .header("HW-Trigger-After-Settle")
                    .map(str::to_string),
            };
            self.schedule_swap(job);
        }

        self.flush_sync_queue(req.sync_node);
    }

    fn finish_history_restore(&mut self, req: &ActiveRequest, response: &TransportResponse) {
        if (200..300).contains(&response.status) {
            let root = self.history_root();
            self.swap_inner(root, &response.body);
            self.emit(names::HISTORY_CACHE_MISS_LOAD, root, req.path.clone());
        } else {
            self.emit(names::HISTORY_CACHE_MISS_ERROR, req.source, response.status.to_string());
            self.location.reload();
        }
    }

    /// `HW-Location`: client-side navigation without a full reload.
    /// Accepts a bare path or a JSON object with `path` and `target`.
    fn handle_location_header(&mut self, value: &str) {
        let (path, target_sel) = match serde_json::from_str::<serde_json::Value>(value) {
            Ok(serde_json::Value::Object(map)) => {
                let path = map
                    .get("path")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let target = map
                    .get("target")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                (path, target)
            }
            _ => (value.to_string(), None),
        };
        if path.is_empty() {
            return;
        }
        let source = target_sel
            .as_deref()
            .and_then(|s| self.doc.query_selector(s))
            .unwrap_or_else(|| self.doc.body());
        self.issue_request(
            source,
            Verb::Get,
            &path,
            RequestCause { boosted: true, ..RequestCause::default() },
        );
    }

    /// `HW-Trigger`: dispatch server-named events on the requester.
    /// Accepts a comma list of names or a JSON object of name -> detail.
    pub(crate) fn dispatch_trigger_header(&mut self, source: NodeId, value: &str) {
        match serde_json::from_str::<serde_json::Value>(value) {
            Ok(serde_json::Value::Object(map)) => {
                for (name, detail) in map {
                    let mut event = DomEvent::new(name, source);
                    match detail {
                        serde_json::Value::Object(fields) => {
                            for (k, v) in fields {
                                event.fields.insert(k, json_to_value(&v));
                            }
                        }
                        other => {
                            event.fields.insert("value".to_string(), json_to_value(&other));
                        }
                    }
                    self.dispatch(event);
                }
            }
            _ => {
                for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    let event = DomEvent::new(name, source);
                    self.dispatch(event);
                }
            }
        }
    }

    pub(crate) fn handle_failed(&mut self, id: RequestId, error: NetError) {
        let Some(req) = self.active.remove(&id) else { return };
        self.finish_request(&req, id);
        match error {
            NetError::Aborted => {
                self.emit(names::SEND_ABORT, req.source, "");
            }
            NetError::Timeout => {
                self.emit(names::TIMEOUT, req.source, req.path.clone());
            }
            other => {
                self.emit(names::SEND_ERROR, req.source, other.to_string());
            }
        }
        if req.history_restore {
            self.emit(names::HISTORY_CACHE_MISS_ERROR, req.source, req.path.clone());
            self.location.reload();
        }
        self.flush_sync_queue(req.sync_node);
    }

    pub(crate) fn run_timeout(&mut self, id: RequestId) {
        let Some(req) = self.active.remove(&id) else { return };
        self.transport.abort(id);
        self.finish_request(&req, id);
        self.emit(names::TIMEOUT, req.source, req.path.clone());
        self.flush_sync_queue(req.sync_node);
    }

    /// Cleanup shared by every request outcome
    fn finish_request(&mut self, req: &ActiveRequest, id: RequestId) {
        if let Some(timer) = req.timeout_timer {
            self.scheduler.cancel(timer);
        }
        self.state.node_mut(req.sync_node).in_flight.retain(|r| *r != id);
        for node in &req.indicators {
            if self.state.indicator_release(*node) {
                self.remove_class(*node, &self.config.indicator_class.clone());
            }
        }
        for node in &req.disabled {
            if self.state.disabled_release(*node) {
                self.remove_node_attr(*node, "disabled");
            }
        }
        let still_busy = self.active.values().any(|a| a.source == req.source);
        if !still_busy {
            self.remove_class(req.source, &self.config.request_class.clone());
        }
    }

    /// Give a queued dispatch its turn once the sync node goes idle
    pub(crate) fn flush_sync_queue(&mut self, sync_node: NodeId) {
        let idle = self
            .state
            .node(sync_node)
            .is_none_or(|s| s.in_flight.is_empty());
        if !idle {
            return;
        }
        let next = self
            .sync_queues
            .get_mut(&sync_node)
            .and_then(VecDeque::pop_front);
        if let Some(queued) = next {
            self.issue_request(queued.node, queued.verb, &queued.path, queued.cause);
        }
    }

    // --- small DOM helpers -----------------------------------------

    pub(crate) fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(elem) = self.doc.tree_mut().get_mut(node).and_then(|n| n.as_element_mut()) {
            elem.add_class(class);
        }
    }

    pub(crate) fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(elem) = self.doc.tree_mut().get_mut(node).and_then(|n| n.as_element_mut()) {
            elem.remove_class(class);
        }
    }

    pub(crate) fn set_node_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(elem) = self.doc.tree_mut().get_mut(node).and_then(|n| n.as_element_mut()) {
            elem.set_attr(name, value);
        }
    }

    pub(crate) fn remove_node_attr(&mut self, node: NodeId, name: &str) {
        if let Some(elem) = self.doc.tree_mut().get_mut(node).and_then(|n| n.as_element_mut()) {
            elem.remove_attr(name);
        }
    }

    /// Declarative socket send: the node's parameters wrapped in the
    /// correlation envelope, written to the governing socket.
    pub(crate) fn send_socket_message(&mut self, node: NodeId) {
        let Some(socket) = self.socket_for(node) else {
            self.emit(names::STREAM_ERROR, node, "no socket connection governs this node");
            return;
        };
        let values = collect_values(&self.doc, node);
        let mut envelope = hywire_net::SocketEnvelope::new();
        for (k, v) in values.iter() {
            let vals = v.values();
            let json = if vals.len() == 1 {
                serde_json::Value::String(vals[0].to_string())
            } else {
                serde_json::Value::Array(
                    vals.into_iter()
                        .map(|s| serde_json::Value::String(s.to_string()))
                        .collect(),
                )
            };
            envelope.values.insert(k.to_string(), json);
        }
        envelope
            .headers
            .insert("HW-Request".to_string(), serde_json::Value::String("true".to_string()));
        if let Some(id) = self.doc.id_of(node) {
            envelope
                .headers
                .insert("HW-Trigger".to_string(), serde_json::Value::String(id.to_string()));
        }
        envelope.headers.insert(
            "HW-Current-URL".to_string(),
            serde_json::Value::String(self.location.current_url()),
        );
        if !self.emit(names::BEFORE_SEND, node, "socket") {
            return;
        }
        self.transport.send_socket(socket, &envelope.to_json());
    }
}

/// `hw-vars` expressions have no event context; unresolved names are null
struct VarsScope;

impl hywire_expr::Scope for VarsScope {
    fn resolve(&self, _path: &[String]) -> Option<hywire_expr::Value> {
        None
    }
}

fn value_to_param(value: &hywire_expr::Value) -> String {
    match value {
        hywire_expr::Value::Str(s) => s.clone(),
        hywire_expr::Value::Num(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        hywire_expr::Value::Num(n) => n.to_string(),
        hywire_expr::Value::Bool(b) => b.to_string(),
        hywire_expr::Value::Null => String::new(),
    }
}

fn encode_urlencoded(values: &FormValues) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in values.iter() {
        for v in value.values() {
            serializer.append_pair(name, v);
        }
    }
    serializer.finish()
}

fn encode_multipart(values: &FormValues) -> (String, String) {
    let mut body = String::new();
    for (name, value) in values.iter() {
        for v in value.values() {
            body.push_str(&format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{v}\r\n"
            ));
        }
    }
    body.push_str(&format!("--{MULTIPART_BOUNDARY}--\r\n"));
    (
        format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        body,
    )
}

/// Append an encoded query, keeping any fragment anchor at the end
fn append_query(path: &str, query: &str) -> String {
    let (base, anchor) = match path.split_once('#') {
        Some((b, a)) => (b, Some(a)),
        None => (path, None),
    };
    let joined = if query.is_empty() {
        base.to_string()
    } else if base.contains('?') {
        format!("{base}&{query}")
    } else {
        format!("{base}?{query}")
    };
    match anchor {
        Some(a) => format!("{joined}#{a}"),
        None => joined,
    }
}

/// `hw-params`: `*`, `none`, `not a,b` or an allow list
fn apply_params_filter(values: &mut FormValues, filter: &str) {
    let filter = filter.trim();
    match filter {
        "*" => {}
        "none" => values.retain(|_| false),
        _ => {
            if let Some(rest) = filter.strip_prefix("not ") {
                let excluded: Vec<&str> = rest.split(',').map(str::trim).collect();
                values.retain(|name| !excluded.contains(&name));
            } else {
                let allowed: Vec<&str> = filter.split(',').map(str::trim).collect();
                values.retain(|name| allowed.contains(&name));
            }
        }
    }
}

fn json_to_param(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_to_value(value: &serde_json::Value) -> hywire_expr::Value {
    match value {
        serde_json::Value::Null => hywire_expr::Value::Null,
        serde_json::Value::Bool(b) => hywire_expr::Value::Bool(*b),
        serde_json::Value::Number(n) => hywire_expr::Value::Num(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => hywire_expr::Value::Str(s.clone()),
        other => hywire_expr::Value::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_filter() {
        let mut values = FormValues::new();
        values.append("a", "1");
        values.append("b", "2");
        values.append("c", "3");

        let mut allow = values.clone();
        apply_params_filter(&mut allow, "a,c");
        assert!(allow.get("a").is_some() && allow.get("b").is_none() && allow.get("c").is_some());

        let mut deny = values.clone();
        apply_params_filter(&mut deny, "not b");
        assert!(deny.get("b").is_none() && deny.len() == 2);

        let mut none = values.clone();
        apply_params_filter(&mut none, "none");
        assert!(none.is_empty());
    }

    #[test]
    fn test_urlencoding() {
        let mut values = FormValues::new();
        values.append("q", "a b&c");
        values.append("tag", "x");
        values.append("tag", "y");
        assert_eq!(encode_urlencoded(&values), "q=a+b%26c&tag=x&tag=y");
    }

    #[test]
    fn test_append_query() {
        assert_eq!(append_query("/items", "a=1"), "/items?a=1");
        assert_eq!(append_query("/items?x=2", "a=1"), "/items?x=2&a=1");
        assert_eq!(append_query("/items", ""), "/items");
        assert_eq!(append_query("/items#top", "a=1"), "/items?a=1#top");
    }

    #[test]
    fn test_value_to_param() {
        assert_eq!(value_to_param(&hywire_expr::Value::Str("x".to_string())), "x");
        assert_eq!(value_to_param(&hywire_expr::Value::Num(2.0)), "2");
        assert_eq!(value_to_param(&hywire_expr::Value::Num(2.5)), "2.5");
        assert_eq!(value_to_param(&hywire_expr::Value::Bool(true)), "true");
        assert_eq!(value_to_param(&hywire_expr::Value::Null), "");
    }

    #[test]
    fn test_multipart_shape() {
        let mut values = FormValues::new();
        values.append("name", "alice");
        let (content_type, body) = encode_multipart(&values);
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert!(body.contains("name=\"name\""));
        assert!(body.contains("alice"));
        assert!(body.ends_with(&format!("--{MULTIPART_BOUNDARY}--\r\n")));
    }
}
