//! Swap pipeline
//!
//! Applies response content to the document: fragment parsing,
//! out-of-band extraction, content selection, preservation, the DOM
//! patch itself, then the settle phase that reconciles attributes and
//! removes transition classes.

use hywire_dom::{inner_html, Document, FragmentParser, NodeId};
use hywire_expr::{parse_swap, SwapSpec, SwapStyle};
use tracing::debug;

use crate::attrs;
use crate::engine::{Engine, Task};
use crate::extensions::ResponseContext;
use crate::history::HistoryEntry;
use crate::request::PushPlan;
use crate::signals::names;

/// A swap waiting on its `swap:` delay
#[derive(Debug, Clone)]
pub(crate) struct SwapJob {
    pub source: NodeId,
    pub target: NodeId,
    pub body: String,
    pub status: u16,
    pub path: String,
    pub reswap: Option<String>,
    pub push: PushPlan,
    pub trigger_after_swap: Option<String>,
    pub trigger_after_settle: Option<String>,
}

/// Settle work deferred by the `settle:` delay
#[derive(Debug, Clone)]
pub(crate) struct SettleJob {
    pub source: NodeId,
    pub target: NodeId,
    pub inserted: Vec<NodeId>,
    /// Attribute values to restore on same-id nodes once settled
    pub restore: Vec<(NodeId, String, Option<String>)>,
    /// Human-readable scroll/show directive, surfaced in the signal
    pub scroll_detail: String,
    /// Id of the control holding focus when the patch began
    pub refocus: Option<String>,
    /// Server-named events dispatched once settled
    pub trigger_after_settle: Option<String>,
}

impl<T: hywire_net::Transport> Engine<T> {
    /// Resolve the swap spec and either apply now or park the job
    /// behind its swap delay.
    pub(crate) fn schedule_swap(&mut self, job: SwapJob) {
        let spec = self.resolve_swap_spec(job.source, job.reswap.as_deref(), true);
        if spec.swap_delay_ms > 0 {
            let key = self.next_job();
            let delay = spec.swap_delay_ms;
            self.swap_jobs.insert(key, job);
            self.scheduler.schedule(delay, Task::ApplySwap { job: key });
            return;
        }
        self.perform_swap(job, spec);
    }

    pub(crate) fn run_swap_job(&mut self, key: u64) {
        let Some(job) = self.swap_jobs.remove(&key) else { return };
        let spec = self.resolve_swap_spec(job.source, job.reswap.as_deref(), false);
        self.perform_swap(job, spec);
    }

    /// The response header wins over the attribute, which wins over the
    /// configured default.
    fn resolve_swap_spec(&mut self, source: NodeId, reswap: Option<&str>, warn: bool) -> SwapSpec {
        let declared = reswap
            .map(str::to_string)
            .or_else(|| attrs::inherited_value(&self.doc, source, attrs::SWAP));
        match declared {
            Some(text) => {
                let (spec, warnings) = parse_swap(
                    &text,
                    self.config.default_swap_style.clone(),
                    self.config.default_swap_delay_ms,
                    self.config.default_settle_delay_ms,
                );
                if warn {
                    for w in warnings {
                        self.emit(names::SYNTAX_ERROR, source, format!("{}: {}", w.source, w.message));
                    }
                }
                spec
            }
            None => {
                let mut spec = SwapSpec::with_style(
                    self.config.default_swap_style.clone(),
                    self.config.default_settle_delay_ms,
                );
                spec.swap_delay_ms = self.config.default_swap_delay_ms;
                spec
            }
        }
    }

    fn perform_swap(&mut self, job: SwapJob, spec: SwapSpec) {
        if !self.doc.tree().is_attached(job.target) && spec.style != SwapStyle::None {
            self.emit(names::SWAP_ERROR, job.target, "target is no longer in the document");
            return;
        }
        if !self.emit(names::BEFORE_SWAP, job.target, job.path.clone()) {
            return;
        }

        let exts = self.extensions.active_for(&self.doc, job.source);
        let ctx = ResponseContext {
            status: job.status,
            request_url: job.path.clone(),
            source: job.source,
        };
        let body = self.extensions.transform_response(&exts, job.body, &ctx);

        // The old page is snapshotted before any mutation so back
        // navigation restores what the user actually saw
        if job.push != PushPlan::None {
            self.save_history_snapshot();
        }

        let (mut frag, title) = fragment_document(&body);
        self.process_oob(&mut frag, job.source);
        self.process_select_oob(&mut frag, job.source);

        // hw-select narrows the fragment to matching nodes
        let insert: Vec<NodeId> = match attrs::inherited_value(&self.doc, job.source, attrs::SELECT)
        {
            Some(sel) => frag.query_selector_all(&sel),
            None => frag.tree().children(frag.body()),
        };

        let preserved = self.collect_preserved(job.target, &spec.style);
        let old_attrs = self.settle_snapshot_old(job.target);
        let refocus = self
            .focused
            .filter(|n| self.doc.tree().is_attached(*n))
            .and_then(|n| self.doc.id_of(n).map(str::to_string));

        self.add_class(job.target, &self.config.swapping_class.clone());
        let inserted = self.apply_patch(job.target, &spec.style, &frag, &insert, &exts);
        self.remove_class(job.target, &self.config.swapping_class.clone());

        self.restore_preserved(&preserved, &inserted);

        if let Some(title) = title {
            self.doc.set_title(&title);
        }

        // Mark and reconcile the new content, then let it settle
        let added = self.config.added_class.clone();
        let settling = self.config.settling_class.clone();
        for node in &inserted {
            let mut subtree = vec![*node];
            subtree.extend(self.doc.tree().descendants(*node));
            for n in subtree {
                if self.doc.tree().get(n).is_some_and(|x| x.is_element()) {
                    self.add_class(n, &added);
                    self.add_class(n, &settling);
                }
            }
        }
        if self.doc.tree().is_attached(job.target) {
            self.add_class(job.target, &settling);
        }
        let restore = self.settle_reconcile(&inserted, &old_attrs);

        for node in &inserted {
            self.process_tree(*node);
        }
        self.flag_scripts(&inserted);

        self.emit(names::AFTER_SWAP, job.target, job.path.clone());
        if let Some(value) = &job.trigger_after_swap {
            self.dispatch_trigger_header(job.source, value);
        }

        match &job.push {
            PushPlan::Push(url) => self.location.push(url),
            PushPlan::Replace(url) => self.location.replace(url),
            PushPlan::None => {}
        }

        let settle = SettleJob {
            source: job.source,
            target: job.target,
            inserted,
            restore,
            scroll_detail: scroll_detail(&spec),
            refocus,
            trigger_after_settle: job.trigger_after_settle.clone(),
        };
        if spec.settle_delay_ms > 0 {
            let key = self.next_job();
            self.settle_jobs.insert(key, settle);
            self.scheduler.schedule(spec.settle_delay_ms, Task::Settle { job: key });
        } else {
            self.settle(settle);
        }
    }

    pub(crate) fn run_settle_job(&mut self, key: u64) {
        if let Some(job) = self.settle_jobs.remove(&key) {
            self.settle(job);
        }
    }

    fn settle(&mut self, job: SettleJob) {
        if !self.emit(names::BEFORE_SETTLE, job.target, "") {
            return;
        }
        for (node, name, value) in &job.restore {
            match value {
                Some(v) => self.set_node_attr(*node, name, v),
                None => self.remove_node_attr(*node, name),
            }
        }
        let added = self.config.added_class.clone();
        let settling = self.config.settling_class.clone();
        for node in &job.inserted {
            let mut subtree = vec![*node];
            subtree.extend(self.doc.tree().descendants(*node));
            for n in subtree {
                self.remove_class(n, &added);
                self.remove_class(n, &settling);
            }
        }
        self.remove_class(job.target, &settling);
        self.restore_focus(&job);
        self.emit(names::AFTER_SETTLE, job.target, job.scroll_detail.clone());
        if let Some(value) = &job.trigger_after_settle {
            self.dispatch_trigger_header(job.source, value);
        }
    }

    /// An `autofocus` control in the new content takes focus; otherwise
    /// focus lost to the patch moves to the same-id replacement, keeping
    /// the recorded selection range.
    fn restore_focus(&mut self, job: &SettleJob) {
        let autofocus = job.inserted.iter().copied().find_map(|root| {
            let mut subtree = vec![root];
            subtree.extend(self.doc.tree().descendants(root));
            subtree.into_iter().find(|n| self.doc.has_attr(*n, "autofocus"))
        });
        if let Some(node) = autofocus {
            self.focused = Some(node);
            self.selection = None;
            return;
        }
        let lost = self.focused.is_none_or(|n| !self.doc.tree().is_attached(n));
        if lost {
            self.focused = job
                .refocus
                .as_deref()
                .and_then(|id| self.doc.get_element_by_id(id));
            if self.focused.is_none() {
                self.selection = None;
            }
        }
    }

    /// Inserted `<script>` nodes are not evaluated here; each one is
    /// surfaced to the host with its source text, gated like every other
    /// evaluation.
    fn flag_scripts(&mut self, inserted: &[NodeId]) {
        let mut scripts = Vec::new();
        for root in inserted {
            let mut subtree = vec![*root];
            subtree.extend(self.doc.tree().descendants(*root));
            scripts.extend(subtree.into_iter().filter(|n| self.doc.tag(*n) == Some("script")));
        }
        for node in scripts {
            if !self.config.eval_allowed {
                self.emit(names::EVAL_DISALLOWED, node, "script");
                continue;
            }
            let text = self.doc.tree().text_content(node);
            self.emit(names::SCRIPT_PROCESS, node, text);
        }
    }

    // --- patching ---------------------------------------------------

    /// Apply `insert` (nodes living in `frag`) to the document relative
    /// to `target`. Returns the adopted top-level node ids.
    fn apply_patch(
        &mut self,
        target: NodeId,
        style: &SwapStyle,
        frag: &Document,
        insert: &[NodeId],
        exts: &[String],
    ) -> Vec<NodeId> {
        match style {
            SwapStyle::None => Vec::new(),
            SwapStyle::Delete => {
                self.doc.tree_mut().detach(target);
                Vec::new()
            }
            SwapStyle::InnerHtml => {
                self.doc.tree_mut().remove_children(target);
                let mut out = Vec::new();
                for n in insert {
                    let copied = self.doc.tree_mut().adopt(frag.tree(), *n);
                    self.doc.tree_mut().append_child(target, copied);
                    out.push(copied);
                }
                out
            }
            SwapStyle::OuterHtml => {
                // The root containers cannot be replaced wholesale
                if target == self.doc.body() || target == self.doc.html() {
                    return self.apply_patch(target, &SwapStyle::InnerHtml, frag, insert, exts);
                }
                let mut out = Vec::new();
                for n in insert {
                    let copied = self.doc.tree_mut().adopt(frag.tree(), *n);
                    self.doc.tree_mut().insert_before(target, copied);
                    out.push(copied);
                }
                self.doc.tree_mut().detach(target);
                out
            }
            SwapStyle::BeforeBegin => {
                let mut out = Vec::new();
                for n in insert {
                    let copied = self.doc.tree_mut().adopt(frag.tree(), *n);
                    self.doc.tree_mut().insert_before(target, copied);
                    out.push(copied);
                }
                out
            }
            SwapStyle::AfterBegin => {
                let mut out = Vec::new();
                for n in insert.iter().rev() {
                    let copied = self.doc.tree_mut().adopt(frag.tree(), *n);
                    self.doc.tree_mut().prepend_child(target, copied);
                    out.push(copied);
                }
                out.reverse();
                out
            }
            SwapStyle::BeforeEnd => {
                let mut out = Vec::new();
                for n in insert {
                    let copied = self.doc.tree_mut().adopt(frag.tree(), *n);
                    self.doc.tree_mut().append_child(target, copied);
                    out.push(copied);
                }
                out
            }
            SwapStyle::AfterEnd => {
                let mut out = Vec::new();
                let mut anchor = target;
                for n in insert {
                    let copied = self.doc.tree_mut().adopt(frag.tree(), *n);
                    self.doc.tree_mut().insert_after(anchor, copied);
                    anchor = copied;
                    out.push(copied);
                }
                out
            }
            SwapStyle::Extension(name) => {
                if let Some(handler) = self.extensions.swap_handler(exts, name) {
                    return handler.handle_swap(name, target, frag.tree(), &mut self.doc);
                }
                self.emit(
                    names::SWAP_ERROR,
                    target,
                    format!("no handler for swap style '{name}', using innerHTML"),
                );
                self.apply_patch(target, &SwapStyle::InnerHtml, frag, insert, exts)
            }
        }
    }

    // --- out of band ------------------------------------------------

    /// Detach `hw-swap-oob` top-level fragment nodes and swap each into
    /// its own target. Content with no resolvable target is discarded.
    fn process_oob(&mut self, frag: &mut Document, source: NodeId) {
        let marked: Vec<NodeId> = frag
            .tree()
            .children(frag.body())
            .into_iter()
            .filter(|n| frag.attr(*n, attrs::SWAP_OOB).is_some())
            .collect();
        for node in marked {
            let decl = frag
                .attr(node, attrs::SWAP_OOB)
                .unwrap_or_default()
                .to_string();
            frag.tree_mut().detach(node);

            let (style_text, selector) = match decl.split_once(':') {
                Some((style, sel)) => (style.to_string(), Some(sel.to_string())),
                None => (decl.clone(), None),
            };
            let style = if style_text == "true" || style_text.is_empty() {
                SwapStyle::OuterHtml
            } else {
                SwapStyle::parse(&style_text)
            };

            let target = match &selector {
                Some(sel) => self.doc.query_selector(sel),
                None => frag.id_of(node).and_then(|id| self.doc.get_element_by_id(id)),
            };
            let Some(target) = target else {
                self.emit(
                    names::OOB_ERROR,
                    source,
                    format!("no target for out-of-band content '{decl}'"),
                );
                continue;
            };
            debug!("oob swap {:?} into {:?}", style, target);
            let inserted = self.apply_patch(target, &style, frag, &[node], &[]);
            for n in inserted {
                self.process_tree(n);
            }
        }
    }

    /// `hw-select-oob`: pick fragment nodes by id and swap each into the
    /// same-id document node.
    fn process_select_oob(&mut self, frag: &mut Document, source: NodeId) {
        let Some(list) = attrs::inherited_value(&self.doc, source, attrs::SELECT_OOB) else {
            return;
        };
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (sel, style) = match part.split_once(':') {
                Some((s, style)) => (s, SwapStyle::parse(style)),
                None => (part, SwapStyle::OuterHtml),
            };
            let Some(node) = frag.query_selector(sel) else {
                self.emit(names::OOB_ERROR, source, format!("'{sel}' not found in response"));
                continue;
            };
            let Some(target) = frag
                .id_of(node)
                .and_then(|id| self.doc.get_element_by_id(id))
            else {
                self.emit(names::OOB_ERROR, source, format!("no document node matches '{sel}'"));
                continue;
            };
            frag.tree_mut().detach(node);
            let inserted = self.apply_patch(target, &style, frag, &[node], &[]);
            for n in inserted {
                self.process_tree(n);
            }
        }
    }

    // --- preservation & settling -----------------------------------

    /// Ids and nodes under the target marked `hw-preserve`
    fn collect_preserved(&self, target: NodeId, style: &SwapStyle) -> Vec<(String, NodeId)> {
        if !matches!(style, SwapStyle::InnerHtml | SwapStyle::OuterHtml) {
            return Vec::new();
        }
        self.doc
            .tree()
            .descendants(target)
            .into_iter()
            .filter(|n| self.doc.has_attr(*n, attrs::PRESERVE))
            .filter_map(|n| self.doc.id_of(n).map(|id| (id.to_string(), n)))
            .collect()
    }

    /// Put preserved originals back in place of their same-id
    /// replacements.
    fn restore_preserved(&mut self, preserved: &[(String, NodeId)], inserted: &[NodeId]) {
        for (id, original) in preserved {
            let replacement = inserted.iter().copied().find_map(|root| {
                let mut subtree = vec![root];
                subtree.extend(self.doc.tree().descendants(root));
                subtree
                    .into_iter()
                    .find(|n| self.doc.id_of(*n) == Some(id.as_str()))
            });
            if let Some(new_node) = replacement {
                self.doc.tree_mut().detach(*original);
                self.doc.tree_mut().insert_before(new_node, *original);
                self.doc.tree_mut().detach(new_node);
            }
        }
    }

    /// Snapshot settle-able attributes of id-carrying nodes about to be
    /// replaced.
    fn settle_snapshot_old(&self, target: NodeId) -> Vec<(String, Vec<(String, Option<String>)>)> {
        let settle_attrs = &self.config.attributes_to_settle;
        self.doc
            .tree()
            .descendants(target)
            .into_iter()
            .filter_map(|n| {
                let id = self.doc.id_of(n)?.to_string();
                let values = settle_attrs
                    .iter()
                    .map(|a| (a.clone(), self.doc.attr(n, a).map(str::to_string)))
                    .collect();
                Some((id, values))
            })
            .collect()
    }

    /// For inserted nodes whose id survived the swap, start from the old
    /// attribute values and record the new ones for restoration at
    /// settle time. This is what makes CSS transitions fire.
    fn settle_reconcile(
        &mut self,
        inserted: &[NodeId],
        old: &[(String, Vec<(String, Option<String>)>)],
    ) -> Vec<(NodeId, String, Option<String>)> {
        let mut restore = Vec::new();
        for root in inserted {
            let mut subtree = vec![*root];
            subtree.extend(self.doc.tree().descendants(*root));
            for node in subtree {
                let Some(id) = self.doc.id_of(node).map(str::to_string) else { continue };
                let Some((_, old_values)) = old.iter().find(|(i, _)| *i == id) else { continue };
                for (name, old_value) in old_values {
                    let new_value = self.doc.attr(node, name).map(str::to_string);
                    if new_value == *old_value {
                        continue;
                    }
                    restore.push((node, name.clone(), new_value));
                    match old_value {
                        Some(v) => self.set_node_attr(node, name, v),
                        None => self.remove_node_attr(node, name),
                    }
                }
            }
        }
        restore
    }

    // --- direct content swaps --------------------------------------

    /// Replace a node's children with parsed markup and process the new
    /// content. Used by stream swaps and history restoration.
    pub(crate) fn swap_inner(&mut self, target: NodeId, html: &str) {
        if !self.doc.tree().is_attached(target) {
            return;
        }
        let frag = FragmentParser::new().parse(html);
        self.doc.tree_mut().remove_children(target);
        let children = frag.children(NodeId::ROOT);
        let mut inserted = Vec::new();
        for child in children {
            let copied = self.doc.tree_mut().adopt(&frag, child);
            self.doc.tree_mut().append_child(target, copied);
            inserted.push(copied);
        }
        for node in inserted {
            self.process_tree(node);
        }
    }

    /// Socket messages carry out-of-band content only: each top-level
    /// element replaces the same-id document node.
    pub(crate) fn swap_message_content(&mut self, text: &str) {
        let mut frag = fragment_document(text).0;
        let top: Vec<NodeId> = frag
            .tree()
            .children(frag.body())
            .into_iter()
            .filter(|n| frag.tree().get(*n).is_some_and(|x| x.is_element()))
            .collect();
        for node in top {
            // An explicit oob declaration wins over the id convention
            if frag.attr(node, attrs::SWAP_OOB).is_some() {
                let html = hywire_dom::outer_html(frag.tree(), node);
                let mut sub = fragment_document(&html).0;
                self.process_oob(&mut sub, NodeId::NONE);
                continue;
            }
            let target = frag.id_of(node).and_then(|id| self.doc.get_element_by_id(id));
            let Some(target) = target else {
                self.emit(
                    names::OOB_ERROR,
                    NodeId::NONE,
                    "socket content has no matching document node",
                );
                continue;
            };
            frag.tree_mut().detach(node);
            let inserted = self.apply_patch(target, &SwapStyle::OuterHtml, &frag, &[node], &[]);
            for n in inserted {
                self.process_tree(n);
            }
        }
    }

    // --- history ----------------------------------------------------

    /// Snapshot the current history-root content into the bounded cache
    pub(crate) fn save_history_snapshot(&mut self) {
        if !self.config.history_enabled {
            return;
        }
        // Any `hw-history="false"` on the page opts snapshotting out,
        // typically for pages with sensitive content
        if self
            .doc
            .query_selector(&format!("[{}=false]", attrs::HISTORY))
            .is_some()
        {
            return;
        }
        let root = self.history_root();
        let url = self.location.current_url();
        if !self.emit(names::BEFORE_HISTORY_SAVE, root, url.clone()) {
            return;
        }
        let entry = HistoryEntry {
            url,
            content: inner_html(self.doc.tree(), root),
            title: self.doc.title().map(str::to_string),
            scroll: 0.0,
        };
        self.history.put(entry);
        let key = self.config.history_storage_key.clone();
        self.history.persist(self.storage.as_mut(), &key);
    }
}

/// Parse markup into a scaffolded document so selectors work on it
fn fragment_document(html: &str) -> (Document, Option<String>) {
    let (frag, title) = FragmentParser::new().parse_with_title(html);
    let mut doc = Document::new();
    let body = doc.body();
    for child in frag.children(NodeId::ROOT) {
        let copied = doc.tree_mut().adopt(&frag, child);
        doc.tree_mut().append_child(body, copied);
    }
    (doc, title)
}

fn scroll_detail(spec: &SwapSpec) -> String {
    fn direction(d: hywire_expr::ScrollDirective) -> &'static str {
        match d {
            hywire_expr::ScrollDirective::Top => "top",
            hywire_expr::ScrollDirective::Bottom => "bottom",
        }
    }
    let mut parts = Vec::new();
    if let Some(dir) = spec.scroll {
        match &spec.scroll_target {
            Some(target) => parts.push(format!("scroll:{}:{}", target, direction(dir))),
            None => parts.push(format!("scroll:{}", direction(dir))),
        }
    }
    if let Some(dir) = spec.show {
        match &spec.show_target {
            Some(target) => parts.push(format!("show:{}:{}", target, direction(dir))),
            None => parts.push(format!("show:{}", direction(dir))),
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_document() {
        let (doc, title) = fragment_document("<title>T</title><div id=\"a\">x</div>");
        assert_eq!(title.as_deref(), Some("T"));
        assert!(doc.get_element_by_id("a").is_some());
    }

    #[test]
    fn test_scroll_detail() {
        let (spec, _) = parse_swap("beforeend scroll:bottom", SwapStyle::InnerHtml, 0, 20);
        assert_eq!(scroll_detail(&spec), "scroll:bottom");
        let (spec, _) = parse_swap("innerHTML show:#log:top", SwapStyle::InnerHtml, 0, 20);
        assert_eq!(scroll_detail(&spec), "show:#log:top");
    }
}
