//! Integration tests - full pipeline from attributes to patched DOM
//!
//! Every test drives a real Engine over a MockTransport: trigger an
//! event or advance the virtual clock, complete the request by hand,
//! then assert on the document and the signal log.

use hywire_engine::{names, DomEvent, Engine, EngineConfig, MemoryStorage, ScriptedPrompter};
use hywire_net::{MockTransport, SocketId, SseEvent, StreamId, TransportResponse, Verb};

fn engine_with(html: &str) -> Engine<MockTransport> {
    let mut engine = Engine::new(MockTransport::new());
    engine.load_html(html);
    engine
}

fn text_of(engine: &Engine<MockTransport>, selector: &str) -> String {
    let node = engine.doc.query_selector(selector).expect("selector should match");
    engine.doc.tree().text_content(node)
}

fn respond_ok(engine: &mut Engine<MockTransport>, body: &str) {
    engine.transport.complete_next_ok(body);
    engine.tick();
}

// ============================================================================
// BASIC REQUEST / SWAP CYCLE
// ============================================================================

#[test]
fn test_click_get_swaps_target() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/items" hw-target="#out">load</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");

    assert_eq!(engine.transport.request_count(), 1);
    let (_, request) = engine.transport.last_request().unwrap();
    assert_eq!(request.verb, Verb::Get);
    assert_eq!(request.url, "/items");

    respond_ok(&mut engine, "<ul><li>one</li></ul>");
    assert_eq!(text_of(&engine, "#out"), "one");
    assert!(engine.signals.saw(names::AFTER_SWAP));
}

#[test]
fn test_correlation_headers() {
    let mut engine = engine_with(
        r##"<button id="b" name="loader" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");

    let (_, request) = engine.transport.last_request().unwrap();
    let header = |name: &str| {
        request
            .headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(header("HW-Request"), Some("true"));
    assert_eq!(header("HW-Trigger"), Some("b"));
    assert_eq!(header("HW-Trigger-Name"), Some("loader"));
    assert_eq!(header("HW-Target"), Some("out"));
}

#[test]
fn test_post_sends_form_body() {
    let mut engine = engine_with(
        r##"<form id="f" hw-post="/save" hw-target="#out">
             <input name="title" value="hello world">
           </form><div id="out"></div>"##,
    );
    engine.trigger("#f", "submit");

    let (_, request) = engine.transport.last_request().unwrap();
    assert_eq!(request.verb, Verb::Post);
    assert_eq!(request.body.as_deref(), Some("title=hello+world"));
    assert!(request
        .headers
        .iter()
        .any(|(k, v)| k == "Content-Type" && v == "application/x-www-form-urlencoded"));
}

#[test]
fn test_get_encodes_query_string() {
    let mut engine = engine_with(
        r##"<input id="q" name="q" value="rust" hw-get="/search" hw-target="#out" hw-trigger="change"><div id="out"></div>"##,
    );
    engine.trigger("#q", "change");
    let (_, request) = engine.transport.last_request().unwrap();
    assert_eq!(request.url, "/search?q=rust");
    assert!(request.body.is_none());
}

#[test]
fn test_declared_vals_merge_into_params() {
    let mut engine = engine_with(
        r##"<button id="b" hw-post="/save" hw-vals='{"page":"2"}' hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    let (_, request) = engine.transport.last_request().unwrap();
    assert_eq!(request.body.as_deref(), Some("page=2"));
}

#[test]
fn test_vars_expressions_evaluated() {
    let mut engine = engine_with(
        r##"<button id="b" hw-post="/save" hw-vars="total: 2 + 3" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    let (_, request) = engine.transport.last_request().unwrap();
    assert_eq!(request.body.as_deref(), Some("total=5"));
}

#[test]
fn test_swap_style_beforeend_appends() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/more" hw-target="#log" hw-swap="beforeend">more</button>
           <div id="log"><p>a</p></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, "<p>b</p>");
    assert_eq!(text_of(&engine, "#log"), "ab");
}

#[test]
fn test_swap_delete_removes_target() {
    let mut engine = engine_with(
        r##"<button id="b" hw-delete="/item/1" hw-target="#row" hw-swap="delete">x</button>
           <div id="row">gone soon</div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, "");
    assert!(engine.doc.query_selector("#row").is_none());
}

#[test]
fn test_select_narrows_response() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/page" hw-target="#out" hw-select="#pick">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, r##"<div id="skip">no</div><div id="pick">yes</div>"##);
    assert_eq!(text_of(&engine, "#out"), "yes");
}

#[test]
fn test_settle_classes_removed_after_delay() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, "<p>new</p>");

    let p = engine.doc.query_selector("#out p").unwrap();
    let classes = engine.doc.attr(p, "class").unwrap_or_default().to_string();
    assert!(classes.contains("hw-added"));
    assert!(classes.contains("hw-settling"));

    engine.advance(20);
    let classes = engine.doc.attr(p, "class").unwrap_or_default();
    assert!(!classes.contains("hw-added"));
    assert!(!classes.contains("hw-settling"));
    assert!(engine.signals.saw(names::AFTER_SETTLE));
}

// ============================================================================
// TRIGGER MODIFIERS
// ============================================================================

#[test]
fn test_once_fires_a_single_time() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-trigger="click once">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, "done");
    engine.trigger("#b", "click");
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 1);
}

#[test]
fn test_changed_gate() {
    let mut engine = engine_with(
        r##"<input id="q" name="q" value="" hw-get="/s" hw-target="#out" hw-trigger="change changed"><div id="out"></div>"##,
    );
    // Value identical to the bind-time baseline: no dispatch
    engine.trigger("#q", "change");
    assert_eq!(engine.transport.request_count(), 0);

    let q = engine.doc.get_element_by_id("q").unwrap();
    if let Some(elem) = engine.doc.tree_mut().get_mut(q).and_then(|n| n.as_element_mut()) {
        elem.set_attr("value", "rust");
    }
    engine.trigger("#q", "change");
    assert_eq!(engine.transport.request_count(), 1);

    // Unchanged again
    engine.transport.complete_next_ok("ok");
    engine.tick();
    engine.trigger("#q", "change");
    assert_eq!(engine.transport.request_count(), 1);
}

#[test]
fn test_delay_debounces() {
    let mut engine = engine_with(
        r##"<input id="q" name="q" hw-get="/s" hw-target="#out" hw-trigger="input delay:200ms"><div id="out"></div>"##,
    );
    engine.trigger("#q", "input");
    engine.advance(50);
    engine.trigger("#q", "input");
    engine.advance(50);
    assert_eq!(engine.transport.request_count(), 0, "still inside the delay window");

    engine.advance(200);
    assert_eq!(engine.transport.request_count(), 1, "only the last dispatch fires");
}

#[test]
fn test_throttle_drops_rapid_fire() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-trigger="click throttle:500ms">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 1);

    respond_ok(&mut engine, "ok");
    engine.advance(500);
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 2);
}

#[test]
fn test_conditional_filter() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-trigger="click[shiftKey]">go</button><div id="out"></div>"##,
    );
    let b = engine.doc.get_element_by_id("b").unwrap();

    engine.dispatch(DomEvent::new("click", b).with_field("shiftKey", hywire_expr::Value::Bool(false)));
    assert_eq!(engine.transport.request_count(), 0);

    engine.dispatch(DomEvent::new("click", b).with_field("shiftKey", hywire_expr::Value::Bool(true)));
    assert_eq!(engine.transport.request_count(), 1);
}

#[test]
fn test_filter_disallowed_by_config() {
    let mut config = EngineConfig::default();
    config.eval_allowed = false;
    let mut engine = Engine::with_config(MockTransport::new(), config);
    engine.load_html(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-trigger="click[shiftKey]">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 0);
    assert!(engine.signals.saw(names::EVAL_DISALLOWED));
}

#[test]
fn test_conditional_judged_before_origin_filter() {
    let mut config = EngineConfig::default();
    config.eval_allowed = false;
    let mut engine = Engine::with_config(MockTransport::new(), config);
    engine.load_html(
        r##"<div id="box" hw-get="/x" hw-target="#out" hw-trigger="click[shiftKey] target:input"><span id="s">go</span></div><div id="out"></div>"##,
    );
    // The origin does not match target:input, but the disallowed
    // conditional is still what stops the spec
    engine.trigger("#s", "click");
    assert_eq!(engine.transport.request_count(), 0);
    assert!(engine.signals.saw(names::EVAL_DISALLOWED));
}

#[test]
fn test_from_document_listener() {
    let mut engine = engine_with(
        r##"<div id="panel" hw-get="/refresh" hw-target="#panel" hw-trigger="app:refresh from:document">old</div>"##,
    );
    // Dispatched anywhere, the document listener still matches
    let body = engine.doc.body();
    engine.dispatch(DomEvent::new("app:refresh", body));
    assert_eq!(engine.transport.request_count(), 1);
}

#[test]
fn test_load_trigger_fires_without_events() {
    let mut engine = engine_with(
        r##"<div id="lazy" hw-get="/frag" hw-target="#lazy" hw-trigger="load delay:100ms">...</div>"##,
    );
    assert_eq!(engine.transport.request_count(), 0);
    engine.advance(100);
    assert_eq!(engine.transport.request_count(), 1);
}

#[test]
fn test_load_trigger_honors_conditional() {
    let mut engine = engine_with(
        r##"<div id="lazy" hw-get="/frag" hw-target="#lazy" hw-trigger="load[1 == 2]">...</div>"##,
    );
    engine.tick();
    assert_eq!(engine.transport.request_count(), 0);
}

// ============================================================================
// POLLING
// ============================================================================

#[test]
fn test_poll_repeats_until_286() {
    let mut engine = engine_with(
        r##"<div id="status" hw-get="/status" hw-target="#status" hw-trigger="every 100ms">...</div>"##,
    );
    engine.advance(100);
    assert_eq!(engine.transport.request_count(), 1);
    respond_ok(&mut engine, "running");

    engine.advance(100);
    assert_eq!(engine.transport.request_count(), 2);

    // 286 swaps one final time, then stops the poll
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse { status: 286, headers: Vec::new(), body: "finished".to_string() },
    );
    engine.tick();
    assert!(engine.signals.saw(names::POLL_CANCELLED));
    assert_eq!(text_of(&engine, "#status"), "finished");

    engine.advance(1000);
    assert_eq!(engine.transport.request_count(), 2, "poll must not resume");
}

#[test]
fn test_poll_stops_when_node_removed() {
    let mut engine = engine_with(
        r##"<div id="status" hw-get="/status" hw-target="#status" hw-trigger="every 50ms">...</div>"##,
    );
    engine.advance(50);
    assert_eq!(engine.transport.request_count(), 1);
    respond_ok(&mut engine, "ok");

    let node = engine.doc.get_element_by_id("status").unwrap();
    engine.doc.tree_mut().detach(node);
    engine.advance(500);
    assert_eq!(engine.transport.request_count(), 1);
    assert!(engine.signals.saw(names::POLL_CANCELLED));
}

// ============================================================================
// SYNC DISCIPLINES
// ============================================================================

#[test]
fn test_implicit_overlap_queues_latest() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    engine.trigger("#b", "click");
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 1, "overlaps coalesce");

    respond_ok(&mut engine, "first");
    assert_eq!(engine.transport.request_count(), 2, "one queued dispatch replays");
    respond_ok(&mut engine, "second");
    assert_eq!(engine.transport.request_count(), 2);
}

#[test]
fn test_sync_drop_discards_overlap() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-sync="this:drop">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 1);

    respond_ok(&mut engine, "done");
    assert_eq!(engine.transport.request_count(), 1, "dropped dispatch never replays");
}

#[test]
fn test_sync_replace_aborts_in_flight() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-sync="this:replace">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 2);
    assert_eq!(engine.transport.aborted_ids().len(), 1);

    engine.tick();
    assert!(engine.signals.saw(names::SEND_ABORT));
}

#[test]
fn test_sync_queue_all_replays_everything() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-sync="this:queue all">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    engine.trigger("#b", "click");
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 1);

    respond_ok(&mut engine, "a");
    assert_eq!(engine.transport.request_count(), 2);
    respond_ok(&mut engine, "b");
    assert_eq!(engine.transport.request_count(), 3);
    respond_ok(&mut engine, "c");
    assert_eq!(engine.transport.request_count(), 3);
}

// ============================================================================
// PRECONDITIONS
// ============================================================================

#[test]
fn test_confirm_cancel_stops_request() {
    let mut engine = engine_with(
        r##"<button id="b" hw-delete="/item" hw-confirm="Sure?" hw-target="#out">x</button><div id="out"></div>"##,
    );
    engine.set_prompter(ScriptedPrompter { confirms: vec![false], prompts: Vec::new() });
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 0);
    assert!(engine.signals.saw(names::PROMPT_CANCELLED));
}

#[test]
fn test_prompt_answer_becomes_header() {
    let mut engine = engine_with(
        r##"<button id="b" hw-post="/rename" hw-prompt="New name?" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.set_prompter(ScriptedPrompter {
        confirms: Vec::new(),
        prompts: vec![Some("fred".to_string())],
    });
    engine.trigger("#b", "click");
    let (_, request) = engine.transport.last_request().unwrap();
    assert!(request.headers.iter().any(|(k, v)| k == "HW-Prompt" && v == "fred"));
}

#[test]
fn test_validation_halts_submit() {
    let mut engine = engine_with(
        r##"<form id="f" hw-post="/save" hw-target="#out">
             <input name="title" required value="">
           </form><div id="out"></div>"##,
    );
    engine.trigger("#f", "submit");
    assert_eq!(engine.transport.request_count(), 0);
    assert!(engine.signals.saw(names::VALIDATION_FAILED));
    assert!(engine.signals.saw(names::VALIDATION_HALTED));
}

#[test]
fn test_before_request_veto() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.signals.observe(names::BEFORE_REQUEST, |_| false);
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 0);
}

// ============================================================================
// RESPONSE HEADERS AND STATUS CLASSIFICATION
// ============================================================================

#[test]
fn test_204_completes_without_swap() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out">old</div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse { status: 204, headers: Vec::new(), body: String::new() },
    );
    engine.tick();
    assert_eq!(text_of(&engine, "#out"), "old");
    assert!(engine.signals.saw(names::AFTER_REQUEST));
}

#[test]
fn test_error_status_swaps_only_when_configured() {
    let html =
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out">old</div>"##;

    let mut engine = engine_with(html);
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse { status: 500, headers: Vec::new(), body: "boom".to_string() },
    );
    engine.tick();
    assert_eq!(text_of(&engine, "#out"), "old");
    assert!(engine.signals.saw(names::RESPONSE_ERROR));

    let mut config = EngineConfig::default();
    config.swap_on_error = true;
    let mut engine = Engine::with_config(MockTransport::new(), config);
    engine.load_html(html);
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse { status: 500, headers: Vec::new(), body: "boom".to_string() },
    );
    engine.tick();
    assert_eq!(text_of(&engine, "#out"), "boom");
}

#[test]
fn test_redirect_status_body_swaps() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out">old</div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse {
            status: 302,
            headers: Vec::new(),
            body: "<span>moved</span>".to_string(),
        },
    );
    engine.tick();
    assert_eq!(text_of(&engine, "#out"), "moved");
}

#[test]
fn test_retarget_header() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button>
           <div id="out">a</div><div id="other">b</div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse {
            status: 200,
            headers: vec![("HW-Retarget".to_string(), "#other".to_string())],
            body: "moved".to_string(),
        },
    );
    engine.tick();
    assert_eq!(text_of(&engine, "#out"), "a");
    assert_eq!(text_of(&engine, "#other"), "moved");
}

#[test]
fn test_reswap_header_overrides_style() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#log" hw-swap="innerHTML">go</button>
           <div id="log"><p>a</p></div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse {
            status: 200,
            headers: vec![("HW-Reswap".to_string(), "beforeend".to_string())],
            body: "<p>b</p>".to_string(),
        },
    );
    engine.tick();
    assert_eq!(text_of(&engine, "#log"), "ab");
}

#[test]
fn test_redirect_header_navigates() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out">old</div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse {
            status: 200,
            headers: vec![("HW-Redirect".to_string(), "/login".to_string())],
            body: "ignored".to_string(),
        },
    );
    engine.tick();
    assert_eq!(engine.current_url(), "/login");
    assert_eq!(text_of(&engine, "#out"), "old");
    assert!(engine.signals.saw(names::RESPONSE_REDIRECT));
}

#[test]
fn test_trigger_header_dispatches_events() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>
           <div id="panel" hw-get="/panel" hw-target="#panel" hw-trigger="panel:refresh from:document">p</div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse {
            status: 200,
            headers: vec![("HW-Trigger".to_string(), "panel:refresh".to_string())],
            body: "done".to_string(),
        },
    );
    engine.tick();
    assert_eq!(engine.transport.request_count(), 2);
    assert_eq!(engine.transport.last_request().unwrap().1.url, "/panel");
}

#[test]
fn test_trigger_after_settle_header_waits_for_settle() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>
           <div id="panel" hw-get="/panel" hw-target="#panel" hw-trigger="data:ready from:document">p</div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse {
            status: 200,
            headers: vec![("HW-Trigger-After-Settle".to_string(), "data:ready".to_string())],
            body: "done".to_string(),
        },
    );
    engine.tick();
    assert_eq!(engine.transport.request_count(), 1, "dispatch waits for settle");

    engine.advance(20);
    assert_eq!(engine.transport.request_count(), 2);
    assert_eq!(engine.transport.last_request().unwrap().1.url, "/panel");
}

#[test]
fn test_push_url_header_sets_location() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.complete(
        id,
        TransportResponse {
            status: 200,
            headers: vec![("HW-Push-Url".to_string(), "/after".to_string())],
            body: "new".to_string(),
        },
    );
    engine.tick();
    assert_eq!(engine.current_url(), "/after");
}

// ============================================================================
// OUT-OF-BAND CONTENT
// ============================================================================

#[test]
fn test_oob_swaps_by_id() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button>
           <div id="out"></div><div id="alert">quiet</div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(
        &mut engine,
        r##"<p>main</p><div id="alert" hw-swap-oob="true">ping</div>"##,
    );
    assert_eq!(text_of(&engine, "#out"), "main");
    assert_eq!(text_of(&engine, "#alert"), "ping");
}

#[test]
fn test_oob_without_target_is_discarded() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(
        &mut engine,
        r##"<p>main</p><div id="ghost" hw-swap-oob="true">lost</div>"##,
    );
    assert_eq!(text_of(&engine, "#out"), "main");
    assert!(engine.doc.query_selector("#ghost").is_none());
    assert!(engine.signals.saw(names::OOB_ERROR));
}

#[test]
fn test_oob_with_style_and_selector() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button>
           <div id="out"></div><ul id="list"><li>a</li></ul>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(
        &mut engine,
        r##"<p>main</p><li hw-swap-oob="beforeend:#list">b</li>"##,
    );
    assert_eq!(text_of(&engine, "#list"), "ab");
}

#[test]
fn test_preserve_survives_swap() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button>
           <div id="out"><video id="player" hw-preserve="true">playing</video></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(
        &mut engine,
        r##"<p>around</p><video id="player" hw-preserve="true">fresh</video>"##,
    );
    // The original node's content survives, not the response's
    assert_eq!(text_of(&engine, "#player"), "playing");
    assert_eq!(text_of(&engine, "#out"), "aroundplaying");
}

// ============================================================================
// FOCUS AND SCRIPTS
// ============================================================================

#[test]
fn test_focus_restored_by_id_after_swap() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#form">go</button>
           <div id="form"><input id="q" value="ru"></div>"##,
    );
    engine.focus("#q");
    engine.set_selection(0, 2);
    engine.trigger("#b", "click");
    respond_ok(&mut engine, r##"<input id="q" value="rust"><p>2 hits</p>"##);
    engine.advance(20);

    let refocused = engine.focused().unwrap();
    assert_eq!(engine.doc.id_of(refocused), Some("q"));
    assert_eq!(engine.doc.attr(refocused, "value"), Some("rust"));
    assert_eq!(engine.selection(), Some((0, 2)));
}

#[test]
fn test_focus_dropped_when_id_gone() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#form">go</button>
           <div id="form"><input id="q"></div>"##,
    );
    engine.focus("#q");
    engine.trigger("#b", "click");
    respond_ok(&mut engine, "<p>done</p>");
    engine.advance(20);
    assert!(engine.focused().is_none());
    assert!(engine.selection().is_none());
}

#[test]
fn test_autofocus_in_new_content_takes_focus() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, r##"<input id="name" autofocus>"##);
    engine.advance(20);
    let focused = engine.focused().unwrap();
    assert_eq!(engine.doc.id_of(focused), Some("name"));
}

#[test]
fn test_inserted_scripts_surfaced_to_host() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, r##"<p>hi</p><script>init()</script>"##);
    assert!(engine.signals.saw(names::SCRIPT_PROCESS));

    let mut engine = Engine::with_config(MockTransport::new(), {
        let mut c = EngineConfig::default();
        c.eval_allowed = false;
        c
    });
    engine.load_html(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, r##"<p>hi</p><script>init()</script>"##);
    assert!(!engine.signals.saw(names::SCRIPT_PROCESS));
    assert!(engine.signals.saw(names::EVAL_DISALLOWED));
}

// ============================================================================
// INDICATORS AND BUSY MARKERS
// ============================================================================

#[test]
fn test_indicator_class_lifecycle() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-indicator="#spin">go</button>
           <div id="out"></div><img id="spin">"##,
    );
    engine.trigger("#b", "click");
    let spin = engine.doc.get_element_by_id("spin").unwrap();
    let b = engine.doc.get_element_by_id("b").unwrap();
    assert!(engine.doc.attr(spin, "class").unwrap_or_default().contains("hw-indicator"));
    assert!(engine.doc.attr(b, "class").unwrap_or_default().contains("hw-request"));

    respond_ok(&mut engine, "done");
    assert!(!engine.doc.attr(spin, "class").unwrap_or_default().contains("hw-indicator"));
    assert!(!engine.doc.attr(b, "class").unwrap_or_default().contains("hw-request"));
}

#[test]
fn test_disabled_elt_during_request() {
    let mut engine = engine_with(
        r##"<form id="f" hw-post="/go" hw-target="#out" hw-disabled-elt="#submit">
             <button id="submit">send</button>
           </form><div id="out"></div>"##,
    );
    engine.trigger("#f", "submit");
    let submit = engine.doc.get_element_by_id("submit").unwrap();
    assert!(engine.doc.has_attr(submit, "disabled"));

    respond_ok(&mut engine, "sent");
    assert!(!engine.doc.has_attr(submit, "disabled"));
}

// ============================================================================
// BOOST AND HISTORY
// ============================================================================

#[test]
fn test_boosted_anchor_navigates_into_body() {
    let mut engine = engine_with(
        r##"<div hw-boost="true"><a id="link" href="/page2">next</a></div>"##,
    );
    engine.trigger("#link", "click");
    let (_, request) = engine.transport.last_request().unwrap();
    assert_eq!(request.url, "/page2");
    assert!(request.headers.iter().any(|(k, v)| k == "HW-Boosted" && v == "true"));

    respond_ok(&mut engine, "<h1>Page two</h1>");
    let body = engine.doc.body();
    assert!(engine.doc.tree().text_content(body).contains("Page two"));
    assert_eq!(engine.current_url(), "/page2");
}

#[test]
fn test_history_restore_round_trip() {
    let mut engine = engine_with(
        r##"<div hw-boost="true"><a id="link" href="/page2">next</a></div>"##,
    );
    let home = engine.current_url();
    engine.trigger("#link", "click");
    respond_ok(&mut engine, "<h1>Page two</h1>");
    assert_eq!(engine.current_url(), "/page2");

    engine.popstate(&home);
    assert!(engine.signals.saw(names::HISTORY_RESTORE));
    assert_eq!(engine.current_url(), home);
    let body = engine.doc.body();
    assert!(engine.doc.tree().text_content(body).contains("next"));
    assert_eq!(engine.transport.request_count(), 1, "restore came from cache");
}

#[test]
fn test_history_cache_miss_refetches() {
    let mut engine = engine_with(r##"<div id="app">home</div>"##);
    engine.popstate("/elsewhere");
    assert!(engine.signals.saw(names::HISTORY_CACHE_MISS));
    assert_eq!(engine.transport.request_count(), 1);
    let (_, request) = engine.transport.last_request().unwrap();
    assert_eq!(request.url, "/elsewhere");
    assert!(request
        .headers
        .iter()
        .any(|(k, _)| k == "HW-History-Restore-Request"));

    respond_ok(&mut engine, "<div id=\"app\">elsewhere</div>");
    assert!(engine.signals.saw(names::HISTORY_CACHE_MISS_LOAD));
    let body = engine.doc.body();
    assert!(engine.doc.tree().text_content(body).contains("elsewhere"));
}

#[test]
fn test_history_snapshots_persist_to_storage() {
    let mut engine = engine_with(
        r##"<div hw-boost="true"><a id="link" href="/page2">next</a></div>"##,
    );
    engine.set_storage(MemoryStorage::new());
    engine.trigger("#link", "click");
    respond_ok(&mut engine, "<h1>two</h1>");
    assert!(engine.signals.saw(names::BEFORE_HISTORY_SAVE));
}

// ============================================================================
// STREAMS AND SOCKETS
// ============================================================================

#[test]
fn test_sse_swap_routes_named_events() {
    let mut engine = engine_with(
        r##"<div id="feed" hw-sse-connect="/events">
             <div id="live" hw-sse-swap="update">waiting</div>
           </div>"##,
    );
    assert_eq!(engine.transport.open_streams(), vec!["/events"]);

    engine.transport.push_stream_event(
        StreamId(1),
        SseEvent {
            event_type: "update".to_string(),
            data: "<b>fresh</b>".to_string(),
            ..Default::default()
        },
    );
    engine.tick();
    assert_eq!(text_of(&engine, "#live"), "fresh");

    // Other event names leave the node alone
    engine.transport.push_stream_event(
        StreamId(1),
        SseEvent {
            event_type: "other".to_string(),
            data: "nope".to_string(),
            ..Default::default()
        },
    );
    engine.tick();
    assert_eq!(text_of(&engine, "#live"), "fresh");
}

#[test]
fn test_sse_trigger_fires_request() {
    let mut engine = engine_with(
        r##"<div hw-sse-connect="/events">
             <div id="counts" hw-get="/counts" hw-target="#counts" hw-trigger="sse:tick">0</div>
           </div>"##,
    );
    engine.transport.push_stream_event(
        StreamId(1),
        SseEvent { event_type: "tick".to_string(), ..Default::default() },
    );
    engine.tick();
    assert_eq!(engine.transport.request_count(), 1);
    assert_eq!(engine.transport.last_request().unwrap().1.url, "/counts");
}

#[test]
fn test_ws_send_wraps_values_in_envelope() {
    let mut engine = engine_with(
        r##"<div hw-ws-connect="/chat">
             <form id="f" hw-ws-send="true"><input name="msg" value="hello"></form>
           </div>"##,
    );
    engine.trigger("#f", "submit");
    let sent = engine.transport.socket_sent();
    assert_eq!(sent.len(), 1);
    let parsed: serde_json::Value = serde_json::from_str(&sent[0].1).unwrap();
    assert_eq!(parsed["msg"], "hello");
    assert_eq!(parsed["HEADERS"]["HW-Request"], "true");
}

#[test]
fn test_ws_message_replaces_by_id() {
    let mut engine = engine_with(
        r##"<div hw-ws-connect="/chat"><div id="log">old</div></div>"##,
    );
    engine.transport.push_socket_message(SocketId(1), r##"<div id="log">new line</div>"##);
    engine.tick();
    assert_eq!(text_of(&engine, "#log"), "new line");

    engine.transport.push_socket_message(SocketId(1), r##"<div id="missing">x</div>"##);
    engine.tick();
    assert!(engine.signals.saw(names::OOB_ERROR));
}

// ============================================================================
// FAILURE PATHS
// ============================================================================

#[test]
fn test_timeout_aborts_and_signals() {
    let mut config = EngineConfig::default();
    config.timeout_ms = 500;
    let mut engine = Engine::with_config(MockTransport::new(), config);
    engine.load_html(r##"<button id="b" hw-get="/slow" hw-target="#out">go</button><div id="out"></div>"##);
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 1);

    engine.advance(500);
    assert!(engine.signals.saw(names::TIMEOUT));
    assert_eq!(engine.transport.aborted_ids().len(), 1);
}

#[test]
fn test_network_failure_signals_send_error() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out">old</div>"##,
    );
    engine.trigger("#b", "click");
    let id = engine.transport.in_flight_ids()[0];
    engine.transport.fail(id, hywire_net::NetError::Network("connection refused".to_string()));
    engine.tick();
    assert!(engine.signals.saw(names::SEND_ERROR));
    assert_eq!(text_of(&engine, "#out"), "old");
}

#[test]
fn test_missing_target_halts_with_signal() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#nowhere">go</button>"##,
    );
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 0);
    assert!(engine.signals.saw(names::TARGET_ERROR));
}

#[test]
fn test_bad_trigger_syntax_degrades_with_signal() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out" hw-trigger="click[oops">go</button><div id="out"></div>"##,
    );
    assert!(engine.signals.saw(names::SYNTAX_ERROR));
}

// ============================================================================
// INHERITANCE AND SUBTREE DISABLING
// ============================================================================

#[test]
fn test_target_inherited_from_ancestor() {
    let mut engine = engine_with(
        r##"<div hw-target="#out">
             <button id="b" hw-get="/x">go</button>
           </div><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, "inherited");
    assert_eq!(text_of(&engine, "#out"), "inherited");
}

#[test]
fn test_disinherit_blocks_ancestor_target() {
    let mut engine = engine_with(
        r##"<div hw-target="#out" hw-disinherit="hw-target">
             <button id="b" hw-get="/x">go</button>
           </div><div id="out">old</div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(&mut engine, "self");
    // Without the inherited target the button itself receives the swap
    assert_eq!(text_of(&engine, "#out"), "old");
    assert_eq!(text_of(&engine, "#b"), "self");
}

#[test]
fn test_hw_disable_turns_subtree_off() {
    let mut engine = engine_with(
        r##"<div hw-disable="true">
             <button id="b" hw-get="/x" hw-target="#out">go</button>
           </div><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    assert_eq!(engine.transport.request_count(), 0);
}

// ============================================================================
// INSERTED CONTENT IS LIVE
// ============================================================================

#[test]
fn test_swapped_content_is_processed() {
    let mut engine = engine_with(
        r##"<button id="b" hw-get="/x" hw-target="#out">go</button><div id="out"></div>"##,
    );
    engine.trigger("#b", "click");
    respond_ok(
        &mut engine,
        r##"<button id="inner" hw-get="/y" hw-target="#out">again</button>"##,
    );
    engine.trigger("#inner", "click");
    assert_eq!(engine.transport.request_count(), 2);
    assert_eq!(engine.transport.last_request().unwrap().1.url, "/y");
}
