//! Trigger specs
//!
//! Parses `hw-trigger` attribute text into an ordered list of
//! TriggerSpecs. Specs are comma-separated; within a spec, modifiers
//! parse left to right. An unrecognized modifier or a bad conditional
//! produces a SyntaxWarning and the offending piece is skipped; the rest
//! of the spec survives.

use crate::{CondExpr, SyntaxWarning, Tokenizer, compile_condition, parse_interval};

/// Which binding semantics a spec uses. Exactly one applies per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerKind {
    /// Ordinary named event
    #[default]
    Event,
    /// `every <interval>` polling
    Poll,
    /// Fires once on initialization
    Load,
    /// Fires when scrolled into view
    Revealed,
    /// Visibility-intersection observer
    Intersect,
    /// Named event on the node's stream source
    Sse,
}

/// Queue modifier values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    First,
    Last,
    All,
    None,
}

impl QueueMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "first" => Some(QueueMode::First),
            "last" => Some(QueueMode::Last),
            "all" => Some(QueueMode::All),
            "none" => Some(QueueMode::None),
            _ => None,
        }
    }
}

/// Parsed description of when a node should dispatch. Immutable once
/// parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerSpec {
    pub kind: TriggerKind,
    /// Event name (or stream event name for `kind == Sse`)
    pub event_name: String,
    /// Compiled bracket conditional
    pub filter: Option<CondExpr>,
    pub once: bool,
    pub changed: bool,
    pub consume: bool,
    pub delay_ms: Option<u64>,
    pub throttle_ms: Option<u64>,
    /// `from:` listener redirection (extended selector text)
    pub from: Option<String>,
    /// `target:` event-origin filter selector
    pub target: Option<String>,
    pub queue: Option<QueueMode>,
    /// Poll interval for `kind == Poll`
    pub poll_interval_ms: Option<u64>,
    /// `root:` selector for intersection
    pub root: Option<String>,
    /// `threshold:` for intersection (0.0..=1.0)
    pub threshold: Option<f32>,
}

impl TriggerSpec {
    /// A plain event spec with no modifiers
    pub fn event(name: &str) -> Self {
        Self { event_name: name.to_string(), ..Default::default() }
    }
}

/// Default trigger inference from node kind: form submit, button-like
/// input click, other form-control change, anything else click.
pub fn default_event_for(tag: &str, input_type: Option<&str>) -> &'static str {
    match tag {
        "form" => "submit",
        "input" => match input_type.unwrap_or("text") {
            "button" | "submit" | "reset" => "click",
            _ => "change",
        },
        "select" | "textarea" => "change",
        _ => "click",
    }
}

/// Parse a full `hw-trigger` value into specs plus recoverable warnings
pub fn parse_triggers(source: &str) -> (Vec<TriggerSpec>, Vec<SyntaxWarning>) {
    let mut specs = Vec::new();
    let mut warnings = Vec::new();
    let mut cursor = Cursor::new(source);

    loop {
        cursor.skip_ws();
        if cursor.at_end() {
            break;
        }
        if let Some(spec) = parse_one(&mut cursor, source, &mut warnings) {
            specs.push(spec);
        }
        // Skip to the next comma-separated spec
        cursor.skip_until_comma();
        if !cursor.eat(',') {
            break;
        }
    }
    (specs, warnings)
}

fn parse_one(cursor: &mut Cursor, source: &str, warnings: &mut Vec<SyntaxWarning>) -> Option<TriggerSpec> {
    let head = cursor.read_name();
    if head.is_empty() {
        warnings.push(SyntaxWarning::new(source, "expected a trigger name"));
        return None;
    }

    let mut spec = TriggerSpec::default();
    match head.as_str() {
        "every" => {
            spec.kind = TriggerKind::Poll;
            spec.event_name = "every".to_string();
            cursor.skip_ws();
            let interval = cursor.read_word();
            match parse_interval(&interval) {
                Some(ms) => spec.poll_interval_ms = Some(ms),
                None => {
                    warnings.push(SyntaxWarning::new(source, format!("bad poll interval '{interval}'")));
                    return None;
                }
            }
        }
        "load" => {
            spec.kind = TriggerKind::Load;
            spec.event_name = "load".to_string();
        }
        "revealed" => {
            spec.kind = TriggerKind::Revealed;
            spec.event_name = "revealed".to_string();
        }
        "intersect" => {
            spec.kind = TriggerKind::Intersect;
            spec.event_name = "intersect".to_string();
        }
        name => match name.strip_prefix("sse:") {
            Some(stream_event) => {
                spec.kind = TriggerKind::Sse;
                spec.event_name = stream_event.to_string();
                if spec.event_name.is_empty() {
                    warnings.push(SyntaxWarning::new(source, "sse: requires an event name"));
                    return None;
                }
            }
            None => spec.event_name = name.to_string(),
        },
    }

    // Bracketed conditional
    if cursor.eat('[') {
        match cursor.read_bracket_body() {
            Some(body) => match Tokenizer::tokenize(&body).and_then(|t| compile_condition(&t)) {
                Ok(expr) => spec.filter = Some(expr),
                Err(e) => {
                    // Degrades to always-true rather than dropping the spec
                    warnings.push(SyntaxWarning::new(source, format!("bad conditional: {e}")));
                }
            },
            None => {
                warnings.push(SyntaxWarning::new(source, "unterminated conditional"));
            }
        }
    }

    // Modifiers, left to right, until the next comma
    loop {
        cursor.skip_ws();
        if cursor.at_end() || cursor.peek() == Some(',') {
            break;
        }
        let word = cursor.read_word();
        match word.as_str() {
            "once" => spec.once = true,
            "changed" => spec.changed = true,
            "consume" => spec.consume = true,
            "delay" if cursor.eat(':') => match parse_interval(&cursor.read_word()) {
                Some(ms) => spec.delay_ms = Some(ms),
                None => warnings.push(SyntaxWarning::new(source, "bad delay interval")),
            },
            "throttle" if cursor.eat(':') => match parse_interval(&cursor.read_word()) {
                Some(ms) => spec.throttle_ms = Some(ms),
                None => warnings.push(SyntaxWarning::new(source, "bad throttle interval")),
            },
            "from" if cursor.eat(':') => spec.from = Some(cursor.read_extended_selector()),
            "target" if cursor.eat(':') => spec.target = Some(cursor.read_word()),
            "queue" if cursor.eat(':') => {
                let mode = cursor.read_word();
                match QueueMode::parse(&mode) {
                    Some(m) => spec.queue = Some(m),
                    None => warnings.push(SyntaxWarning::new(source, format!("bad queue mode '{mode}'"))),
                }
            }
            "root" if cursor.eat(':') => spec.root = Some(cursor.read_word()),
            "threshold" if cursor.eat(':') => {
                let raw = cursor.read_word();
                match raw.parse::<f32>() {
                    Ok(t) if (0.0..=1.0).contains(&t) => spec.threshold = Some(t),
                    _ => warnings.push(SyntaxWarning::new(source, format!("bad threshold '{raw}'"))),
                }
            }
            other => {
                // Unrecognized modifier: signal and skip just this token
                warnings.push(SyntaxWarning::new(source, format!("unknown modifier '{other}'")));
                if other.is_empty() {
                    // Not even a word; drop the char to guarantee progress
                    cursor.bump();
                }
            }
        }
    }
    Some(spec)
}

/// Raw-text cursor for spec-level scanning (the shared Tokenizer handles
/// the conditional body, which has real expression structure)
struct Cursor<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    fn new(source: &'s str) -> Self {
        Self { source, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn skip_until_comma(&mut self) {
        while matches!(self.peek(), Some(c) if c != ',') {
            self.bump();
        }
    }

    /// Read an event name up to the next whitespace, comma or bracket.
    /// Colons are ordinary name characters (namespaced custom events).
    fn read_name(&mut self) -> String {
        self.skip_ws();
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' || c == '[' {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    /// Read up to the next whitespace, comma, colon or bracket
    fn read_word(&mut self) -> String {
        self.skip_ws();
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' || c == ':' || c == '[' {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    /// Read an extended-selector value. Parenthesized values may contain
    /// whitespace; the relative keywords take one following word.
    fn read_extended_selector(&mut self) -> String {
        if self.eat('(') {
            let mut out = String::new();
            while let Some(c) = self.peek() {
                if c == ')' {
                    self.bump();
                    break;
                }
                out.push(c);
                self.bump();
            }
            return out.trim().to_string();
        }
        let word = self.read_word();
        if matches!(word.as_str(), "closest" | "find" | "next" | "previous") {
            self.skip_ws();
            let arg = self.read_word();
            return format!("{word} {arg}");
        }
        word
    }

    /// Body of a `[...]` conditional, honoring quotes and escapes.
    /// The opening bracket is already consumed.
    fn read_bracket_body(&mut self) -> Option<String> {
        let mut out = String::new();
        let mut depth = 1usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        while let Some(c) = self.peek() {
            self.bump();
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => {
                    out.push(c);
                    escaped = true;
                }
                '\'' | '"' => {
                    if quote == Some(c) {
                        quote = None;
                    } else if quote.is_none() {
                        quote = Some(c);
                    }
                    out.push(c);
                }
                '[' if quote.is_none() => {
                    depth += 1;
                    out.push(c);
                }
                ']' if quote.is_none() => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(out);
                    }
                    out.push(c);
                }
                _ => out.push(c),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_event() {
        let (specs, warnings) = parse_triggers("click");
        assert!(warnings.is_empty());
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].event_name, "click");
        assert_eq!(specs[0].kind, TriggerKind::Event);
    }

    #[test]
    fn test_modifiers() {
        let (specs, warnings) =
            parse_triggers("keyup changed delay:500ms from:closest form target:input queue:last once");
        assert!(warnings.is_empty(), "{warnings:?}");
        let s = &specs[0];
        assert!(s.changed && s.once);
        assert_eq!(s.delay_ms, Some(500));
        assert_eq!(s.from.as_deref(), Some("closest form"));
        assert_eq!(s.target.as_deref(), Some("input"));
        assert_eq!(s.queue, Some(QueueMode::Last));
    }

    #[test]
    fn test_multiple_specs() {
        let (specs, _) = parse_triggers("click, keyup delay:1s, every 2s");
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[2].kind, TriggerKind::Poll);
        assert_eq!(specs[2].poll_interval_ms, Some(2000));
    }

    #[test]
    fn test_conditional() {
        let (specs, warnings) = parse_triggers("click[ctrlKey && shiftKey] consume");
        assert!(warnings.is_empty());
        assert!(specs[0].filter.is_some());
        assert!(specs[0].consume);
    }

    #[test]
    fn test_bad_conditional_degrades() {
        let (specs, warnings) = parse_triggers("click[1 +] delay:10ms");
        assert_eq!(warnings.len(), 1);
        // Spec survives with predicate treated as absent
        assert_eq!(specs.len(), 1);
        assert!(specs[0].filter.is_none());
        assert_eq!(specs[0].delay_ms, Some(10));
    }

    #[test]
    fn test_unknown_modifier_skipped() {
        let (specs, warnings) = parse_triggers("click sideways once");
        assert_eq!(warnings.len(), 1);
        assert!(specs[0].once);
    }

    #[test]
    fn test_special_kinds() {
        let (specs, _) = parse_triggers("load delay:100ms");
        assert_eq!(specs[0].kind, TriggerKind::Load);

        let (specs, _) = parse_triggers("revealed");
        assert_eq!(specs[0].kind, TriggerKind::Revealed);

        let (specs, _) = parse_triggers("intersect root:#viewport threshold:0.5");
        assert_eq!(specs[0].kind, TriggerKind::Intersect);
        assert_eq!(specs[0].root.as_deref(), Some("#viewport"));
        assert_eq!(specs[0].threshold, Some(0.5));

        let (specs, _) = parse_triggers("sse:update");
        assert_eq!(specs[0].kind, TriggerKind::Sse);
        assert_eq!(specs[0].event_name, "update");
    }

    #[test]
    fn test_namespaced_event_name() {
        let (specs, warnings) = parse_triggers("app:refresh from:document once");
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(specs[0].kind, TriggerKind::Event);
        assert_eq!(specs[0].event_name, "app:refresh");
        assert_eq!(specs[0].from.as_deref(), Some("document"));
        assert!(specs[0].once);
    }

    #[test]
    fn test_parenthesized_from() {
        let (specs, _) = parse_triggers("click from:(#list .item)");
        assert_eq!(specs[0].from.as_deref(), Some("#list .item"));
    }

    #[test]
    fn test_default_inference() {
        assert_eq!(default_event_for("form", None), "submit");
        assert_eq!(default_event_for("input", Some("submit")), "click");
        assert_eq!(default_event_for("input", None), "change");
        assert_eq!(default_event_for("select", None), "change");
        assert_eq!(default_event_for("div", None), "click");
    }
}
