//! Lifecycle signals
//!
//! Every observable moment in the engine produces a Signal. Observers
//! may veto the `before:*` family and `config:request`; everything else
//! is notification only. No recoverable condition is silent.

use hywire_dom::NodeId;

/// Signal names emitted by the engine
pub mod names {
    pub const BEFORE_PROCESS: &str = "before:process";
    pub const AFTER_PROCESS: &str = "after:process";
    pub const BEFORE_REQUEST: &str = "before:request";
    pub const AFTER_REQUEST: &str = "after:request";
    pub const CONFIG_REQUEST: &str = "config:request";
    pub const BEFORE_SEND: &str = "before:send";
    pub const BEFORE_SWAP: &str = "before:swap";
    pub const AFTER_SWAP: &str = "after:swap";
    pub const BEFORE_SETTLE: &str = "before:settle";
    pub const AFTER_SETTLE: &str = "after:settle";
    pub const BEFORE_HISTORY_SAVE: &str = "before:history-save";
    pub const HISTORY_RESTORE: &str = "history:restore";
    pub const HISTORY_CACHE_MISS: &str = "history:cache-miss";
    pub const HISTORY_CACHE_MISS_LOAD: &str = "history:cache-miss-load";
    pub const HISTORY_CACHE_MISS_ERROR: &str = "history:cache-miss-error";
    pub const VALIDATION_VALIDATE: &str = "validation:validate";
    pub const VALIDATION_FAILED: &str = "validation:failed";
    pub const VALIDATION_HALTED: &str = "validation:halted";
    pub const SEND_ERROR: &str = "send:error";
    pub const SEND_ABORT: &str = "send:abort";
    pub const TIMEOUT: &str = "timeout";
    pub const RESPONSE_ERROR: &str = "response:error";
    pub const RESPONSE_REDIRECT: &str = "response:redirect";
    pub const TARGET_ERROR: &str = "target:error";
    pub const OOB_ERROR: &str = "oob:error";
    pub const SWAP_ERROR: &str = "swap:error";
    pub const STREAM_ERROR: &str = "stream:error";
    pub const EVAL_DISALLOWED: &str = "eval:disallowed";
    pub const SCRIPT_PROCESS: &str = "script:process";
    pub const SYNTAX_ERROR: &str = "syntax:error";
    pub const POLL_CANCELLED: &str = "poll:cancelled";
    pub const PROMPT_CANCELLED: &str = "prompt:cancelled";
}

/// One observable engine event
#[derive(Debug, Clone)]
pub struct Signal {
    pub name: String,
    /// Originating node (NONE for document-level signals)
    pub node: NodeId,
    /// Human-readable context
    pub detail: String,
}

impl Signal {
    pub fn new(name: &str, node: NodeId, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), node, detail: detail.into() }
    }
}

type Observer = Box<dyn FnMut(&Signal) -> bool>;

/// Signal dispatcher with a bounded in-memory log.
///
/// Observers run in registration order; returning false from any of
/// them vetoes a vetoable signal.
pub struct SignalHub {
    observers: Vec<(Option<String>, Observer)>,
    log: Vec<Signal>,
}

impl std::fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalHub")
            .field("observers", &self.observers.len())
            .field("log", &self.log.len())
            .finish()
    }
}

impl SignalHub {
    pub fn new() -> Self {
        Self { observers: Vec::new(), log: Vec::new() }
    }

    /// Observe every signal
    pub fn observe_all(&mut self, observer: impl FnMut(&Signal) -> bool + 'static) {
        self.observers.push((None, Box::new(observer)));
    }

    /// Observe one signal name
    pub fn observe(&mut self, name: &str, observer: impl FnMut(&Signal) -> bool + 'static) {
        self.observers.push((Some(name.to_string()), Box::new(observer)));
    }

    /// Emit a signal; returns false if an observer vetoed it
    pub fn emit(&mut self, signal: Signal) -> bool {
        tracing::debug!("signal {} node={:?} {}", signal.name, signal.node, signal.detail);
        let mut allowed = true;
        for (filter, observer) in self.observers.iter_mut() {
            if filter.as_deref().is_none_or(|f| f == signal.name) && !observer(&signal) {
                allowed = false;
            }
        }
        self.log.push(signal);
        allowed
    }

    /// All signals emitted so far, in order
    pub fn log(&self) -> &[Signal] {
        &self.log
    }

    /// Count of signals with the given name
    pub fn count(&self, name: &str) -> usize {
        self.log.iter().filter(|s| s.name == name).count()
    }

    /// Has a signal with the given name been emitted?
    pub fn saw(&self, name: &str) -> bool {
        self.count(name) > 0
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_log() {
        let mut hub = SignalHub::new();
        assert!(hub.emit(Signal::new(names::BEFORE_REQUEST, NodeId::NONE, "x")));
        assert!(hub.saw(names::BEFORE_REQUEST));
        assert_eq!(hub.count(names::AFTER_REQUEST), 0);
    }

    #[test]
    fn test_veto() {
        let mut hub = SignalHub::new();
        hub.observe(names::BEFORE_REQUEST, |_| false);
        assert!(!hub.emit(Signal::new(names::BEFORE_REQUEST, NodeId::NONE, "")));
        // Other names unaffected
        assert!(hub.emit(Signal::new(names::AFTER_REQUEST, NodeId::NONE, "")));
    }

    #[test]
    fn test_observe_all() {
        let seen = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut hub = SignalHub::new();
        let counter = seen.clone();
        hub.observe_all(move |_| {
            counter.set(counter.get() + 1);
            true
        });
        hub.emit(Signal::new("a", NodeId::NONE, ""));
        hub.emit(Signal::new("b", NodeId::NONE, ""));
        assert_eq!(seen.get(), 2);
    }
}
