//! hywire Expression Parser
//!
//! The attribute mini-language: trigger specs, swap specs, sync
//! declarations, interval literals and bracketed conditional expressions
//! compiled to a typed AST.
//!
//! Parsing is lenient by design: a malformed spec or modifier produces a
//! recoverable warning (surfaced by the engine as a `syntax:error`
//! signal) and the offending piece degrades to a safe default.

mod lexer;
mod interval;
mod cond;
mod trigger;
mod swap;
mod sync;

pub use lexer::{Token, Tokenizer};
pub use interval::parse_interval;
pub use cond::{CondExpr, BinaryOp, UnaryOp, Value, Scope, EvalError, compile_condition};
pub use trigger::{TriggerSpec, TriggerKind, QueueMode, parse_triggers, default_event_for};
pub use swap::{SwapSpec, SwapStyle, ScrollDirective, parse_swap};
pub use sync::{SyncDecl, SyncStrategy, parse_sync};

/// A recoverable parse problem.
///
/// The engine reports these as `syntax:error` signals; the spec that
/// produced one is degraded, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxWarning {
    pub source: String,
    pub message: String,
}

impl SyntaxWarning {
    pub(crate) fn new(source: &str, message: impl Into<String>) -> Self {
        Self { source: source.to_string(), message: message.into() }
    }
}

/// Expression error
#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    #[error("Unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,
}
