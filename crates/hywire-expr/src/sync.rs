//! Sync declarations
//!
//! Parses `hw-sync` attribute text: an element reference (`this` or a
//! selector) optionally followed by `:strategy`.

use crate::{QueueMode, SyntaxWarning};

/// Concurrency discipline for overlapping dispatches on one sync node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStrategy {
    /// Ignore the new request while one is in flight (unless the current
    /// one is marked abortable)
    #[default]
    Drop,
    /// Reject the new request if one is in flight; otherwise mark the
    /// new one abortable
    Abort,
    /// Cancel the in-flight request, then proceed
    Replace,
    /// Defer issuance behind the in-flight request
    Queue(QueueMode),
}

/// Parsed `hw-sync` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDecl {
    /// `this` or a selector resolving the governing sync node
    pub reference: String,
    pub strategy: SyncStrategy,
}

/// Parse a `hw-sync` value
pub fn parse_sync(source: &str) -> (SyncDecl, Vec<SyntaxWarning>) {
    let mut warnings = Vec::new();
    let source = source.trim();

    let (reference, strategy_text) = match source.rsplit_once(':') {
        Some((r, s)) if !r.is_empty() => (r.trim(), Some(s.trim())),
        _ => (source, None),
    };

    let strategy = match strategy_text {
        None => SyncStrategy::Drop,
        Some("drop") => SyncStrategy::Drop,
        Some("abort") => SyncStrategy::Abort,
        Some("replace") => SyncStrategy::Replace,
        Some(q) if q.starts_with("queue") => {
            let mode = q.strip_prefix("queue").map(str::trim).unwrap_or("");
            match mode {
                "" => SyncStrategy::Queue(QueueMode::Last),
                "first" => SyncStrategy::Queue(QueueMode::First),
                "last" => SyncStrategy::Queue(QueueMode::Last),
                "all" => SyncStrategy::Queue(QueueMode::All),
                other => {
                    warnings.push(SyntaxWarning::new(source, format!("bad queue mode '{other}'")));
                    SyncStrategy::Queue(QueueMode::Last)
                }
            }
        }
        Some(other) => {
            warnings.push(SyntaxWarning::new(source, format!("unknown sync strategy '{other}'")));
            SyncStrategy::Drop
        }
    };

    (
        SyncDecl { reference: reference.to_string(), strategy },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_and_strategy() {
        let (decl, warnings) = parse_sync("closest form:abort");
        assert!(warnings.is_empty());
        assert_eq!(decl.reference, "closest form");
        assert_eq!(decl.strategy, SyncStrategy::Abort);
    }

    #[test]
    fn test_queue_modes() {
        let (decl, _) = parse_sync("this:queue first");
        assert_eq!(decl.strategy, SyncStrategy::Queue(QueueMode::First));

        let (decl, _) = parse_sync("this:queue");
        assert_eq!(decl.strategy, SyncStrategy::Queue(QueueMode::Last));
    }

    #[test]
    fn test_default_is_drop() {
        let (decl, warnings) = parse_sync("this");
        assert!(warnings.is_empty());
        assert_eq!(decl.strategy, SyncStrategy::Drop);
    }

    #[test]
    fn test_unknown_strategy_degrades() {
        let (decl, warnings) = parse_sync("this:sideways");
        assert_eq!(decl.strategy, SyncStrategy::Drop);
        assert_eq!(warnings.len(), 1);
    }
}
