//! Server-Sent Events
//!
//! Wire-format line parsing for event streams, plus the reconnect-delay
//! policy applied when a stream drops.

/// SSE message event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
    pub last_event_id: String,
}

impl Default for SseEvent {
    fn default() -> Self {
        Self {
            event_type: "message".to_string(),
            data: String::new(),
            last_event_id: String::new(),
        }
    }
}

/// Parse one SSE stream line into the accumulating event.
///
/// Returns a completed event when a blank line dispatches it.
pub fn parse_sse_line(line: &str, current_event: &mut SseEvent) -> Option<SseEvent> {
    let line = line.trim_end_matches('\r');

    if line.is_empty() {
        if !current_event.data.is_empty() {
            let event = current_event.clone();
            *current_event = SseEvent::default();
            return Some(event);
        }
        return None;
    }

    if line.starts_with(':') {
        // Comment, ignore
        return None;
    }

    let (field, value) = if let Some(colon) = line.find(':') {
        let value = line[colon + 1..].trim_start_matches(' ');
        (&line[..colon], value)
    } else {
        (line, "")
    };

    match field {
        "event" => current_event.event_type = value.to_string(),
        "data" => {
            if !current_event.data.is_empty() {
                current_event.data.push('\n');
            }
            current_event.data.push_str(value);
        }
        "id" => current_event.last_event_id = value.to_string(),
        "retry" => { /* handled by the reconnect policy */ }
        _ => {}
    }

    None
}

/// Reconnect-delay policy for dropped streams
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconnectPolicy {
    /// Fixed delay in milliseconds
    Fixed(u64),
    /// Full-jitter exponential backoff, capped
    FullJitter { base_ms: u64, cap_ms: u64 },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::FullJitter { base_ms: 500, cap_ms: 60_000 }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based). `jitter` is a
    /// caller-supplied sample in [0, 1) so schedules stay deterministic
    /// under test.
    pub fn delay_ms(&self, attempt: u32, jitter: f64) -> u64 {
        match self {
            ReconnectPolicy::Fixed(ms) => *ms,
            ReconnectPolicy::FullJitter { base_ms, cap_ms } => {
                let ceiling = base_ms.saturating_mul(1u64 << attempt.min(16)).min(*cap_ms);
                (ceiling as f64 * jitter.clamp(0.0, 1.0)) as u64
            }
        }
    }
}
