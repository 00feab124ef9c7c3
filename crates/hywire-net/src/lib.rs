//! hywire Networking
//!
//! The transport seam: request/response types, cooperative completion
//! delivery, stream (SSE) and socket handles, and an in-memory mock the
//! test suites drive as the server side.
//!
//! The engine never blocks on the transport: `send`/`open_*` return
//! handles, completions and inbound messages are drained with `poll`
//! from the run loop.

mod sse;
mod socket;
mod mock;

pub use sse::{SseEvent, parse_sse_line, ReconnectPolicy};
pub use socket::{SocketState, SocketEnvelope};
pub use mock::MockTransport;

/// Request identifier, unique per transport instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// Stream (server-sent events) handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

/// Socket handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(pub u64);

/// HTTP verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// Parse a verb name (case-insensitive)
    pub fn parse(s: &str) -> Option<Verb> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Some(Verb::Get),
            "post" => Some(Verb::Post),
            "put" => Some(Verb::Put),
            "patch" => Some(Verb::Patch),
            "delete" => Some(Verb::Delete),
            _ => None,
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// Does this verb carry a body?
    pub fn has_body(&self) -> bool {
        !matches!(self, Verb::Get)
    }
}

/// Outbound request as handed to the transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub verb: Verb,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub credentials: bool,
    pub timeout_ms: Option<u64>,
}

/// Inbound response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl TransportResponse {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Network error
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request aborted")]
    Aborted,

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Completion or inbound message, drained by the run loop
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A request finished with a response (any status)
    Completed { id: RequestId, response: TransportResponse },
    /// A request failed terminally
    Failed { id: RequestId, error: NetError },
    /// A named event arrived on a stream
    StreamMessage { id: StreamId, event: SseEvent },
    /// The stream closed (server side or network)
    StreamClosed { id: StreamId },
    /// A text message arrived on a socket
    SocketMessage { id: SocketId, text: String },
    /// The socket closed
    SocketClosed { id: SocketId },
}

/// Network transport contract.
///
/// Implementations must be non-blocking: `send` registers the request
/// and returns; the outcome arrives later through `poll`. Aborting an
/// unknown or finished request is a no-op.
pub trait Transport {
    fn send(&mut self, request: TransportRequest) -> RequestId;
    fn abort(&mut self, id: RequestId);
    fn open_stream(&mut self, url: &str) -> StreamId;
    fn close_stream(&mut self, id: StreamId);
    fn open_socket(&mut self, url: &str) -> SocketId;
    fn send_socket(&mut self, id: SocketId, text: &str);
    fn close_socket(&mut self, id: SocketId);
    /// Drain pending completions and messages, in arrival order
    fn poll(&mut self) -> Vec<TransportEvent>;
}
