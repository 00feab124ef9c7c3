//! In-memory transport
//!
//! Plays the server side in tests: records outbound requests, lets the
//! test complete or fail them explicitly, and feeds stream/socket
//! messages back through `poll`.

use std::collections::HashMap;

use crate::{
    NetError, RequestId, SocketId, SseEvent, StreamId, Transport, TransportEvent,
    TransportRequest, TransportResponse,
};

/// Scripted in-memory transport
#[derive(Debug, Default)]
pub struct MockTransport {
    next_id: u64,
    /// Requests seen, in dispatch order (kept after completion)
    requests: Vec<(RequestId, TransportRequest)>,
    in_flight: HashMap<RequestId, TransportRequest>,
    aborted: Vec<RequestId>,
    streams: HashMap<StreamId, String>,
    sockets: HashMap<SocketId, String>,
    socket_sent: Vec<(SocketId, String)>,
    pending: Vec<TransportEvent>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests ever sent
    pub fn requests(&self) -> &[(RequestId, TransportRequest)] {
        &self.requests
    }

    /// Number of requests ever sent
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// The most recent request, if any
    pub fn last_request(&self) -> Option<&(RequestId, TransportRequest)> {
        self.requests.last()
    }

    /// Ids still awaiting completion
    pub fn in_flight_ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.in_flight.keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Ids the engine aborted
    pub fn aborted_ids(&self) -> &[RequestId] {
        &self.aborted
    }

    /// Messages the engine sent over sockets
    pub fn socket_sent(&self) -> &[(SocketId, String)] {
        &self.socket_sent
    }

    /// Currently open stream urls
    pub fn open_streams(&self) -> Vec<&str> {
        self.streams.values().map(|s| s.as_str()).collect()
    }

    /// Complete a request with a full response
    pub fn complete(&mut self, id: RequestId, response: TransportResponse) {
        if self.in_flight.remove(&id).is_some() {
            self.pending.push(TransportEvent::Completed { id, response });
        }
    }

    /// Complete a request with a plain 200 HTML body
    pub fn complete_ok(&mut self, id: RequestId, body: &str) {
        self.complete(
            id,
            TransportResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "text/html".to_string())],
                body: body.to_string(),
            },
        );
    }

    /// Complete the oldest in-flight request with a 200 body
    pub fn complete_next_ok(&mut self, body: &str) {
        if let Some(id) = self.in_flight_ids().first().copied() {
            self.complete_ok(id, body);
        }
    }

    /// Fail a request terminally
    pub fn fail(&mut self, id: RequestId, error: NetError) {
        if self.in_flight.remove(&id).is_some() {
            self.pending.push(TransportEvent::Failed { id, error });
        }
    }

    /// Push a named event onto a stream
    pub fn push_stream_event(&mut self, id: StreamId, event: SseEvent) {
        if self.streams.contains_key(&id) {
            self.pending.push(TransportEvent::StreamMessage { id, event });
        }
    }

    /// Push a text message onto a socket
    pub fn push_socket_message(&mut self, id: SocketId, text: &str) {
        if self.sockets.contains_key(&id) {
            self.pending.push(TransportEvent::SocketMessage { id, text: text.to_string() });
        }
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Transport for MockTransport {
    fn send(&mut self, request: TransportRequest) -> RequestId {
        let id = RequestId(self.next());
        tracing::debug!("mock send {:?} {} -> {:?}", request.verb, request.url, id);
        self.requests.push((id, request.clone()));
        self.in_flight.insert(id, request);
        id
    }

    fn abort(&mut self, id: RequestId) {
        if self.in_flight.remove(&id).is_some() {
            self.aborted.push(id);
            self.pending.push(TransportEvent::Failed { id, error: NetError::Aborted });
        }
    }

    fn open_stream(&mut self, url: &str) -> StreamId {
        let id = StreamId(self.next());
        self.streams.insert(id, url.to_string());
        id
    }

    fn close_stream(&mut self, id: StreamId) {
        self.streams.remove(&id);
    }

    fn open_socket(&mut self, url: &str) -> SocketId {
        let id = SocketId(self.next());
        self.sockets.insert(id, url.to_string());
        id
    }

    fn send_socket(&mut self, id: SocketId, text: &str) {
        if self.sockets.contains_key(&id) {
            self.socket_sent.push((id, text.to_string()));
        }
    }

    fn close_socket(&mut self, id: SocketId) {
        self.sockets.remove(&id);
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Verb;

    fn request(url: &str) -> TransportRequest {
        TransportRequest {
            verb: Verb::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            credentials: false,
            timeout_ms: None,
        }
    }

    #[test]
    fn test_send_complete_poll() {
        let mut t = MockTransport::new();
        let id = t.send(request("/a"));
        assert_eq!(t.request_count(), 1);
        assert_eq!(t.in_flight_ids(), vec![id]);

        t.complete_ok(id, "<div>ok</div>");
        let events = t.poll();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TransportEvent::Completed { id: got, .. } if *got == id));
        assert!(t.poll().is_empty());
    }

    #[test]
    fn test_abort() {
        let mut t = MockTransport::new();
        let id = t.send(request("/a"));
        t.abort(id);
        assert_eq!(t.aborted_ids(), &[id]);
        let events = t.poll();
        assert!(matches!(
            &events[0],
            TransportEvent::Failed { error: NetError::Aborted, .. }
        ));
        // Double-abort is a no-op
        t.abort(id);
        assert!(t.poll().is_empty());
    }

    #[test]
    fn test_stream_lifecycle() {
        let mut t = MockTransport::new();
        let id = t.open_stream("/events");
        t.push_stream_event(id, SseEvent { event_type: "tick".to_string(), ..Default::default() });
        assert_eq!(t.poll().len(), 1);

        t.close_stream(id);
        t.push_stream_event(id, SseEvent::default());
        assert!(t.poll().is_empty());
    }
}
