//! In-process transport that serves canned responses.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::transport::{RawResponse, Request, Transport};
use crate::error::TransportError;

/// What a mocked route answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(RawResponse),
    Error(TransportError),
}

/// Transport serving queued replies keyed by URL.
///
/// Each route holds a queue: replies are consumed in order and the final one
/// repeats forever. Lookup tries the exact URL first, then the URL without
/// its query string. Every request is recorded.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`.
    pub fn route(&self, url: &str, response: RawResponse) {
        self.route_reply(url, MockReply::Response(response));
    }

    /// Queue a response or transport failure for `url`.
    pub fn route_reply(&self, url: &str, reply: MockReply) {
        self.routes
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_reply(&self, url: &str) -> Option<MockReply> {
        let mut routes = self.routes.lock();
        let key = if routes.contains_key(url) {
            url.to_string()
        } else {
            let without_query = url.split('?').next().unwrap_or(url);
            if !routes.contains_key(without_query) {
                return None;
            }
            without_query.to_string()
        };

        let queue = routes.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.requests.lock().push(request.clone());
        match self.next_reply(&request.url) {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Error(e)) => Err(e),
            None => Err(TransportError::Connect(format!("no mock route for {}", request.url))),
        }
    }
}
