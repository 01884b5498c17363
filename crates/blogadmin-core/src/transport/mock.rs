//! Scripted in-memory transport
//!
//! Replays queued replies per `(method, path)` and records every request, so
//! session and client logic can be tested without a server. The last reply
//! queued for a route repeats once the queue drains to it.
//!
//! ```rust
//! use blogadmin_core::transport::mock::MockTransport;
//! use blogadmin_core::transport::Method;
//!
//! let mock = MockTransport::new();
//! mock.respond(Method::Get, "/admin/stats", 200, r#"{"users":{"total":1}}"#);
//! assert_eq!(mock.request_count(), 0);
//! ```

use super::{ApiRequest, Method, RawResponse, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Respond(RawResponse),
    Fail(TransportError),
}

#[derive(Debug, Clone)]
struct Scripted {
    reply: Reply,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockState {
    routes: HashMap<(Method, String), VecDeque<Scripted>>,
    requests: Vec<ApiRequest>,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply with a raw body
    pub fn respond(&self, method: Method, path: &str, status: u16, body: impl Into<String>) -> &Self {
        self.push(method, path, Reply::Respond(RawResponse::new(status, body)), None)
    }

    /// Queue a reply with a JSON body
    pub fn respond_json(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.respond(method, path, status, body.to_string())
    }

    /// Queue a reply delivered after `delay` (tokio time, so paused clocks apply)
    pub fn respond_after(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        status: u16,
        body: impl Into<String>,
    ) -> &Self {
        self.push(
            method,
            path,
            Reply::Respond(RawResponse::new(status, body)),
            Some(delay),
        )
    }

    /// Queue a transport-level failure
    pub fn fail(&self, method: Method, path: &str, error: TransportError) -> &Self {
        self.push(method, path, Reply::Fail(error), None)
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Requests received for one route
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    fn push(&self, method: Method, path: &str, reply: Reply, delay: Option<Duration>) -> &Self {
        self.state
            .lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Scripted { reply, delay });
        self
    }

    fn next_reply(&self, request: &ApiRequest) -> Option<Scripted> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        let queue = state
            .routes
            .get_mut(&(request.method, request.path.clone()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let Some(scripted) = self.next_reply(&request) else {
            return Ok(RawResponse::new(
                404,
                format!(r#"{{"error":"no scripted reply for {} {}"}}"#, request.method, request.path),
            ));
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        match scripted.reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(error) => Err(error),
        }
    }
}
