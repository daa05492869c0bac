//! Common test utilities and fixtures
//!
//! - `ScriptedTransport` replays canned responses and records what it was sent,
//!   for pipeline tests that run on tokio's paused clock
//! - `EchoBatch` is a wiremock responder answering every step of a `$batch` call
//! - rstest fixtures for a mock server and a client pointed at it

#![allow(dead_code)]

use async_trait::async_trait;
use graphkit::{GraphClient, HttpRequest, HttpResponse, Transport, TransportError};
use graphkit::http::{HeaderValue, RetryOptions, StatusCode};
use rstest::fixture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

/// Test access token
pub const TEST_TOKEN: &str = "test-token";

/// Transport that answers from a script; the last response repeats forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<HttpResponse>>,
    sent: Mutex<Vec<(HttpRequest, Instant)>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    /// Gaps between consecutive sends.
    pub fn gaps(&self) -> Vec<Duration> {
        let sent = self.sent.lock().unwrap();
        sent.windows(2).map(|w| w[1].1 - w[0].1).collect()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push((request, Instant::now()));

        let mut script = self.script.lock().unwrap();
        let response = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        Ok(response.unwrap_or_else(|| HttpResponse::with_status(StatusCode::OK)))
    }
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse::with_status(StatusCode::from_u16(code).unwrap())
}

pub fn redirect(code: u16, location: &str) -> HttpResponse {
    let mut response = status(code);
    response
        .headers
        .insert("location", HeaderValue::from_str(location).unwrap());
    response
}

pub fn throttled(code: u16, retry_after: Option<&str>) -> HttpResponse {
    let mut response = status(code);
    if let Some(value) = retry_after {
        response
            .headers
            .insert("retry-after", HeaderValue::from_str(value).unwrap());
    }
    response
}

/// Graph error body
pub fn graph_error(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "innerError": {
                "request-id": "0f1c6c5e-3c8d-4b8e-9d3b-8b2d2c7f9a10",
                "date": "2024-05-01T10:00:00"
            }
        }
    })
}

/// Answers each step of a `$batch` request, in reverse order.
///
/// Steps whose id is in `failing` get a 429; the rest echo their url.
pub struct EchoBatch {
    pub failing: Vec<String>,
}

impl Respond for EchoBatch {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };

        let mut responses: Vec<serde_json::Value> = body["requests"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|step| {
                let id = step["id"].as_str().unwrap_or_default().to_string();
                if self.failing.contains(&id) {
                    serde_json::json!({
                        "id": id,
                        "status": 429,
                        "headers": {"retry-after": "3"},
                        "body": graph_error("TooManyRequests", "Too many requests")
                    })
                } else {
                    serde_json::json!({
                        "id": id,
                        "status": 200,
                        "headers": {"content-type": "application/json"},
                        "body": {"url": step["url"]}
                    })
                }
            })
            .collect();
        responses.reverse();

        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "responses": responses }))
    }
}

/// Fixture providing a wiremock HTTP server
#[fixture]
pub async fn mock_server() -> MockServer {
    MockServer::start().await
}

/// Client pointed at `server` with fast, bounded retries.
pub fn test_client(server: &MockServer) -> GraphClient {
    GraphClient::builder()
        .access_token(TEST_TOKEN)
        .base_url(server.uri())
        .timeout(Duration::from_secs(5))
        .retry_options(RetryOptions::new(3, Duration::from_millis(10)))
        .build()
        .expect("Failed to build test client")
}
