//! Scripted in-process transport for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::transport::{ApiRequest, ApiResponse, HttpMethod, ResponseMeta, Transport, TransportError};

type Route = (HttpMethod, String);

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<HashMap<Route, ApiResponse>>,
    calls: Mutex<Vec<ApiRequest>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hold every response for `delay` so concurrent callers overlap.
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn respond(&self, method: HttpMethod, path: &str, status: u16, body: Value) {
        self.respond_with_meta(method, path, status, body, ResponseMeta::default());
    }

    pub(crate) fn respond_with_meta(
        &self,
        method: HttpMethod,
        path: &str,
        status: u16,
        body: Value,
        meta: ResponseMeta,
    ) {
        let response = ApiResponse {
            status,
            body: serde_json::to_vec(&body).expect("encode scripted body"),
            meta,
        };
        self.responses
            .lock()
            .expect("responses lock")
            .insert((method, path.to_string()), response);
    }

    pub(crate) fn calls(&self, method: HttpMethod, path: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub(crate) fn last_body(&self, method: HttpMethod, path: &str) -> Option<Value> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .rev()
            .find(|request| request.method == method && request.path == path)
            .and_then(|request| request.body.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let route = (request.method, request.path.clone());
        self.calls.lock().expect("calls lock").push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .expect("responses lock")
            .get(&route)
            .cloned()
            .ok_or_else(|| TransportError::Unavailable(format!("{} {}", route.0, route.1)))
    }
}
