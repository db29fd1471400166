//! Scripted transport for exercising the relay client without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::client::MIN_BODY_CHARS;
use super::transport::{HttpResponse, HttpTransport};
use super::FetchError;

type Handler = Box<dyn Fn(&str) -> Result<HttpResponse, FetchError> + Send + Sync>;
type Matcher = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Answers requests from a FIFO script, or from a URL-routing handler.
/// Every requested URL is recorded. Requests matching `holding` stay
/// pending until `release` is called.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, FetchError>>>,
    handler: Option<Handler>,
    hold: Option<Matcher>,
    gate: Notify,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            handler: None,
            hold: None,
            gate: Notify::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn routed(handler: impl Fn(&str) -> Result<HttpResponse, FetchError> + Send + Sync + 'static) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    /// Keep requests whose URL matches `matcher` pending
    pub fn holding(mut self, matcher: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.hold = Some(Box::new(matcher));
        self
    }

    /// Let every held request proceed
    pub fn release(&self) {
        self.gate.notify_waiters();
    }

    pub fn push_ok(&self, body: &str) {
        self.push_status(200, body);
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.script.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn push_err(&self, err: FetchError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.hold.as_ref().is_some_and(|matches| matches(url)) {
            self.gate.notified().await;
        }
        if let Some(ref handler) = self.handler {
            return handler(url);
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("script exhausted".to_string())))
    }
}

/// `prefix` padded past the relay minimum body length
pub fn long_body(prefix: &str) -> String {
    format!("{}{}", prefix, " ".repeat(MIN_BODY_CHARS))
}

/// 200 response helper for routed handlers
pub fn ok(body: &str) -> Result<HttpResponse, FetchError> {
    Ok(HttpResponse {
        status: 200,
        body: body.to_string(),
    })
}
