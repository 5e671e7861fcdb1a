//! Mock HTTP 客户端
//!
//! 用于单元测试与端到端测试的内存实现，支持注入延迟与失败场景。

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{FetchOptions, HttpClient, HttpResponse, TransportError};
use serde_json::Value;

/// 可注入的传输失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Network,
    Status(u16),
    Cancelled,
}

impl From<MockFailure> for TransportError {
    fn from(failure: MockFailure) -> Self {
        match failure {
            MockFailure::Timeout => TransportError::Timeout("mock timeout".into()),
            MockFailure::Network => TransportError::Network("mock network failure".into()),
            MockFailure::Status(status) => TransportError::Status { status },
            MockFailure::Cancelled => TransportError::Cancelled,
        }
    }
}

/// 请求结果
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// 响应体文本 (fetch_script 时作为 JSON 解析，失败则作为字符串)
    Body(String),
    /// fetch_script 的返回值 (fetch_json 时序列化为文本)
    Script(Value),
    /// 请求本身失败
    Fail(MockFailure),
    /// 请求成功但读取响应体失败
    BodyFail(MockFailure),
}

/// 单个 URL 的预设回复
#[derive(Debug, Clone)]
pub struct MockReply {
    pub outcome: MockOutcome,
    /// 请求完成前的延迟
    pub delay: Duration,
    /// 读取响应体前的延迟
    pub body_delay: Duration,
}

impl MockReply {
    fn new(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            body_delay: Duration::ZERO,
        }
    }

    pub fn json(value: Value) -> Self {
        Self::new(MockOutcome::Body(value.to_string()))
    }

    pub fn body(text: impl Into<String>) -> Self {
        Self::new(MockOutcome::Body(text.into()))
    }

    pub fn script(value: Value) -> Self {
        Self::new(MockOutcome::Script(value))
    }

    pub fn failure(failure: MockFailure) -> Self {
        Self::new(MockOutcome::Fail(failure))
    }

    pub fn body_failure(failure: MockFailure) -> Self {
        Self::new(MockOutcome::BodyFail(failure))
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_body_delay(mut self, delay: Duration) -> Self {
        self.body_delay = delay;
        self
    }
}

impl Default for MockReply {
    fn default() -> Self {
        Self::json(serde_json::json!({}))
    }
}

/// Mock HTTP 客户端
pub struct MockHttpClient {
    /// 按完整 URL 匹配的回复
    replies: Mutex<HashMap<String, MockReply>>,
    /// 未匹配时的回复
    default_reply: Mutex<MockReply>,
    /// 已发出的请求 (fetch_json 与 fetch_script)，按发出顺序
    requests: Mutex<Vec<String>>,
    /// 已发出的错误 beacon
    beacons: Mutex<Vec<String>>,
    script_calls: AtomicU32,
}

impl MockHttpClient {
    /// 创建默认 mock 客户端，所有请求返回 `{}`
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            default_reply: Mutex::new(MockReply::default()),
            requests: Mutex::new(Vec::new()),
            beacons: Mutex::new(Vec::new()),
            script_calls: AtomicU32::new(0),
        }
    }

    pub fn with_reply(self, url: impl Into<String>, reply: MockReply) -> Self {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner).insert(url.into(), reply);
        self
    }

    pub fn with_default_reply(self, reply: MockReply) -> Self {
        *self.default_reply.lock().unwrap_or_else(PoisonError::into_inner) = reply;
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn beacons(&self) -> Vec<String> {
        self.beacons.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn script_call_count(&self) -> u32 {
        self.script_calls.load(Ordering::SeqCst)
    }

    fn record(&self, url: &str) -> MockReply {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(url.to_string());
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_reply.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock 响应，延迟读取响应体
pub struct MockResponse {
    body: Result<String, MockFailure>,
    delay: Duration,
}

impl HttpResponse for MockResponse {
    async fn text(self) -> Result<String, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.body.map_err(TransportError::from)
    }
}

impl HttpClient for MockHttpClient {
    type Response = MockResponse;

    fn fetch_json(
        &self,
        url: &str,
        _options: FetchOptions,
    ) -> impl Future<Output = Result<Self::Response, TransportError>> + Send {
        let reply = self.record(url);
        async move {
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            let body = match reply.outcome {
                MockOutcome::Body(text) => Ok(text),
                MockOutcome::Script(value) => Ok(value.to_string()),
                MockOutcome::Fail(failure) => return Err(failure.into()),
                MockOutcome::BodyFail(failure) => Err(failure),
            };
            Ok(MockResponse {
                body,
                delay: reply.body_delay,
            })
        }
    }

    fn fetch_script(&self, uri: &str) -> impl Future<Output = Result<Value, TransportError>> + Send {
        self.script_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.record(uri);
        async move {
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            match reply.outcome {
                MockOutcome::Script(value) => Ok(value),
                MockOutcome::Body(text) => {
                    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
                }
                MockOutcome::Fail(failure) | MockOutcome::BodyFail(failure) => {
                    Err(failure.into())
                }
            }
        }
    }

    fn send_beacon(&self, url: &str) {
        self.beacons.lock().unwrap_or_else(PoisonError::into_inner).push(url.to_string());
    }
}
