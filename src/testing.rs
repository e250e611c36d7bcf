//! 测试替身：按脚本返回结果的 ChatBackend，并记录调用次数与并发度。

use crate::client::{ApiError, ChatBackend, Completion};
use crate::credential::Credential;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Script = dyn Fn(&Credential, &str, usize) -> Result<Completion, ApiError> + Send + Sync;
type Latency = dyn Fn(&str) -> Duration + Send + Sync;

pub(crate) struct ScriptedBackend {
    /// 参数：凭证、payload、该 key 上的第几次调用（从 1 开始）。
    script: Box<Script>,
    latency: Box<Latency>,
    calls: AtomicUsize,
    calls_by_key: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new(
        script: impl Fn(&Credential, &str, usize) -> Result<Completion, ApiError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            latency: Box::new(|_| Duration::ZERO),
            calls: AtomicUsize::new(0),
            calls_by_key: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_latency(
        mut self,
        latency: impl Fn(&str) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.latency = Box::new(latency);
        self
    }

    pub(crate) fn always_ok(content: &'static str) -> Self {
        Self::new(move |_, _, _| Ok(Completion::text(content)))
    }

    pub(crate) fn always_fail() -> Self {
        Self::new(|_, _, _| Err(http_error(500)))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_for(&self, api_key: &str) -> usize {
        self.calls_by_key
            .lock()
            .unwrap()
            .get(api_key)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(
        &self,
        credential: &Credential,
        payload: &str,
    ) -> Result<Completion, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let nth = {
            let mut by_key = self.calls_by_key.lock().unwrap();
            let n = by_key.entry(credential.api_key.clone()).or_insert(0);
            *n += 1;
            *n
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = (self.latency)(payload);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.script)(credential, payload, nth)
    }
}

pub(crate) fn http_error(status: u16) -> ApiError {
    ApiError::Http {
        status,
        message: "scripted failure".to_string(),
    }
}

pub(crate) fn credential(key: &str) -> Credential {
    Credential::new(key, "https://llm.test/v1", "test-model")
}

pub(crate) fn shared(backend: ScriptedBackend) -> Arc<ScriptedBackend> {
    Arc::new(backend)
}
