//! Endpoint：一组凭证 + 一个限速器 + 有界重试 + 成功/失败计数。

pub mod failure;
pub mod types;

use crate::client::ChatBackend;
use crate::credential::Credential;
use crate::error::{DispatchError, Result};
use crate::limiter::RateLimiter;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub use failure::SoftFailure;
pub use types::{EndpointSettings, EndpointStats, Outcome};

/// 退避上限。
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

pub struct Endpoint {
    credential: Credential,
    limiter: RateLimiter,
    backend: Arc<dyn ChatBackend>,
    max_attempts: usize,
    retry_backoff: Duration,
    soft_failure: Option<SoftFailure>,
    success_count: AtomicU64,
    failure_count: AtomicU64,
}

impl Endpoint {
    pub fn new(
        credential: Credential,
        backend: Arc<dyn ChatBackend>,
        settings: &EndpointSettings,
    ) -> Result<Self> {
        settings.validate()?;
        if credential.base_url.trim().is_empty() {
            return Err(DispatchError::config("凭证缺少 base_url"));
        }
        if credential.model.trim().is_empty() {
            return Err(DispatchError::config("凭证缺少 model"));
        }
        let limiter = RateLimiter::new(settings.rate_per_window, settings.window)?;

        Ok(Self {
            credential,
            limiter,
            backend,
            max_attempts: settings.max_attempts,
            retry_backoff: settings.retry_backoff,
            soft_failure: settings.soft_failure.clone(),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            endpoint: self.credential.masked_key(),
            model: self.credential.model.clone(),
            success: self.success_count(),
            failure: self.failure_count(),
        }
    }

    /// 发起一次逻辑调用：最多尝试 `max_attempts` 次，成功立即返回。
    ///
    /// 传输错误、协议错误与软失败都计入 `failure_count` 并进入下一次尝试；
    /// 全部用尽后返回 [`Outcome::Failed`]，从不向调用方抛错。
    pub async fn invoke(&self, payload: &str) -> Outcome {
        for attempt in 1..=self.max_attempts {
            self.limiter.acquire().await;

            let (status, reason) = match self.backend.complete(&self.credential, payload).await {
                Ok(completion) => match &self.soft_failure {
                    Some(p) if p.is_failure(&completion) => (
                        None,
                        format!(
                            "响应未通过校验（finish_reason={}）",
                            completion.finish_reason.as_deref().unwrap_or("-")
                        ),
                    ),
                    _ => {
                        self.success_count.fetch_add(1, Ordering::Relaxed);
                        return Outcome::Success(completion);
                    }
                },
                Err(e) => (e.status(), e.to_string()),
            };

            self.failure_count.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                endpoint = %self.credential.masked_key(),
                model = %self.credential.model,
                attempt,
                max_attempts = self.max_attempts,
                status = ?status,
                "请求失败：{reason}"
            );

            if attempt < self.max_attempts
                && let Some(delay) = self.backoff_delay(attempt)
            {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::warn!(
            endpoint = %self.credential.masked_key(),
            model = %self.credential.model,
            "重试 {} 次后仍失败",
            self.max_attempts
        );
        Outcome::Failed
    }

    fn backoff_delay(&self, attempt: usize) -> Option<Duration> {
        if self.retry_backoff.is_zero() {
            return None;
        }
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        Some(
            self.retry_backoff
                .saturating_mul(factor)
                .min(MAX_RETRY_BACKOFF),
        )
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("credential", &self.credential)
            .field("limiter", &self.limiter)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .field("success_count", &self.success_count())
            .field("failure_count", &self.failure_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Completion;
    use crate::testing::{ScriptedBackend, credential, http_error, shared};
    use tokio::time::Instant;

    fn endpoint(backend: Arc<ScriptedBackend>, settings: EndpointSettings) -> Endpoint {
        Endpoint::new(credential("sk-test-000000"), backend, &settings).unwrap()
    }

    #[tokio::test]
    async fn always_failing_call_makes_exactly_max_attempts() {
        let backend = shared(ScriptedBackend::always_fail());
        let ep = endpoint(backend.clone(), EndpointSettings::default());

        assert_eq!(ep.invoke("hello").await, Outcome::Failed);
        assert_eq!(backend.calls(), 3);
        assert_eq!(ep.failure_count(), 3);
        assert_eq!(ep.success_count(), 0);
    }

    #[tokio::test]
    async fn success_on_second_attempt_stops_retrying() {
        let backend = shared(ScriptedBackend::new(|_, _, nth| {
            if nth == 1 {
                Err(http_error(502))
            } else {
                Ok(Completion::text("second"))
            }
        }));
        let ep = endpoint(backend.clone(), EndpointSettings::default());

        let out = ep.invoke("hello").await;
        assert_eq!(out.content(), Some("second"));
        assert_eq!(backend.calls(), 2);
        assert_eq!(ep.success_count(), 1);
        assert_eq!(ep.failure_count(), 1);
    }

    #[tokio::test]
    async fn soft_failure_is_retried_like_transport_error() {
        let backend = shared(ScriptedBackend::new(|_, _, nth| {
            Ok(Completion::text(if nth < 3 { "" } else { "finally" }))
        }));
        let settings = EndpointSettings::default()
            .with_max_attempts(4)
            .with_soft_failure(SoftFailure::empty_content());
        let ep = endpoint(backend.clone(), settings);

        assert_eq!(ep.invoke("x").await.content(), Some("finally"));
        assert_eq!(backend.calls(), 3);
        assert_eq!(ep.failure_count(), 2);
    }

    #[tokio::test]
    async fn without_predicate_every_response_is_accepted() {
        let backend = shared(ScriptedBackend::always_ok(""));
        let ep = endpoint(backend.clone(), EndpointSettings::default());

        assert_eq!(ep.invoke("x").await.content(), Some(""));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn single_attempt_setting_never_retries() {
        let backend = shared(ScriptedBackend::always_fail());
        let ep = endpoint(backend.clone(), EndpointSettings::default().with_max_attempts(1));

        assert_eq!(ep.invoke("x").await, Outcome::Failed);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_wait_for_rate_limiter_and_backoff() {
        let backend = shared(ScriptedBackend::always_fail());
        let settings = EndpointSettings::default()
            .with_rate(1, Duration::from_secs(1))
            .with_retry_backoff(Duration::from_millis(100));
        let ep = endpoint(backend.clone(), settings);

        let start = Instant::now();
        assert_eq!(ep.invoke("x").await, Outcome::Failed);
        // 三次尝试受 1/s 限速，至少跨越两个窗口。
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn backoff_grows_linearly_and_is_capped() {
        let backend = shared(ScriptedBackend::always_fail());
        let ep = endpoint(
            backend,
            EndpointSettings::default().with_retry_backoff(Duration::from_secs(2)),
        );
        assert_eq!(ep.backoff_delay(1), Some(Duration::from_secs(2)));
        assert_eq!(ep.backoff_delay(2), Some(Duration::from_secs(4)));
        assert_eq!(ep.backoff_delay(3), Some(MAX_RETRY_BACKOFF));

        let no_backoff = endpoint(
            shared(ScriptedBackend::always_fail()),
            EndpointSettings::default(),
        );
        assert_eq!(no_backoff.backoff_delay(1), None);
    }

    #[test]
    fn invalid_settings_are_rejected_at_construction() {
        let backend: Arc<dyn ChatBackend> = shared(ScriptedBackend::always_fail());
        let zero_attempts = EndpointSettings::default().with_max_attempts(0);
        assert!(matches!(
            Endpoint::new(credential("k"), backend.clone(), &zero_attempts),
            Err(DispatchError::Config(_))
        ));

        let zero_rate = EndpointSettings::default().with_rate(0, Duration::from_secs(1));
        assert!(matches!(
            Endpoint::new(credential("k"), backend.clone(), &zero_rate),
            Err(DispatchError::Config(_))
        ));

        let no_model = Credential::new("k", "https://llm.test/v1", "");
        assert!(matches!(
            Endpoint::new(no_model, backend, &EndpointSettings::default()),
            Err(DispatchError::Config(_))
        ));
    }
}
