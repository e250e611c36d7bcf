use crate::client::Completion;
use crate::endpoint::failure::SoftFailure;
use crate::error::{DispatchError, Result};
use crate::limiter::DEFAULT_WINDOW;
use std::time::Duration;

pub const DEFAULT_RATE_PER_WINDOW: u32 = 10;
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// 单次调用（含全部重试）的终态。`Success` 才带值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Completion),
    Failed,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn completion(&self) -> Option<&Completion> {
        match self {
            Self::Success(c) => Some(c),
            Self::Failed => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.completion().map(|c| c.content.as_str())
    }
}

/// 每个 Endpoint 的构造参数；池内所有 Endpoint 共用一份。
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    pub rate_per_window: u32,
    pub window: Duration,
    /// 每个请求最多尝试的次数（含首次）。
    pub max_attempts: usize,
    /// 失败后的线性退避基数；为 0 时不等待，只受限速器约束。
    pub retry_backoff: Duration,
    pub soft_failure: Option<SoftFailure>,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            rate_per_window: DEFAULT_RATE_PER_WINDOW,
            window: DEFAULT_WINDOW,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::ZERO,
            soft_failure: None,
        }
    }
}

impl EndpointSettings {
    pub fn with_rate(mut self, rate_per_window: u32, window: Duration) -> Self {
        self.rate_per_window = rate_per_window;
        self.window = window;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_soft_failure(mut self, predicate: SoftFailure) -> Self {
        self.soft_failure = Some(predicate);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DispatchError::config("重试次数 max_attempts 必须至少为 1"));
        }
        // rate/window 由 RateLimiter::new 校验。
        Ok(())
    }
}

/// Endpoint 计数器快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStats {
    pub endpoint: String,
    pub model: String,
    pub success: u64,
    pub failure: u64,
}
