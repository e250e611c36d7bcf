//! 单凭证限速器。
//!
//! 采用“已发放时间戳日志”实现：只保留最近一个窗口内的发放记录，
//! 因而任意长度为 `window` 的滑动窗口内发放的许可数都不会超过 `rate_per_window`。

use crate::error::{DispatchError, Result};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RateLimiter {
    rate_per_window: usize,
    window: Duration,
    // tokio::sync::Mutex 按 FIFO 顺序交出锁；等待者持锁睡眠，后来者只能排队。
    granted: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(rate_per_window: u32, window: Duration) -> Result<Self> {
        if rate_per_window == 0 {
            return Err(DispatchError::config("限速 rate_per_window 必须大于 0"));
        }
        if window.is_zero() {
            return Err(DispatchError::config("限速窗口 window 必须大于 0"));
        }
        let rate_per_window = rate_per_window as usize;
        Ok(Self {
            rate_per_window,
            window,
            granted: Mutex::new(VecDeque::with_capacity(rate_per_window)),
        })
    }

    pub fn per_second(rate: u32) -> Result<Self> {
        Self::new(rate, DEFAULT_WINDOW)
    }

    pub fn rate_per_window(&self) -> usize {
        self.rate_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 等待直到发放一个许可不会突破窗口上限。只会延迟，不会失败。
    pub async fn acquire(&self) {
        let mut granted = self.granted.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = granted.front() {
                if now.duration_since(oldest) >= self.window {
                    granted.pop_front();
                } else {
                    break;
                }
            }

            if granted.len() < self.rate_per_window {
                granted.push_back(now);
                return;
            }

            // 窗口已满：睡到最早的一条记录滑出窗口。
            if let Some(&oldest) = granted.front() {
                tokio::time::sleep_until(oldest + self.window).await;
            }
        }
    }
}
