//! 面向限速推理接口的批量调度：多凭证轮询、单凭证限速、有界重试，结果按输入顺序返回。

pub mod cli;
pub mod client;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod pool;
pub mod util;

#[cfg(test)]
mod testing;

pub use client::{ApiError, ChatBackend, Completion, OpenAiBackend};
pub use credential::Credential;
pub use dispatch::{Batch, BatchDispatcher, ProgressFn, Reply, Request, Runner, SyncRunner};
pub use endpoint::{Endpoint, EndpointSettings, EndpointStats, Outcome, SoftFailure};
pub use error::DispatchError;
pub use limiter::RateLimiter;
pub use pool::EndpointPool;
