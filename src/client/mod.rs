//! 远端调用层：调度器只依赖 [`ChatBackend`]，具体协议由实现决定。

pub mod openai;
pub mod types;

use crate::credential::Credential;
use async_trait::async_trait;
use thiserror::Error;

pub use openai::OpenAiBackend;
pub use types::{Completion, GenerationParams};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("上游 API 错误 {status}: {message}")]
    Http { status: u16, message: String },

    #[error("上游响应格式异常: {0}")]
    Malformed(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] sonic_rs::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// 注入的远端调用机制：提交一段文本，返回文本或错误。
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, credential: &Credential, payload: &str)
    -> Result<Completion, ApiError>;
}
