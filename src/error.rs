use thiserror::Error;

/// 构造期/批次期错误。远端调用失败不在此列：它们在 Endpoint 内部被重试并折叠为 `Outcome::Failed`。
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("批次无效: {0}")]
    InvalidBatch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch(message.into())
    }
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
