use crate::endpoint::Outcome;
use crate::error::{DispatchError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub index: usize,
    pub payload: String,
}

/// 一个请求的最终结果；`index` 与输入位置一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub index: usize,
    pub outcome: Outcome,
}

/// 一批请求，索引保证唯一且稠密（0..N-1），并按索引排好序。
#[derive(Debug, Clone, Default)]
pub struct Batch {
    requests: Vec<Request>,
}

impl Batch {
    pub fn from_prompts<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requests = prompts
            .into_iter()
            .enumerate()
            .map(|(index, p)| Request {
                index,
                payload: p.into(),
            })
            .collect();
        Self { requests }
    }

    /// 校验调用方给出的索引；顺序可以打乱，但必须恰好覆盖 0..N-1。
    pub fn from_requests(mut requests: Vec<Request>) -> Result<Self> {
        requests.sort_by_key(|r| r.index);
        for (pos, r) in requests.iter().enumerate() {
            if r.index < pos {
                return Err(DispatchError::invalid_batch(format!(
                    "索引 {} 重复",
                    r.index
                )));
            }
            if r.index > pos {
                return Err(DispatchError::invalid_batch(format!(
                    "索引不连续：缺少 {pos}"
                )));
            }
        }
        Ok(Self { requests })
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<Request> {
        self.requests
    }
}
