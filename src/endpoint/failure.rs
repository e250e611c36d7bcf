//! 可插拔的“软失败”判定：响应结构合法但调用方认为不可接受（空内容、被截断等）。

use crate::client::Completion;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct SoftFailure(Arc<dyn Fn(&Completion) -> bool + Send + Sync>);

impl SoftFailure {
    pub fn new(predicate: impl Fn(&Completion) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn is_failure(&self, completion: &Completion) -> bool {
        (self.0)(completion)
    }

    /// 内容为空（或只有空白）。
    pub fn empty_content() -> Self {
        Self::new(|c| c.content.trim().is_empty())
    }

    /// 因长度上限被截断：`finish_reason == "length"`。
    pub fn truncated() -> Self {
        Self::new(|c| c.finish_reason.as_deref() == Some("length"))
    }

    /// 任一判定为失败即失败；空列表返回 None（即不判定）。
    pub fn any_of(predicates: Vec<SoftFailure>) -> Option<Self> {
        match predicates.len() {
            0 => None,
            1 => predicates.into_iter().next(),
            _ => Some(Self::new(move |c| predicates.iter().any(|p| p.is_failure(c)))),
        }
    }
}

impl fmt::Debug for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SoftFailure(..)")
    }
}
