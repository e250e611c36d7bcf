//! 批量调度。
//!
//! 两种实现共用 [`Runner`] 契约：
//! - [`BatchDispatcher`]：所有请求在同一个任务内并发推进，只受各 Endpoint 限速器约束
//! - [`SyncRunner`]：逐个执行（含重试），用于不允许并发/没有异步运行时的宿主
//!
//! 无论完成顺序如何，返回结果总是按输入索引排列；单个请求失败不会影响同批其他请求。

mod batch;
mod sync;
mod types;

pub use batch::BatchDispatcher;
pub use sync::SyncRunner;
pub use types::{Batch, Reply, Request};

use crate::endpoint::Outcome;
use crate::pool::EndpointPool;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// 进度回调：`(已完成数, 总数)`，每个请求完成时调用一次。
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, batch: Batch) -> Vec<Reply>;

    fn pool(&self) -> &EndpointPool;
}

/// 把按索引写入的结果槽收拢为有序结果；空槽（理论上不会出现）记为失败。
fn collect_replies(slots: Vec<Option<Outcome>>) -> Vec<Reply> {
    slots
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| Reply {
            index,
            outcome: outcome.unwrap_or(Outcome::Failed),
        })
        .collect()
}

fn log_batch_finished(batch_id: &str, pool: &EndpointPool, replies: &[Reply], elapsed: Duration) {
    let ok = replies.iter().filter(|r| r.outcome.is_success()).count();
    let failed = replies.len() - ok;
    tracing::info!(
        batch_id,
        elapsed_ms = crate::logging::format_duration_ms(elapsed),
        "批次完成：成功 {ok}，失败 {failed}"
    );
    for s in pool.stats() {
        tracing::debug!(
            batch_id,
            endpoint = %s.endpoint,
            model = %s.model,
            success = s.success,
            failure = s.failure,
            "Endpoint 累计计数"
        );
    }
}
