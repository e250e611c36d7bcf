use crate::dispatch::{Batch, ProgressFn, Reply, Runner, log_batch_finished};
use crate::error::{DispatchError, Result};
use crate::pool::EndpointPool;
use crate::util::id;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// 顺序执行：一个请求（含全部重试）结束后才开始下一个。
///
/// 轮询分配、限速与重试策略与 [`BatchDispatcher`](crate::dispatch::BatchDispatcher) 完全一致。
pub struct SyncRunner {
    pool: Arc<EndpointPool>,
    on_progress: Option<ProgressFn>,
}

impl SyncRunner {
    pub fn new(pool: Arc<EndpointPool>) -> Self {
        Self {
            pool,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub async fn run(&self, batch: Batch) -> Vec<Reply> {
        let total = batch.len();
        let batch_id = id::batch_id();
        let start = Instant::now();
        tracing::info!(
            batch_id = %batch_id,
            total,
            endpoints = self.pool.size(),
            "批次开始（顺序）"
        );

        // Batch 已按索引排序，顺序追加即与输入对齐。
        let mut replies = Vec::with_capacity(total);
        for req in batch.into_requests() {
            let endpoint = self.pool.for_index(req.index);
            let outcome = endpoint.invoke(&req.payload).await;
            replies.push(Reply {
                index: req.index,
                outcome,
            });
            if let Some(cb) = &self.on_progress {
                cb(replies.len(), total);
            }
        }

        log_batch_finished(&batch_id, &self.pool, &replies, start.elapsed());
        replies
    }

    /// 在私有的单线程运行时上执行 [`run`](Self::run)，供没有异步运行时的宿主调用。
    ///
    /// 在 tokio 运行时内部调用会返回配置错误，此时应直接 `run(...).await`。
    pub fn run_blocking(&self, batch: Batch) -> Result<Vec<Reply>> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(DispatchError::config(
                "run_blocking 不能在 tokio 运行时内调用，请改用 run().await",
            ));
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(rt.block_on(self.run(batch)))
    }
}

#[async_trait]
impl Runner for SyncRunner {
    async fn run(&self, batch: Batch) -> Vec<Reply> {
        SyncRunner::run(self, batch).await
    }

    fn pool(&self) -> &EndpointPool {
        &self.pool
    }
}
