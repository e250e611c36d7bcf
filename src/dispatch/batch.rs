use crate::dispatch::{Batch, ProgressFn, Reply, Runner, collect_replies, log_batch_finished};
use crate::endpoint::Outcome;
use crate::pool::EndpointPool;
use crate::util::id;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Instant;

/// 并发调度器：同一批的所有请求在一个任务里交错推进。
///
/// Endpoint 在提交时按批内索引分配（`index mod size`），每一批都从第 0 个 Endpoint 开始；请求只在限速等待与远端调用处让出执行权，
/// 结果槽只由收集循环按索引写入一次。
pub struct BatchDispatcher {
    pool: Arc<EndpointPool>,
    on_progress: Option<ProgressFn>,
}

impl BatchDispatcher {
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
            "批次开始（并发）"
        );

        let mut slots: Vec<Option<Outcome>> = (0..total).map(|_| None).collect();
        let mut in_flight = FuturesUnordered::new();
        for req in batch.into_requests() {
            let endpoint = self.pool.for_index(req.index);
            in_flight.push(async move {
                let outcome = endpoint.invoke(&req.payload).await;
                (req.index, outcome)
            });
        }

        let mut completed = 0usize;
        while let Some((index, outcome)) = in_flight.next().await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(outcome);
            }
            completed += 1;
            if let Some(cb) = &self.on_progress {
                cb(completed, total);
            }
        }

        let replies = collect_replies(slots);
        log_batch_finished(&batch_id, &self.pool, &replies, start.elapsed());
        replies
    }
}

#[async_trait]
impl Runner for BatchDispatcher {
    async fn run(&self, batch: Batch) -> Vec<Reply> {
        BatchDispatcher::run(self, batch).await
    }

    fn pool(&self) -> &EndpointPool {
        &self.pool
    }
}
