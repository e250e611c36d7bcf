//! Endpoint 池：批次内第 i 个请求落到 `i mod size`，与池子之前跑过多少批无关。

use crate::client::ChatBackend;
use crate::credential::Credential;
use crate::endpoint::{Endpoint, EndpointSettings, EndpointStats};
use crate::error::{DispatchError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<Arc<Endpoint>>,
    cursor: AtomicUsize,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(DispatchError::config("Endpoint 池为空：至少需要一组凭证"));
        }
        Ok(Self {
            endpoints: endpoints.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
        })
    }

    /// 每组凭证构造一个 Endpoint（各自独立的限速器与计数器），共享同一个后端。
    pub fn from_credentials(
        credentials: impl IntoIterator<Item = Credential>,
        backend: Arc<dyn ChatBackend>,
        settings: &EndpointSettings,
    ) -> Result<Self> {
        let endpoints = credentials
            .into_iter()
            .map(|c| Endpoint::new(c, backend.clone(), settings))
            .collect::<Result<Vec<_>>>()?;
        Self::new(endpoints)
    }

    /// 批次内位置 `index` 对应的 Endpoint（`index mod size`）。调度器按它分配。
    pub fn for_index(&self, index: usize) -> Arc<Endpoint> {
        self.endpoints[index % self.endpoints.len()].clone()
    }

    /// 池级游标轮询：返回游标处的 Endpoint 并推进游标，跨批次、跨调用方持续累加。
    pub fn next(&self) -> Arc<Endpoint> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        self.endpoints[i].clone()
    }

    pub fn size(&self) -> usize {
        self.endpoints.len()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Endpoint>> {
        self.endpoints.get(index)
    }

    pub fn stats(&self) -> Vec<EndpointStats> {
        self.endpoints.iter().map(|e| e.stats()).collect()
    }
}
