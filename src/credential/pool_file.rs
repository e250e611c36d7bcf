//! 多凭证配置文件（`API_POOL_FILE`）的读取与校验。
//!
//! 文件内容为 JSON 数组，元素可以是对象 `{"api_key", "base_url", "model"}`，
//! 也可以是三元组 `["key", "url", "model"]`。

use crate::credential::types::Credential;
use crate::error::{DispatchError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoolEntry {
    Object(Credential),
    Triple(String, String, String),
}

impl From<PoolEntry> for Credential {
    fn from(entry: PoolEntry) -> Self {
        match entry {
            PoolEntry::Object(c) => c,
            PoolEntry::Triple(api_key, base_url, model) => Credential::new(api_key, base_url, model),
        }
    }
}

pub fn load(path: &Path) -> Result<Vec<Credential>> {
    let data = std::fs::read(path).map_err(|e| {
        DispatchError::config(format!("读取凭证池文件 {} 失败: {e}", path.display()))
    })?;
    parse(&data).map_err(|e| match e {
        DispatchError::Config(msg) => {
            DispatchError::config(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

pub fn parse(data: &[u8]) -> Result<Vec<Credential>> {
    let entries: Vec<PoolEntry> = sonic_rs::from_slice(data)
        .map_err(|e| DispatchError::config(format!("解析凭证池失败: {e}")))?;

    let mut out = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let c = Credential::from(entry);
        if c.base_url.trim().is_empty() {
            return Err(DispatchError::config(format!("凭证池第 {i} 项缺少 base_url")));
        }
        if c.model.trim().is_empty() {
            return Err(DispatchError::config(format!("凭证池第 {i} 项缺少 model")));
        }
        out.push(c);
    }

    if out.is_empty() {
        return Err(DispatchError::config("凭证池为空"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_objects_and_triples() {
        let body = r#"[
            {"api_key": "k0", "base_url": "https://a/v1", "model": "m0"},
            ["k1", "https://b/v1", "m1"],
            {"api_key": "k2", "api_url": "https://c/v1", "api_model": "m2"}
        ]"#;
        let pool = parse(body.as_bytes()).unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool[1], Credential::new("k1", "https://b/v1", "m1"));
        assert_eq!(pool[2].base_url, "https://c/v1");
        assert_eq!(pool[2].model, "m2");
    }

    #[test]
    fn empty_pool_is_a_config_error() {
        assert!(matches!(parse(b"[]"), Err(DispatchError::Config(_))));
    }

    #[test]
    fn missing_model_is_a_config_error() {
        let body = r#"[{"api_key": "k", "base_url": "https://a/v1", "model": " "}]"#;
        let err = parse(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("model"));
    }
}
