use serde::{Deserialize, Serialize};
use std::fmt;

/// 一组上游凭证：API Key + Base URL + 模型名。
///
/// 构造 Endpoint 后不再修改；`Debug` 与日志中只出现脱敏后的 key。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub api_key: String,
    #[serde(alias = "api_url", alias = "url")]
    pub base_url: String,
    #[serde(alias = "api_model")]
    pub model: String,
}

impl Credential {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.trim().trim_end_matches('/')
        )
    }

    /// 形如 `sk-a***wxyz`；过短的 key 整体隐藏。
    pub fn masked_key(&self) -> String {
        mask_secret(&self.api_key)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &self.masked_key())
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

pub fn mask_secret(secret: &str) -> String {
    const KEEP: usize = 4;
    let secret = secret.trim();
    if secret.is_empty() {
        return "-".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= KEEP * 2 + 2 {
        return "***".to_string();
    }
    let head: String = chars[..KEEP].iter().collect();
    let tail: String = chars[chars.len() - KEEP..].iter().collect();
    format!("{head}***{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_completions_url_tolerates_trailing_slash() {
        let a = Credential::new("k", "https://api.deepseek.com/", "deepseek-chat");
        let b = Credential::new("k", "https://api.deepseek.com", "deepseek-chat");
        assert_eq!(
            a.chat_completions_url(),
            "https://api.deepseek.com/chat/completions"
        );
        assert_eq!(a.chat_completions_url(), b.chat_completions_url());
    }

    #[test]
    fn debug_output_never_contains_full_key() {
        let c = Credential::new("sk-1234567890abcdef", "https://x/v1", "m");
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-1234567890abcdef"));
        assert!(dbg.contains("sk-1***cdef"));
    }

    #[test]
    fn short_and_empty_keys_are_fully_hidden() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("  "), "-");
    }
}
