use crate::client::ApiError;
use serde::{Deserialize, Serialize};

/// 一次成功调用的结果：文本内容 + 可选的用量信息。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub finish_reason: Option<String>,
    pub total_tokens: Option<u64>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// 生成参数；未设置的字段不会出现在请求体里。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: [ChatMessage<'a>; 1],
    pub stream: bool,
    #[serde(flatten)]
    pub params: &'a GenerationParams,
}

impl<'a> ChatRequest<'a> {
    pub fn user(model: &'a str, content: &'a str, params: &'a GenerationParams) -> Self {
        Self {
            model,
            messages: [ChatMessage {
                role: "user",
                content,
            }],
            stream: false,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

impl ChatResponse {
    /// 取第一个 choice。`content` 为 null 时视为空串，交由 soft failure 判定。
    pub fn into_completion(self) -> Result<Completion, ApiError> {
        let total_tokens = self.usage.and_then(|u| u.total_tokens);
        let Some(choice) = self.choices.into_iter().next() else {
            return Err(ApiError::Malformed("响应中没有 choices".to_string()));
        };
        let content = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();
        Ok(Completion {
            content,
            finish_reason: choice.finish_reason,
            total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_omits_unset_params() {
        let params = GenerationParams {
            temperature: Some(0.5),
            max_tokens: Some(256),
            ..GenerationParams::default()
        };
        let req = ChatRequest::user("deepseek-chat", "Hello", &params);
        let body = sonic_rs::to_string(&req).unwrap();

        assert!(body.contains(r#""model":"deepseek-chat""#));
        assert!(body.contains(r#""role":"user""#));
        assert!(body.contains(r#""stream":false"#));
        assert!(body.contains(r#""max_tokens":256"#));
        assert!(body.contains("temperature"));
        assert!(!body.contains("top_p"));
        assert!(!body.contains("reasoning_effort"));
    }

    #[test]
    fn into_completion_reads_first_choice_and_usage() {
        let body = r#"{
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "other"}}
            ],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        }"#;
        let resp: ChatResponse = sonic_rs::from_str(body).unwrap();
        let c = resp.into_completion().unwrap();
        assert_eq!(c.content, "hi");
        assert_eq!(c.finish_reason.as_deref(), Some("stop"));
        assert_eq!(c.total_tokens, Some(4));
    }

    #[test]
    fn into_completion_treats_null_content_as_empty() {
        let body = r#"{"choices": [{"message": {"content": null}, "finish_reason": "length"}]}"#;
        let resp: ChatResponse = sonic_rs::from_str(body).unwrap();
        let c = resp.into_completion().unwrap();
        assert_eq!(c.content, "");
        assert_eq!(c.finish_reason.as_deref(), Some("length"));
    }

    #[test]
    fn into_completion_rejects_missing_choices() {
        let resp: ChatResponse = sonic_rs::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(resp.into_completion(), Err(ApiError::Malformed(_))));
    }
}
