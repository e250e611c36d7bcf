//! OpenAI 兼容的 chat completions 后端（DeepSeek、各类中转站等）。

use crate::client::types::{ChatRequest, ChatResponse, Completion, GenerationParams};
use crate::client::{ApiError, ChatBackend};
use crate::config::Config;
use crate::credential::Credential;
use crate::logging::{self, LogLevel};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use sonic_rs::JsonValueTrait;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    http: reqwest::Client,
    user_agent: String,
    log_level: LogLevel,
    params: GenerationParams,
}

impl OpenAiBackend {
    pub fn new(cfg: &Config) -> Result<Self, anyhow::Error> {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90));

        // TIMEOUT=0 表示不设置超时，完全交给上游。
        if cfg.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(cfg.timeout_ms));
        }
        if !cfg.proxy.trim().is_empty() {
            builder = builder.proxy(reqwest::Proxy::all(cfg.proxy.trim())?);
        }

        Ok(Self::with_client(
            builder.build()?,
            cfg.api_user_agent.clone(),
            cfg.log_level(),
            cfg.generation.clone(),
        ))
    }

    pub fn with_client(
        http: reqwest::Client,
        user_agent: String,
        log_level: LogLevel,
        params: GenerationParams,
    ) -> Self {
        Self {
            http,
            user_agent,
            log_level,
            params,
        }
    }
}

fn build_headers(user_agent: &str, api_key: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).unwrap_or(HeaderValue::from_static("llmbatch")),
    );
    // 本地推理服务（如 Ollama）可以不带 key。
    if !api_key.trim().is_empty()
        && let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
    {
        h.insert(AUTHORIZATION, v);
    }
    h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    h.insert(
        reqwest::header::ACCEPT_ENCODING,
        HeaderValue::from_static("gzip"),
    );
    h
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(
        &self,
        credential: &Credential,
        payload: &str,
    ) -> Result<Completion, ApiError> {
        let url = credential.chat_completions_url();
        let body = sonic_rs::to_vec(&ChatRequest::user(&credential.model, payload, &self.params))?;
        let headers = build_headers(&self.user_agent, &credential.api_key);

        if self.log_level.raw_enabled() {
            logging::backend_request_raw("POST", &url, &headers, &body);
        } else if self.log_level.backend_enabled() {
            logging::backend_request("POST", &url, &headers, &body);
        }

        let start = Instant::now();
        let resp = self
            .http
            .post(url.as_str())
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if self.log_level.raw_enabled() {
            logging::backend_response_raw(status.as_u16(), start.elapsed(), &bytes);
        } else if self.log_level.backend_enabled() {
            logging::backend_response(status.as_u16(), start.elapsed(), &bytes);
        } else if self.log_level.summary_enabled() {
            logging::backend_summary(
                &credential.masked_key(),
                &credential.model,
                status.as_u16(),
                start.elapsed(),
            );
        }

        if !status.is_success() {
            return Err(extract_error_details(status.as_u16(), &bytes));
        }
        sonic_rs::from_slice::<ChatResponse>(&bytes)?.into_completion()
    }
}

/// 兼容几种常见错误体：`{"error": {"message"}}`、`{"error": "..."}`、`{"message": "..."}`。
fn extract_error_details(status: u16, body: &[u8]) -> ApiError {
    let message = sonic_rs::from_slice::<sonic_rs::Value>(body)
        .ok()
        .and_then(|v| {
            let from_error = v.get("error").and_then(|e| {
                e.as_str()
                    .map(str::to_string)
                    .or_else(|| e.get("message").and_then(|m| m.as_str()).map(str::to_string))
            });
            from_error.or_else(|| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                "Unknown error".to_string()
            } else {
                logging::truncate_text_for_log(text)
            }
        });

    ApiError::Http { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_error_details_reads_openai_error_object() {
        let body = r#"{
            "error": {
                "message": "Rate limit reached for requests",
                "type": "requests",
                "code": "rate_limit_exceeded"
            }
        }"#;
        let err = extract_error_details(429, body.as_bytes());
        assert_eq!(err.status(), Some(429));
        assert!(err.to_string().contains("Rate limit reached"));
    }

    #[test]
    fn extract_error_details_accepts_flat_shapes() {
        let err = extract_error_details(401, br#"{"error": "invalid api key"}"#);
        assert!(err.to_string().contains("invalid api key"));

        let err = extract_error_details(400, br#"{"message": "bad model"}"#);
        assert!(err.to_string().contains("bad model"));
    }

    #[test]
    fn extract_error_details_falls_back_to_body_text() {
        let err = extract_error_details(502, b"<html>Bad Gateway</html>");
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("Bad Gateway"));

        let err = extract_error_details(503, b"");
        assert!(err.to_string().contains("Unknown error"));
    }

    #[test]
    fn headers_skip_authorization_for_keyless_endpoints() {
        assert!(!build_headers("llmbatch-test", "").contains_key(AUTHORIZATION));
        let h = build_headers("llmbatch-test", " sk-x ");
        assert_eq!(h[AUTHORIZATION].to_str().unwrap(), "Bearer sk-x");
        assert_eq!(h[USER_AGENT].to_str().unwrap(), "llmbatch-test");
    }
}
