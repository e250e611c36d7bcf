use reqwest::header::HeaderMap;
use std::time::Duration;

/// 远端调用的日志等级：
/// - off：不输出单次调用的信息
/// - low：每次调用一行摘要（endpoint、状态码、耗时）
/// - medium：输出后端请求/响应（格式化、脱敏、超长截断）
/// - high：输出后端请求/响应原文（仅 Authorization 脱敏）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl LogLevel {
    pub fn parse(debug: &str) -> Self {
        match debug.trim().to_lowercase().as_str() {
            "low" | "summary" => Self::Low,
            "medium" | "backend" => Self::Medium,
            "high" | "all" | "raw" => Self::High,
            _ => Self::Off,
        }
    }

    pub fn summary_enabled(self) -> bool {
        self >= Self::Low
    }

    pub fn backend_enabled(self) -> bool {
        self >= Self::Medium
    }

    pub fn raw_enabled(self) -> bool {
        self >= Self::High
    }
}

pub fn format_duration_ms(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

pub fn backend_summary(endpoint: &str, model: &str, status: u16, duration: Duration) {
    tracing::info!(
        endpoint,
        model,
        status,
        elapsed_ms = format_duration_ms(duration),
        "后端调用完成"
    );
}

pub fn backend_request(method: &str, url: &str, headers: &HeaderMap, body: &[u8]) {
    tracing::info!(
        "\n====================== 后端请求 ========================\n[后端请求] {method} {url}\n[后端请求头]\n{}\n{}\n==========================================================",
        format_headers(headers),
        format_body_bytes(body)
    );
}

pub fn backend_request_raw(method: &str, url: &str, headers: &HeaderMap, body: &[u8]) {
    tracing::info!(
        "\n=================== 后端请求（RAW） ===================\n[后端请求] {method} {url}\n[后端请求头]\n{}\n[后端请求体]\n{}\n=========================================================",
        format_headers_raw(headers),
        format_bytes_raw(body),
    );
}

pub fn backend_response(status: u16, duration: Duration, body: &[u8]) {
    tracing::info!(
        "\n====================== 后端响应 ========================\n[后端响应] {} {}ms\n{}\n==========================================================",
        status,
        format_duration_ms(duration),
        format_body_bytes(body)
    );
}

pub fn backend_response_raw(status: u16, duration: Duration, body: &[u8]) {
    tracing::info!(
        "\n=================== 后端响应（RAW） ===================\n[后端响应] {} {}ms\n{}\n=========================================================",
        status,
        format_duration_ms(duration),
        format_bytes_raw(body),
    );
}

fn is_secret_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("authorization")
        || name.eq_ignore_ascii_case("proxy-authorization")
        || name.eq_ignore_ascii_case("x-api-key")
}

fn format_headers(headers: &HeaderMap) -> String {
    let mut obj = sonic_rs::Object::new();

    for (name, value) in headers.iter() {
        let key = name.as_str();
        let v = if is_secret_header(key) {
            sonic_rs::Value::from("Bearer ***")
        } else {
            match value.to_str() {
                Ok(s) => sonic_rs::Value::from(s),
                Err(_) => sonic_rs::Value::from("<binary>"),
            }
        };
        obj.insert(key, v);
    }

    format_body_value(&obj.into_value())
}

fn format_body_value(v: &sonic_rs::Value) -> String {
    match sonic_rs::to_string_pretty(v) {
        Ok(s) => truncate_text_for_log(&s),
        Err(_) => truncate_text_for_log(&v.to_string()),
    }
}

fn format_body_bytes(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    // 大包不做 JSON 解析，只保留首尾。
    const MAX_PARSE_BYTES: usize = 2 * 1024 * 1024;
    const HEAD_TAIL: usize = 16 * 1024;

    if bytes.len() > MAX_PARSE_BYTES {
        let head_len = bytes.len().min(HEAD_TAIL);
        let tail_len = bytes.len().saturating_sub(head_len).min(HEAD_TAIL);
        let head = String::from_utf8_lossy(&bytes[..head_len]);
        let tail = String::from_utf8_lossy(&bytes[bytes.len() - tail_len..]);
        return format!(
            "(body too large: {} bytes, showing head/tail)\n--- head ---\n{}\n--- tail ---\n{}",
            bytes.len(),
            head,
            tail
        );
    }

    match sonic_rs::from_slice::<sonic_rs::Value>(bytes) {
        Ok(v) => format_body_value(&v),
        Err(_) => truncate_text_for_log(&String::from_utf8_lossy(bytes)),
    }
}

fn format_headers_raw(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers.iter() {
        let key = name.as_str();
        let val = if is_secret_header(key) {
            "***"
        } else {
            value.to_str().unwrap_or("<non-utf8>")
        };
        out.push_str(key);
        out.push_str(": ");
        out.push_str(val);
        out.push('\n');
    }
    out
}

fn format_bytes_raw(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn truncate_text_for_log(s: &str) -> String {
    const MAX_CHARS: usize = 32 * 1024;
    truncate_chars(s, MAX_CHARS)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + 16);
            out.push_str(&s[..cut]);
            out.push_str("...[TRUNCATED]");
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};

    #[test]
    fn parse_levels() {
        assert_eq!(LogLevel::parse("LOW"), LogLevel::Low);
        assert_eq!(LogLevel::parse(" medium "), LogLevel::Medium);
        assert_eq!(LogLevel::parse("raw"), LogLevel::High);
        assert_eq!(LogLevel::parse("whatever"), LogLevel::Off);
        assert!(LogLevel::High.backend_enabled());
        assert!(!LogLevel::Low.backend_enabled());
    }

    #[test]
    fn headers_never_leak_authorization() {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk-secret"));
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let formatted = format_headers(&h);
        let raw = format_headers_raw(&h);
        assert!(!formatted.contains("sk-secret"));
        assert!(!raw.contains("sk-secret"));
        assert!(raw.contains("content-type: application/json"));
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("你好世界", 10), "你好世界");
        assert_eq!(truncate_chars("你好世界", 2), "你好...[TRUNCATED]");
    }
}
