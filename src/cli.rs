//! 命令行前端的输入输出：逐行读取 prompts，逐行输出 JSON 结果。

use crate::dispatch::Reply;
use crate::endpoint::Outcome;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// 从文件或 stdin 读取 prompts。
pub async fn read_prompts(input: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let text = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("读取 {} 失败", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("读取 stdin 失败")?;
            buf
        }
    };
    Ok(parse_prompts(&text))
}

pub fn parse_prompts(text: &str) -> Vec<String> {
    text.lines().filter_map(parse_prompt_line).collect()
}

/// 一行一个 prompt；整行是 JSON 字符串字面量时按 JSON 解码（可表达多行 prompt）。空行跳过。
pub fn parse_prompt_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() >= 2
        && trimmed.starts_with('"')
        && trimmed.ends_with('"')
        && let Ok(decoded) = sonic_rs::from_str::<String>(trimmed)
    {
        return Some(decoded);
    }
    Some(line.trim_end_matches('\r').to_string())
}

#[derive(Debug, Serialize)]
struct ReplyLine<'a> {
    index: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_tokens: Option<u64>,
}

pub fn reply_line(reply: &Reply) -> Result<String, sonic_rs::Error> {
    let line = match &reply.outcome {
        Outcome::Success(c) => ReplyLine {
            index: reply.index,
            status: "success",
            content: Some(&c.content),
            finish_reason: c.finish_reason.as_deref(),
            total_tokens: c.total_tokens,
        },
        Outcome::Failed => ReplyLine {
            index: reply.index,
            status: "failed",
            content: None,
            finish_reason: None,
            total_tokens: None,
        },
    };
    sonic_rs::to_string(&line)
}
