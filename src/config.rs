use crate::client::GenerationParams;
use crate::credential::{Credential, pool_file};
use crate::endpoint::{EndpointSettings, SoftFailure};
use crate::error::{DispatchError, Result};
use figment::Figment;
use figment::providers::Env;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.deepseek.com";
const DEFAULT_API_MODEL: &str = "deepseek-chat";
const DEFAULT_NUM_PER_SECOND: u32 = 10;
const DEFAULT_RATE_WINDOW_MS: u64 = 1_000;
const DEFAULT_RETRY_MAX_ATTEMPTS: usize = 3;
const DEFAULT_TIMEOUT_MS: u64 = 180_000;
const DEFAULT_USER_AGENT: &str = "llmbatch/0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// 并发（默认）
    Async,
    /// 逐个执行
    Sync,
}

impl DispatchMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "async" | "concurrent" => Ok(Self::Async),
            "sync" | "sequential" => Ok(Self::Sync),
            other => Err(DispatchError::config(format!(
                "DISPATCH_MODE 只能是 async 或 sync，收到 {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub api_model: String,
    pub api_pool_file: String,

    pub num_per_second: u32,
    pub rate_window_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_backoff_ms: u64,

    pub timeout_ms: u64,
    pub proxy: String,
    pub api_user_agent: String,

    pub debug: String,
    pub dispatch_mode: DispatchMode,

    pub reject_empty: bool,
    pub reject_truncated: bool,

    pub generation: GenerationParams,

    /// prompts 文件；为空时从 stdin 读取。
    pub input: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    #[serde(alias = "API_KEY")]
    api_key: Option<String>,
    #[serde(alias = "API_URL")]
    api_url: Option<String>,
    #[serde(alias = "API_MODEL")]
    api_model: Option<String>,
    #[serde(alias = "API_POOL_FILE")]
    api_pool_file: Option<String>,

    #[serde(alias = "NUM_PER_SECOND")]
    num_per_second: Option<u32>,
    #[serde(alias = "RATE_WINDOW_MS")]
    rate_window_ms: Option<u64>,
    #[serde(alias = "RETRY_MAX_ATTEMPTS")]
    retry_max_attempts: Option<usize>,
    #[serde(alias = "RETRY_BACKOFF_MS")]
    retry_backoff_ms: Option<u64>,

    #[serde(alias = "TIMEOUT")]
    timeout: Option<u64>,
    #[serde(alias = "PROXY")]
    proxy: Option<String>,
    #[serde(alias = "API_USER_AGENT")]
    api_user_agent: Option<String>,

    #[serde(alias = "DEBUG")]
    debug: Option<String>,
    #[serde(alias = "DISPATCH_MODE")]
    dispatch_mode: Option<String>,

    #[serde(alias = "REJECT_EMPTY")]
    reject_empty: Option<bool>,
    #[serde(alias = "REJECT_TRUNCATED")]
    reject_truncated: Option<bool>,

    #[serde(alias = "TEMPERATURE")]
    temperature: Option<f32>,
    #[serde(alias = "TOP_P")]
    top_p: Option<f32>,
    #[serde(alias = "MAX_TOKENS")]
    max_tokens: Option<u32>,
    #[serde(alias = "PRESENCE_PENALTY")]
    presence_penalty: Option<f32>,
    #[serde(alias = "FREQUENCY_PENALTY")]
    frequency_penalty: Option<f32>,
    #[serde(alias = "REASONING_EFFORT")]
    reasoning_effort: Option<String>,
}

impl Config {
    /// 读取 `.env` + 进程环境变量 + 命令行参数。
    pub fn load() -> Result<Self> {
        load_dotenv();

        let raw = Figment::from(Env::raw())
            .extract::<RawEnv>()
            .map_err(|e| DispatchError::config(format!("解析环境变量失败: {e}")))?;

        let mut cfg = Self::from_raw(raw)?;
        cfg.apply_args(std::env::args().skip(1));
        Ok(cfg)
    }

    fn from_raw(raw: RawEnv) -> Result<Self> {
        let dispatch_mode = DispatchMode::parse(raw.dispatch_mode.as_deref().unwrap_or_default())?;
        Ok(Self {
            api_key: raw.api_key.unwrap_or_default(),
            api_url: raw.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_model: raw.api_model.unwrap_or_else(|| DEFAULT_API_MODEL.to_string()),
            api_pool_file: raw.api_pool_file.unwrap_or_default(),
            num_per_second: raw.num_per_second.unwrap_or(DEFAULT_NUM_PER_SECOND),
            rate_window_ms: raw.rate_window_ms.unwrap_or(DEFAULT_RATE_WINDOW_MS),
            retry_max_attempts: raw
                .retry_max_attempts
                .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS),
            retry_backoff_ms: raw.retry_backoff_ms.unwrap_or(0),
            timeout_ms: raw.timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
            proxy: raw.proxy.unwrap_or_default(),
            api_user_agent: raw
                .api_user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            debug: raw.debug.unwrap_or_else(|| "off".to_string()),
            dispatch_mode,
            reject_empty: raw.reject_empty.unwrap_or(false),
            reject_truncated: raw.reject_truncated.unwrap_or(false),
            generation: GenerationParams {
                temperature: raw.temperature,
                top_p: raw.top_p,
                max_tokens: raw.max_tokens,
                presence_penalty: raw.presence_penalty,
                frequency_penalty: raw.frequency_penalty,
                reasoning_effort: raw.reasoning_effort.filter(|s| !s.trim().is_empty()),
            },
            input: None,
        })
    }

    /// `-debug <level>` 覆盖 DEBUG；第一个非选项参数作为 prompts 文件。
    fn apply_args(&mut self, args: impl IntoIterator<Item = String>) {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "-debug" || arg == "--debug" {
                if let Some(v) = args.next() {
                    self.debug = v;
                }
            } else if arg == "-" {
                self.input = None;
            } else if !arg.starts_with('-') && self.input.is_none() {
                self.input = Some(PathBuf::from(arg));
            }
        }
    }

    pub fn log_level(&self) -> crate::logging::LogLevel {
        crate::logging::LogLevel::parse(&self.debug)
    }

    /// `API_POOL_FILE` 优先；否则用单组 `API_KEY`/`API_URL`/`API_MODEL`。
    pub fn credentials(&self) -> Result<Vec<Credential>> {
        let pool_file = self.api_pool_file.trim();
        if !pool_file.is_empty() {
            return pool_file::load(Path::new(pool_file));
        }
        Ok(vec![Credential::new(
            self.api_key.trim(),
            self.api_url.trim(),
            self.api_model.trim(),
        )])
    }

    pub fn soft_failure(&self) -> Option<SoftFailure> {
        let mut predicates = Vec::new();
        if self.reject_empty {
            predicates.push(SoftFailure::empty_content());
        }
        if self.reject_truncated {
            predicates.push(SoftFailure::truncated());
        }
        SoftFailure::any_of(predicates)
    }

    pub fn endpoint_settings(&self) -> Result<EndpointSettings> {
        let settings = EndpointSettings {
            rate_per_window: self.num_per_second,
            window: Duration::from_millis(self.rate_window_ms),
            max_attempts: self.retry_max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            soft_failure: self.soft_failure(),
        };
        settings.validate()?;
        if settings.rate_per_window == 0 {
            return Err(DispatchError::config("NUM_PER_SECOND 必须大于 0"));
        }
        if settings.window.is_zero() {
            return Err(DispatchError::config("RATE_WINDOW_MS 必须大于 0"));
        }
        Ok(settings)
    }
}

fn load_dotenv() {
    let Some(dotenv_path) = find_dotenv_path() else {
        return;
    };

    let Ok(content) = std::fs::read_to_string(&dotenv_path) else {
        return;
    };

    for line in content.lines() {
        let Some((key, value)) = parse_dotenv_line(line) else {
            continue;
        };
        // 已存在的进程环境变量优先。
        if std::env::var_os(&key).is_some() {
            continue;
        }
        // Rust 2024：修改进程环境变量在并发场景下可能触发 UB，因此 API 为 unsafe。
        // 这里在启动阶段加载 .env，且未并发访问环境变量，符合使用前提。
        unsafe {
            std::env::set_var(key, value);
        }
    }
}

fn find_dotenv_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let mut dir: &Path = cwd.as_path();

    loop {
        let candidate = dir.join(".env");
        if candidate.is_file() {
            return Some(candidate);
        }

        // 不跨越项目根目录：发现 Cargo.toml 或 .git 即停止向上寻找。
        if dir.join("Cargo.toml").is_file() || dir.join(".git").is_dir() {
            return None;
        }

        let parent = dir.parent()?;
        if parent == dir {
            return None;
        }
        dir = parent;
    }
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let mut line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if let Some(rest) = line.strip_prefix("export ") {
        line = rest.trim_start();
    }

    let (key, raw) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let raw = raw.trim();
    for quote in ['"', '\''] {
        if raw.len() >= 2
            && let Some(inner) = raw
                .strip_prefix(quote)
                .and_then(|r| r.strip_suffix(quote))
        {
            return Some((key.to_string(), inner.to_string()));
        }
    }

    Some((key.to_string(), strip_inline_comment(raw).trim().to_string()))
}

/// 只把前面是空白的 `#` 视为注释，避免截断 URL 片段。
fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] != b'#' {
            continue;
        }
        if i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t' {
            return value[..i].trim_end();
        }
    }
    value
}
