#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use llmbatch::config::{Config, DispatchMode};
use llmbatch::{
    Batch, BatchDispatcher, ChatBackend, EndpointPool, OpenAiBackend, ProgressFn, Runner,
    SyncRunner, cli,
};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("加载配置失败")?;

    init_tracing();

    let prompts = cli::read_prompts(cfg.input.as_deref()).await?;
    let batch = Batch::from_prompts(prompts);

    let backend: Arc<dyn ChatBackend> =
        Arc::new(OpenAiBackend::new(&cfg).context("初始化 HTTP 客户端失败")?);
    let settings = cfg.endpoint_settings()?;
    let pool = Arc::new(EndpointPool::from_credentials(
        cfg.credentials()?,
        backend,
        &settings,
    )?);
    tracing::info!(
        "共 {} 条 prompt，{} 组凭证，每组限速 {}/{}ms，最多尝试 {} 次",
        batch.len(),
        pool.size(),
        settings.rate_per_window,
        settings.window.as_millis(),
        settings.max_attempts
    );

    let bar = progress_bar(batch.len());
    let progress: ProgressFn = {
        let bar = bar.clone();
        Arc::new(move |done, _total| bar.set_position(done as u64))
    };
    let runner: Box<dyn Runner> = match cfg.dispatch_mode {
        DispatchMode::Async => Box::new(BatchDispatcher::new(pool.clone()).with_progress(progress)),
        DispatchMode::Sync => Box::new(SyncRunner::new(pool.clone()).with_progress(progress)),
    };

    let replies = runner.run(batch).await;
    bar.finish_and_clear();

    let mut out = String::new();
    for r in &replies {
        out.push_str(&cli::reply_line(r).context("序列化结果失败")?);
        out.push('\n');
    }
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(out.as_bytes())
        .await
        .context("写出结果失败")?;
    stdout.flush().await.context("写出结果失败")?;

    let failed = replies.iter().filter(|r| !r.outcome.is_success()).count();
    if failed > 0 {
        tracing::warn!("{failed}/{} 条请求最终失败", replies.len());
    }
    for s in runner.pool().stats() {
        tracing::info!(
            endpoint = %s.endpoint,
            model = %s.model,
            "成功 {}，失败 {}",
            s.success,
            s.failure
        );
    }

    Ok(())
}

fn init_tracing() {
    // 依赖库日志默认压到 warn，本项目日志至少 info；日志写 stderr，stdout 只留结果。
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let env = env.trim();
    let filter = if env.is_empty() {
        EnvFilter::new("warn,llmbatch=info")
    } else if env.contains("llmbatch") {
        EnvFilter::new(env)
    } else {
        EnvFilter::new(format!("{env},llmbatch=info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, eta {eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}
