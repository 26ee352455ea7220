//! # Pipeline Demo
//!
//! Builds a three-stage pipeline (parse, score, format) from pool settings,
//! pushes a batch of lines through it and prints each stage's statistics as
//! JSON while it runs.
//!
//! ```bash
//! pipeline-demo [settings.toml]
//! STAGEPOOL_MAX_WORKERS=8 pipeline-demo
//! ```

use anyhow::{Context as _, Result};
use stagepool::prelude::*;
use stagepool::{PoolSettings, Stat};
use std::time::Duration;
use tracing::info;

const LINES: usize = 200;

#[tokio::main]
async fn main() -> Result<()> {
    stagepool::logging::init_structured_logging();

    let settings_path = std::env::args().nth(1);
    let settings = PoolSettings::load(settings_path.as_deref())
        .context("Failed to load pool settings")?;
    info!(settings = ?settings, "🚀 DEMO: Building pipeline");

    let stage_config = |name: &str| -> Result<PoolConfig> {
        let mut config = settings.clone().into_config()?;
        config.name = Some(name.to_string());
        Ok(config)
    };

    let parse: Pool<String, u64> = Pool::new(
        stage_config("parse")?,
        handler_fn(|_ctx: &Context, err: Option<StageError>, line: Option<String>| {
            if let Some(err) = err {
                return Err(err);
            }
            line.map(|l| l.trim().parse::<u64>().map_err(stage_error))
                .transpose()
        }),
    )?;

    let score: Pool<u64, u64> = parse.next(Pool::new(
        stage_config("score")?,
        async_handler_fn(|_ctx: Context, err: Option<StageError>, n: Option<u64>| async move {
            if let Some(err) = err {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(n.map(|n| n * n % 1_000))
        }),
    )?);

    let format: Pool<u64, String> = score.next(Pool::new(
        stage_config("format")?,
        handler_fn(|ctx: &Context, err: Option<StageError>, n: Option<u64>| match err {
            Some(err) => Err(err),
            None => Ok(n.map(|n| format!("{} -> {n}", ctx.request_id()))),
        }),
    )?);

    let (mut results, _results_sink) = receive(&format)?;
    let (mut errors, _errors_sink) = receive_errors(&format)?;

    let producer = {
        let parse = parse.clone();
        tokio::spawn(async move {
            for i in 0..LINES {
                let line = if i % 25 == 0 {
                    format!("line-{i}")
                } else {
                    i.to_string()
                };
                parse.data(Context::new(), line).await;
            }
        })
    };

    let reporter = {
        let stages = [
            (parse.name().to_string(), parse.sampler()),
            (score.name().to_string(), score.sampler()),
            (format.name().to_string(), format.sampler()),
        ];
        let parse = parse.clone();
        tokio::spawn(async move {
            let mut stages = stages;
            let mut ticker = tokio::time::interval(Duration::from_millis(250));
            while !parse.is_closed() {
                ticker.tick().await;
                for (name, sampler) in stages.iter_mut() {
                    print_stat(name, &sampler.sample());
                }
            }
        })
    };

    let consumer = tokio::spawn(async move {
        let mut delivered = 0usize;
        let mut failed = 0usize;
        loop {
            tokio::select! {
                Some(_) = results.recv() => delivered += 1,
                Some(err) = errors.recv() => {
                    failed += 1;
                    info!(error = %err, "DEMO: Pipeline error");
                }
                else => break,
            }
        }
        (delivered, failed)
    });

    producer.await.context("Producer task failed")?;

    // Each stage drains before the next one is told to stop
    parse.shutdown().await;
    score.shutdown().await;
    format.shutdown().await;
    reporter.await.context("Reporter task failed")?;

    let (delivered, failed) = consumer.await.context("Consumer task failed")?;
    info!(delivered, failed, "✅ DEMO: Pipeline drained");
    print_stat(format.name(), &format.stats());
    Ok(())
}

fn print_stat(stage: &str, stat: &Stat) {
    match serde_json::to_string(stat) {
        Ok(json) => println!("{{\"stage\":\"{stage}\",\"stat\":{json}}}"),
        Err(e) => tracing::warn!(error = %e, "DEMO: Could not serialize stats"),
    }
}
