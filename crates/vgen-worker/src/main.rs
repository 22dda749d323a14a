//! Video generation worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_media::{check_ffmpeg, FfmpegMuxer};
use vgen_providers::{
    Dispatcher, ElevenLabsProvider, ProviderRegistry, ProvidersConfig, StrategySelector,
    TextToSpeechProvider,
};
use vgen_queue::RedisQueue;
use vgen_storage::S3ObjectStore;
use vgen_store::{JobRepository, RedisStore};
use vgen_worker::{AudioPipeline, HttpDownloader, JobExecutor, WorkerConfig, WorkerContext};

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vgen=info".parse()?)
        .add_directive("aws_config=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn build_context(config: &WorkerConfig) -> anyhow::Result<WorkerContext> {
    let store = Arc::new(RedisStore::from_env().context("creating job store")?);
    store.ping().await.context("connecting to job store")?;

    let queue = RedisQueue::from_env().context("creating job queue")?;
    queue.init().await.context("initializing job queue")?;
    let backoff = queue.config().backoff_policy();

    let providers = ProvidersConfig::from_env();
    let registry = ProviderRegistry::from_config(&providers);
    if registry.backends().is_empty() {
        warn!("No generation backend has credentials; every job will fail");
    }

    let tts = ElevenLabsProvider::from_config(&providers)
        .map(|p| Arc::new(p) as Arc<dyn TextToSpeechProvider>);
    if tts.is_none() {
        warn!("ELEVENLABS_API_KEY not set, videos will be silent");
    }
    if check_ffmpeg().is_err() {
        warn!("ffmpeg not found on PATH, voice-overs will be skipped");
    }
    let muxer = Arc::new(FfmpegMuxer::new(&config.work_dir, config.ffmpeg_timeout));

    let objects = S3ObjectStore::from_env()
        .await
        .context("creating object store")?;

    let downloader = HttpDownloader::new(
        reqwest::Client::new(),
        config.download_timeout,
        config.max_download_bytes,
    );

    Ok(WorkerContext {
        jobs: JobRepository::new(store.clone()),
        videos: store.clone(),
        control: store,
        queue: Arc::new(queue),
        backoff,
        selector: StrategySelector::default(),
        dispatcher: Dispatcher::new(registry, config.provider_timeout),
        downloader: Arc::new(downloader),
        audio: AudioPipeline::new(tts, muxer, config.tts_timeout),
        objects: Arc::new(objects),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Required before any TLS client is built
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting vgen-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        vgen_worker::metrics::install_exporter(port)
            .map_err(|e| anyhow::anyhow!("metrics exporter: {}", e))?;
        info!("Serving metrics on port {}", port);
    }

    let ctx = build_context(&config).await?;
    let executor = Arc::new(JobExecutor::new(config, Arc::new(ctx)));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run().await?;
    info!("vgen-worker stopped");
    Ok(())
}
