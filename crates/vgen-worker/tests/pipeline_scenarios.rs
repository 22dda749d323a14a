//! End-to-end job scenarios on the in-memory store and queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vgen_media::{MediaError, MediaResult, Muxer};
use vgen_models::{
    Backend, Job, JobId, JobSettings, JobStatus, Video, VideoId, VideoStyle, VoiceSelection,
    CANCELLED_MESSAGE, EXHAUSTED_MESSAGE,
};
use vgen_providers::{
    Dispatcher, GenerationError, GenerationOutput, GenerationRequest, GenerationResult,
    ProviderRegistry, StrategySelector, TextToSpeechProvider, TtsError, VideoGenerationProvider,
};
use vgen_queue::{BackoffPolicy, Delivery, DurableQueue, MemoryQueue};
use vgen_storage::MemoryObjectStore;
use vgen_store::{
    JobRepository, JobService, MemoryCatalog, MemoryStore, ProductSnapshot, StoreResult,
    SubmitJobRequest, VideoInsert, VideoStore,
};
use vgen_worker::{
    AudioPipeline, DeliveryOutcome, JobExecutor, MediaDownloader, WorkerConfig, WorkerContext,
    WorkerError, WorkerResult,
};

const PROJECT: &str = "proj-1";
const PRODUCT: &str = "prod-1";

struct ScriptedProvider {
    backend: Backend,
    results: Mutex<VecDeque<GenerationResult<GenerationOutput>>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedProvider {
    fn new(backend: Backend, delay: Duration) -> Self {
        Self {
            backend,
            results: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn push(&self, result: GenerationResult<GenerationOutput>) {
        self.results.lock().unwrap().push_back(result);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoGenerationProvider for ScriptedProvider {
    fn backend(&self) -> Backend {
        self.backend
    }

    async fn generate(&self, _request: &GenerationRequest) -> GenerationResult<GenerationOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        let scripted = self.results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(GenerationOutput {
                media_url: format!("https://provider.example.com/{}.mp4", n),
                external_id: format!("gen-{}", n),
            })
        })
    }
}

struct FakeTts {
    fail: bool,
}

#[async_trait]
impl TextToSpeechProvider for FakeTts {
    async fn synthesize(&self, _text: &str, _voice: &VoiceSelection) -> Result<Vec<u8>, TtsError> {
        if self.fail {
            Err(TtsError::Request("connection reset".into()))
        } else {
            Ok(b"speech".to_vec())
        }
    }
}

struct FakeMuxer;

#[async_trait]
impl Muxer for FakeMuxer {
    async fn duration(&self, _video: &[u8]) -> MediaResult<f64> {
        Ok(15.0)
    }

    async fn mux(&self, video: &[u8], audio: &[u8]) -> MediaResult<Vec<u8>> {
        if audio.is_empty() {
            return Err(MediaError::invalid_media("empty audio"));
        }
        Ok([video, b"+".as_slice(), audio].concat())
    }
}

/// Serves fixed bytes, after failing transiently `failures` times.
struct FakeDownloader {
    failures: AtomicUsize,
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn download(&self, _url: &str) -> WorkerResult<Vec<u8>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(WorkerError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        Ok(b"video".to_vec())
    }
}

/// Cancels the job once, right after its first Video row lands.
struct CancelAfterFirstInsert {
    inner: Arc<MemoryStore>,
    jobs: JobRepository,
    armed: AtomicBool,
}

#[async_trait]
impl VideoStore for CancelAfterFirstInsert {
    async fn insert_if_absent(&self, video: Video) -> StoreResult<VideoInsert> {
        let job_id = video.job_ref.clone();
        let inserted = self.inner.insert_if_absent(video).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.jobs.cancel(&job_id).await?;
        }
        Ok(inserted)
    }

    async fn get_by_job(&self, job_id: &JobId) -> StoreResult<Option<Video>> {
        self.inner.get_by_job(job_id).await
    }

    async fn remove(&self, job_id: &JobId, video_id: &VideoId) -> StoreResult<bool> {
        self.inner.remove(job_id, video_id).await
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    objects: MemoryObjectStore,
    provider: Arc<ScriptedProvider>,
    service: JobService,
    ctx: Arc<WorkerContext>,
}

struct Options {
    tts: Option<FakeTts>,
    download_failures: usize,
    provider_delay: Duration,
    max_attempts: u32,
    cancel_after_first_insert: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tts: Some(FakeTts { fail: false }),
            download_failures: 0,
            provider_delay: Duration::ZERO,
            max_attempts: 3,
            cancel_after_first_insert: false,
        }
    }
}

async fn harness(options: Options) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let objects = MemoryObjectStore::new();
    let provider = Arc::new(ScriptedProvider::new(Backend::Luma, options.provider_delay));

    let catalog = Arc::new(MemoryCatalog::new());
    catalog
        .upsert(ProductSnapshot {
            product_ref: PRODUCT.into(),
            project_ref: PROJECT.into(),
            title: "Beard Oil".into(),
            description: "Keeps your beard soft".into(),
            images: vec!["https://cdn.example.com/oil.jpg".into()],
        })
        .await;

    let jobs = JobRepository::new(store.clone());
    let service = JobService::new(jobs.clone(), queue.clone(), catalog);

    let registry = ProviderRegistry::new().with(provider.clone());
    let tts = options
        .tts
        .map(|t| Arc::new(t) as Arc<dyn TextToSpeechProvider>);

    let videos: Arc<dyn VideoStore> = if options.cancel_after_first_insert {
        Arc::new(CancelAfterFirstInsert {
            inner: store.clone(),
            jobs: jobs.clone(),
            armed: AtomicBool::new(true),
        })
    } else {
        store.clone()
    };

    let ctx = Arc::new(WorkerContext {
        jobs,
        videos,
        control: store.clone(),
        queue: queue.clone(),
        backoff: BackoffPolicy::new(
            options.max_attempts,
            Duration::from_millis(10),
            Duration::from_millis(50),
        ),
        selector: StrategySelector::default(),
        dispatcher: Dispatcher::new(registry, Duration::from_secs(5)),
        downloader: Arc::new(FakeDownloader {
            failures: AtomicUsize::new(options.download_failures),
        }),
        audio: AudioPipeline::new(tts, Arc::new(FakeMuxer), Duration::from_secs(5)),
        objects: Arc::new(objects.clone()),
    });

    Harness {
        store,
        queue,
        objects,
        provider,
        service,
        ctx,
    }
}

impl Harness {
    fn executor(&self) -> JobExecutor {
        JobExecutor::new(WorkerConfig::default(), Arc::clone(&self.ctx))
    }

    async fn submit(&self, style: VideoStyle) -> JobId {
        self.service
            .submit(SubmitJobRequest {
                product_ref: PRODUCT.into(),
                project_ref: PROJECT.into(),
                style,
                model_preference: None,
                settings: JobSettings::default(),
            })
            .await
            .unwrap()
    }

    async fn next_delivery(&self, consumer: &str) -> Delivery {
        let mut deliveries = self
            .queue
            .dequeue(consumer, Duration::from_millis(500), 1)
            .await
            .unwrap();
        assert_eq!(deliveries.len(), 1, "expected one delivery");
        deliveries.remove(0)
    }

    async fn job(&self, id: &JobId) -> Job {
        self.ctx.jobs.require(id).await.unwrap()
    }

    /// COMPLETED jobs have a result and exactly one Video; FAILED jobs have a message.
    async fn assert_invariants(&self, id: &JobId) {
        let job = self.job(id).await;
        match job.status {
            JobStatus::Completed => {
                let video = self.store.get_by_job(id).await.unwrap().unwrap();
                assert_eq!(job.result_ref.as_deref(), Some(video.media_ref.as_str()));
                assert_eq!(self.store.video_count(id).await, 1);
            }
            JobStatus::Failed => assert!(job.error_message.is_some()),
            _ => {}
        }
    }
}

#[tokio::test]
async fn rotation_job_completes_without_audio() {
    let h = harness(Options::default()).await;
    let id = h.submit(VideoStyle::Rotation).await;

    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Completed);

    let job = h.job(&id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.cost_cents, 200);

    let video = h.store.get_by_job(&id).await.unwrap().unwrap();
    assert!(!video.metadata.has_audio);
    assert!(video.metadata.voice.is_none());
    assert_eq!(video.metadata.backend, Backend::Luma);
    assert_eq!(h.objects.get(&video.storage_key).await.unwrap(), b"video");
    assert_eq!(h.provider.calls(), 1);
    h.assert_invariants(&id).await;
}

#[tokio::test]
async fn testimonial_job_gets_voice_over() {
    let h = harness(Options::default()).await;
    let id = h.submit(VideoStyle::Testimonial).await;

    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Completed);

    let job = h.job(&id).await;
    assert_eq!(job.cost_cents, 205);
    let video = h.store.get_by_job(&id).await.unwrap().unwrap();
    assert!(video.metadata.has_audio);
    assert_eq!(
        video.metadata.voice.as_ref().map(|v| v.gender),
        Some(vgen_models::VoiceGender::Male)
    );
    assert_eq!(
        h.objects.get(&video.storage_key).await.unwrap(),
        b"video+speech"
    );
}

#[tokio::test]
async fn tts_failure_still_completes_silently() {
    let h = harness(Options {
        tts: Some(FakeTts { fail: true }),
        ..Options::default()
    })
    .await;
    let id = h.submit(VideoStyle::Testimonial).await;

    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Completed);

    let job = h.job(&id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.cost_cents, 200);
    let video = h.store.get_by_job(&id).await.unwrap().unwrap();
    assert!(!video.metadata.has_audio);
    h.assert_invariants(&id).await;
}

#[tokio::test]
async fn missing_tts_provider_still_completes() {
    let h = harness(Options {
        tts: None,
        ..Options::default()
    })
    .await;
    let id = h.submit(VideoStyle::HowTo).await;

    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Completed);
    let video = h.store.get_by_job(&id).await.unwrap().unwrap();
    assert!(!video.metadata.has_audio);
}

#[tokio::test]
async fn generation_failure_then_retry_completes() {
    let h = harness(Options::default()).await;
    h.provider
        .push(Err(GenerationError::failed(Backend::Luma, "quota exceeded")));
    let id = h.submit(VideoStyle::Rotation).await;

    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Failed);

    let failed = h.job(&id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("luma generation failed: quota exceeded")
    );
    assert_eq!(h.store.video_count(&id).await, 0);
    h.assert_invariants(&id).await;

    let retried = h.service.retry(&id).await.unwrap();
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.progress, 0);
    assert_eq!(retried.attempts, 1);
    assert!(retried.error_message.is_none());

    let delivery = h.next_delivery("w1").await;
    assert_eq!(delivery.job.attempt, 1);
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Completed);

    let job = h.job(&id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
    h.assert_invariants(&id).await;
}

#[tokio::test]
async fn cancelled_pending_job_is_skipped_by_worker() {
    let h = harness(Options::default()).await;
    let id = h.submit(VideoStyle::Rotation).await;

    let cancelled = h.service.cancel(&id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Failed);
    assert_eq!(cancelled.error_message.as_deref(), Some(CANCELLED_MESSAGE));

    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Skipped);

    let job = h.job(&id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(h.provider.calls(), 0);
    assert_eq!(h.queue.stats().await.unwrap().in_flight, 0);
}

#[tokio::test]
async fn cancel_during_generation_discards_result() {
    let h = harness(Options {
        provider_delay: Duration::from_millis(200),
        ..Options::default()
    })
    .await;
    let id = h.submit(VideoStyle::Rotation).await;
    let delivery = h.next_delivery("w1").await;

    let executor = h.executor();
    let run = tokio::spawn(async move { executor.execute(delivery).await });

    // Wait for the worker to pick the job up, then cancel mid-generation.
    for _ in 0..50 {
        if h.job(&id).await.status == JobStatus::Processing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    h.service.cancel(&id).await.unwrap();

    assert_eq!(run.await.unwrap(), DeliveryOutcome::Skipped);
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(h.store.video_count(&id).await, 0);
    assert!(h.objects.keys().await.is_empty());
    assert_eq!(h.job(&id).await.error_message.as_deref(), Some(CANCELLED_MESSAGE));
}

#[tokio::test]
async fn stale_attempt_cannot_touch_retried_job() {
    let h = harness(Options {
        provider_delay: Duration::from_millis(200),
        ..Options::default()
    })
    .await;
    let id = h.submit(VideoStyle::Rotation).await;
    let old_delivery = h.next_delivery("w1").await;

    let old = h.executor();
    let old_run = tokio::spawn(async move { old.execute(old_delivery).await });

    for _ in 0..50 {
        if h.job(&id).await.status == JobStatus::Processing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    h.service.cancel(&id).await.unwrap();
    h.service.retry(&id).await.unwrap();

    let new_delivery = h.next_delivery("w2").await;
    assert_eq!(new_delivery.job.attempt, 1);
    let new = h.executor();
    let new_run = tokio::spawn(async move { new.execute(new_delivery).await });

    for _ in 0..50 {
        let job = h.job(&id).await;
        if job.status == JobStatus::Processing && job.attempts == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The first provider call returns while the second attempt owns the job.
    assert_eq!(old_run.await.unwrap(), DeliveryOutcome::Skipped);
    let job = h.job(&id).await;
    assert!(job.result_ref.is_none());
    assert!(h.objects.keys().await.is_empty());

    assert_eq!(new_run.await.unwrap(), DeliveryOutcome::Completed);
    let video = h.store.get_by_job(&id).await.unwrap().unwrap();
    assert_eq!(video.attempt, 1);
    assert_eq!(video.metadata.source_url, "https://provider.example.com/2.mp4");
    assert_eq!(h.objects.keys().await, vec![video.storage_key.clone()]);
    assert_eq!(h.provider.calls(), 2);
    h.assert_invariants(&id).await;
}

#[tokio::test]
async fn cancel_after_video_insert_leaves_nothing_for_retry() {
    let h = harness(Options {
        cancel_after_first_insert: true,
        ..Options::default()
    })
    .await;
    let id = h.submit(VideoStyle::Rotation).await;

    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Skipped);

    let job = h.job(&id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(CANCELLED_MESSAGE));
    assert_eq!(h.store.video_count(&id).await, 0);
    assert!(h.objects.keys().await.is_empty());

    h.service.retry(&id).await.unwrap();
    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::Completed);

    let job = h.job(&id).await;
    let video = h.store.get_by_job(&id).await.unwrap().unwrap();
    assert_eq!(video.attempt, 1);
    assert_eq!(video.metadata.source_url, "https://provider.example.com/2.mp4");
    assert_eq!(job.result_ref.as_deref(), Some(video.media_ref.as_str()));
    assert_eq!(h.objects.keys().await, vec![video.storage_key.clone()]);
    h.assert_invariants(&id).await;
}

#[tokio::test]
async fn concurrent_redelivery_finalizes_once() {
    let h = harness(Options {
        provider_delay: Duration::from_millis(50),
        ..Options::default()
    })
    .await;
    let id = h.submit(VideoStyle::Rotation).await;

    let first = h.next_delivery("w1").await;
    let mut reclaimed = h
        .queue
        .reclaim_stale("w2", Duration::ZERO, 1)
        .await
        .unwrap();
    assert_eq!(reclaimed.len(), 1);
    let second = reclaimed.remove(0);
    assert_eq!(first.message_id, second.message_id);

    let (a, b) = (h.executor(), h.executor());
    let (ra, rb) = tokio::join!(a.execute(first), b.execute(second));

    let outcomes = [ra, rb];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == DeliveryOutcome::Completed)
            .count(),
        1
    );
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == DeliveryOutcome::Skipped)
            .count(),
        1
    );

    assert_eq!(h.job(&id).await.status, JobStatus::Completed);
    assert_eq!(h.store.video_count(&id).await, 1);
    let video = h.store.get_by_job(&id).await.unwrap().unwrap();
    assert_eq!(h.objects.keys().await, vec![video.storage_key.clone()]);
    h.assert_invariants(&id).await;
}

#[tokio::test]
async fn transient_failure_is_redelivered_and_resumed() {
    let h = harness(Options {
        download_failures: 1,
        ..Options::default()
    })
    .await;
    let id = h.submit(VideoStyle::Rotation).await;

    let delivery = h.next_delivery("w1").await;
    let outcome = h.executor().execute(delivery).await;
    assert!(matches!(outcome, DeliveryOutcome::Retrying(_)));

    let job = h.job(&id).await;
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.progress, 80);

    let redelivered = h.next_delivery("w1").await;
    assert_eq!(redelivered.job.delivery, 2);
    assert_eq!(h.executor().execute(redelivered).await, DeliveryOutcome::Completed);

    assert_eq!(h.job(&id).await.status, JobStatus::Completed);
    assert_eq!(h.provider.calls(), 2);
    h.assert_invariants(&id).await;
}

#[tokio::test]
async fn exhausted_deliveries_are_dead_lettered() {
    let h = harness(Options {
        download_failures: 10,
        max_attempts: 2,
        ..Options::default()
    })
    .await;
    let id = h.submit(VideoStyle::Rotation).await;

    let delivery = h.next_delivery("w1").await;
    assert!(matches!(
        h.executor().execute(delivery).await,
        DeliveryOutcome::Retrying(_)
    ));

    let delivery = h.next_delivery("w1").await;
    assert_eq!(h.executor().execute(delivery).await, DeliveryOutcome::DeadLettered);

    let job = h.job(&id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some(EXHAUSTED_MESSAGE));

    let dead = h.queue.dead_letters().await;
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].job.job_id, id);
    assert!(dead[0].reason.starts_with(EXHAUSTED_MESSAGE));
    h.assert_invariants(&id).await;
}

#[tokio::test]
async fn retry_of_completed_job_is_rejected() {
    let h = harness(Options::default()).await;
    let id = h.submit(VideoStyle::Rotation).await;
    let delivery = h.next_delivery("w1").await;
    h.executor().execute(delivery).await;

    let err = h.service.retry(&id).await.unwrap_err();
    assert!(err.is_conflict());
}
