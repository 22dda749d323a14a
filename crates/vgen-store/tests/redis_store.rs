//! Redis store integration tests.

use std::sync::Arc;

use vgen_models::{
    AspectRatio, Backend, Job, JobSettings, JobStatus, Video, VideoId, VideoMetadata, VideoStyle,
};
use vgen_store::{
    ControlStore, ImageSource, JobRepository, ProductSnapshot, RedisStore, VideoInsert,
    VideoStore,
};

/// Store under a key prefix private to one test run.
fn test_store(name: &str) -> Arc<RedisStore> {
    dotenvy::dotenv().ok();

    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    Arc::new(
        RedisStore::new(&url, format!("vgen:test:{name}:{suffix}"))
            .expect("Failed to create store"),
    )
}

fn new_job() -> Job {
    Job::new(
        "test_product",
        "test_project",
        VideoStyle::Testimonial,
        JobSettings::default(),
        vec!["https://cdn.example.com/p.jpg".into()],
    )
}

fn video(job: &Job, media_ref: &str) -> Video {
    Video::new(
        job.id.clone(),
        job.product_ref.clone(),
        job.project_ref.clone(),
        media_ref,
        "videos/test_project/test_product/out.mp4",
        2048,
        Some(10.0),
        VideoMetadata {
            backend: Backend::Luma,
            model: Backend::Luma.model().into(),
            has_audio: true,
            source_url: "https://provider.example.com/out.mp4".into(),
            cost_cents: 205,
            style: VideoStyle::Testimonial,
            aspect_ratio: AspectRatio::Square,
            voice: None,
        },
    )
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_lifecycle() {
    let store = test_store("lifecycle");
    store.ping().await.expect("Failed to ping Redis");
    let jobs = JobRepository::new(store.clone());

    let job = jobs.create(new_job()).await.expect("Failed to create job");
    assert_eq!(
        jobs.list_by_status(JobStatus::Pending).await.unwrap().len(),
        1
    );

    jobs.start(&job.id).await.unwrap();
    jobs.record_progress(&job.id, 0, 50).await.unwrap();
    let done = jobs
        .complete(&job.id, 0, "s3://bucket/out.mp4", 10)
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);

    assert!(jobs.list_by_status(JobStatus::Pending).await.unwrap().is_empty());
    assert_eq!(
        jobs.list_by_status(JobStatus::Completed).await.unwrap().len(),
        1
    );

    assert_eq!(jobs.clear_completed("test_project").await.unwrap(), 1);
    assert!(jobs.get(&job.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_scripts_under_hash_tagged_prefix() {
    dotenvy::dotenv().ok();
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let store = Arc::new(
        RedisStore::new(&url, format!("{{vgen-test-{suffix}}}")).expect("Failed to create store"),
    );
    let jobs = JobRepository::new(store.clone());

    let job = jobs.create(new_job()).await.unwrap();
    jobs.start(&job.id).await.unwrap();
    assert!(jobs.list_by_status(JobStatus::Pending).await.unwrap().is_empty());
    assert_eq!(
        jobs.list_by_status(JobStatus::Processing).await.unwrap().len(),
        1
    );

    jobs.complete(&job.id, 0, "s3://bucket/out.mp4", 10).await.unwrap();
    assert!(jobs.list_by_status(JobStatus::Processing).await.unwrap().is_empty());

    assert_eq!(jobs.clear_completed("test_project").await.unwrap(), 1);
    assert!(jobs.list_by_status(JobStatus::Completed).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_stale_write_conflicts() {
    let store = test_store("conflict");
    let jobs = JobRepository::new(store.clone());

    let job = jobs.create(new_job()).await.unwrap();
    jobs.start(&job.id).await.unwrap();
    jobs.cancel(&job.id).await.unwrap();

    let err = jobs.record_progress(&job.id, 0, 80).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_video_insert_once_per_job() {
    let store = test_store("video");
    let jobs = JobRepository::new(store.clone());
    let job = jobs.create(new_job()).await.unwrap();

    let first = store.insert_if_absent(video(&job, "s3://a")).await.unwrap();
    assert!(matches!(first, VideoInsert::Created(_)));

    let second = store.insert_if_absent(video(&job, "s3://b")).await.unwrap();
    match second {
        VideoInsert::Existing(existing) => assert_eq!(existing.media_ref, "s3://a"),
        VideoInsert::Created(_) => panic!("second insert must not win"),
    }

    let stored = store.get_by_job(&job.id).await.unwrap().unwrap();
    assert_eq!(stored.media_ref, "s3://a");

    assert!(!store.remove(&job.id, &VideoId::new()).await.unwrap());
    assert!(store.remove(&job.id, &stored.id).await.unwrap());
    assert!(store.get_by_job(&job.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_pause_flag_and_products() {
    let store = test_store("control");

    assert!(!store.is_paused().await.unwrap());
    store.set_paused(true).await.unwrap();
    assert!(store.is_paused().await.unwrap());
    store.set_paused(false).await.unwrap();
    assert!(!store.is_paused().await.unwrap());

    let product = ProductSnapshot {
        product_ref: "test_product".into(),
        project_ref: "test_project".into(),
        title: "Beard Oil".into(),
        description: String::new(),
        images: vec!["https://cdn.example.com/p.jpg".into()],
    };
    store.put_product(&product).await.unwrap();
    assert_eq!(
        store.product("test_project", "test_product").await.unwrap(),
        Some(product)
    );
    assert!(store.product("test_project", "ghost").await.unwrap().is_none());
}
