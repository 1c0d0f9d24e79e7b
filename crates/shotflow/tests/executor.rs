//! Synchronous image generation and video submission entry points.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use common::harness::USER;
use common::*;

use shotflow::billing::BizType;
use shotflow::db::{artifact_repo, job_repo};
use shotflow::job::{keys, ArtifactKind, JobStatus, JobType, TargetType};
use shotflow::orchestrator::{ErrorCode, ImageGeneration, Target, VideoGeneration};

fn image(prompt: &str) -> ImageGeneration {
    ImageGeneration {
        prompt: prompt.to_string(),
        model: None,
        aspect_ratio: None,
        reference_images: Vec::new(),
        target: None,
    }
}

fn inline_png() -> String {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend(std::iter::repeat(0u8).take(256));
    STANDARD.encode(bytes)
}

#[tokio::test]
async fn test_image_generation_succeeds() {
    let h = TestHarness::new().await;

    let outcome = h
        .orchestrator
        .generate_image(USER, image("a lighthouse"))
        .await
        .unwrap();

    assert_eq!(outcome.status, JobStatus::Succeeded);
    assert_eq!(outcome.urls.len(), 1);
    assert_eq!(outcome.result_url, outcome.urls[0]);

    let job = h.job(&outcome.job_id).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.result_url.as_deref(), Some(outcome.result_url.as_str()));
    assert_eq!(job.progress, 100);
    assert_eq!(job.done_items, 1);
    assert!(job.started_at.is_some());
    assert_eq!(job.meta.str(keys::MODEL), Some("image-standard"));
    let meta = serde_json::to_value(&job.meta).unwrap();
    assert_eq!(meta[keys::TOTAL_COST], 1.0);
    assert_eq!(meta[keys::BALANCE_AFTER], 999.0);

    let charges = h.ledger.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].biz_type, BizType::ImageGeneration);
    assert_eq!(charges[0].quantity, 1);
    assert_eq!(h.provider.image_calls(), 1);
}

#[tokio::test]
async fn test_insufficient_balance_skips_provider() {
    let h = HarnessBuilder::new().balance(0.0).build().await;

    let err = h
        .orchestrator
        .generate_image(USER, image("expensive"))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientBalance);
    assert_eq!(h.provider.image_calls(), 0);

    let failed = job_repo::list_by_status_and_type(&h.db, JobStatus::Failed, JobType::ImageGeneration)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("Insufficient balance"));
}

#[tokio::test]
async fn test_url_and_inline_payloads_are_persisted() {
    let h = TestHarness::new().await;
    h.provider.set_image_data(vec![
        "https://provider.example.com/img/first.png".to_string(),
        inline_png(),
    ]);

    let outcome = h
        .orchestrator
        .generate_image(USER, image("two takes"))
        .await
        .unwrap();

    assert_eq!(outcome.urls.len(), 2);
    assert_eq!(
        h.fetcher.fetched(),
        vec!["https://provider.example.com/img/first.png".to_string()]
    );

    let uploads = h.storage.uploads();
    assert_eq!(uploads.len(), 2);
    assert!(uploads[0].filename.ends_with(".png"));
    assert_eq!(uploads[1].content_type, "image/png");
    assert_eq!(uploads[1].len, 264);
}

#[tokio::test]
async fn test_unrecognized_payload_fails_job() {
    let h = TestHarness::new().await;
    h.provider.set_image_data(vec!["tiny".to_string()]);

    let err = h
        .orchestrator
        .generate_image(USER, image("short payload"))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::GenerationFailed);
    assert!(h.storage.uploads().is_empty());
    let failed = job_repo::list_by_status_and_type(&h.db, JobStatus::Failed, JobType::ImageGeneration)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn test_provider_rejection_fails_job() {
    let h = TestHarness::new().await;
    h.provider.fail_prompt("forbidden");

    let err = h
        .orchestrator
        .generate_image(USER, image("forbidden"))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::GenerationFailed);
    assert!(err.message.contains("content policy"));
}

#[tokio::test]
async fn test_targeted_image_records_artifact() {
    let h = TestHarness::new().await;
    let target = Target::new(TargetType::Shot, 5);

    h.orchestrator
        .generate_image(
            USER,
            ImageGeneration {
                target: Some(target),
                ..image("shot five")
            },
        )
        .await
        .unwrap();

    assert!(artifact_repo::has_ready(&h.db, TargetType::Shot, 5, ArtifactKind::Image)
        .await
        .unwrap());
    assert!(!artifact_repo::has_ready(&h.db, TargetType::Shot, 5, ArtifactKind::Video)
        .await
        .unwrap());
    assert!(!artifact_repo::has_ready(&h.db, TargetType::Shot, 6, ArtifactKind::Image)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_empty_prompt_is_rejected_before_job_creation() {
    let h = TestHarness::new().await;

    let err = h
        .orchestrator
        .generate_image(USER, image("   "))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidRequest);
    for status in [JobStatus::Pending, JobStatus::Running, JobStatus::Failed] {
        let jobs = job_repo::list_by_status_and_type(&h.db, status, JobType::ImageGeneration)
            .await
            .unwrap();
        assert!(jobs.is_empty());
    }
}

#[tokio::test]
async fn test_submit_video_rejects_synchronous_type() {
    let h = TestHarness::new().await;

    let err = h
        .orchestrator
        .submit_video(
            USER,
            VideoGeneration {
                prompt: "clip".to_string(),
                ..VideoGeneration::default()
            },
            JobType::ImageGeneration,
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn test_video_submission_failure_fails_job() {
    let h = TestHarness::new().await;
    h.provider.fail_video_submissions();

    let submitted = h
        .orchestrator
        .submit_video(
            USER,
            VideoGeneration {
                prompt: "clip".to_string(),
                ..VideoGeneration::default()
            },
            JobType::VideoGeneration,
        )
        .await
        .unwrap();

    let job = h.wait_for_terminal(&submitted.job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .unwrap()
        .starts_with("Video submission failed"));
    assert_eq!(h.provider.status_calls(), 0);
}

#[tokio::test]
async fn test_unknown_job_lookup() {
    let h = TestHarness::new().await;

    let err = h.orchestrator.job("missing").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::JobNotFound);
}
