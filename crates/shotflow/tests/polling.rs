//! Provider polling: completion, transient query failures, timeout and cancellation.

mod common;

use common::harness::USER;
use common::*;

use shotflow::billing::BizType;
use shotflow::db::job_repo;
use shotflow::job::{keys, Job, JobMeta, JobStatus, JobType};
use shotflow::orchestrator::{PollContext, PollResult, VideoGeneration};

/// A RUNNING video job that already carries a provider task id.
async fn running_video_job(h: &TestHarness) -> (Job, PollContext) {
    let meta = JobMeta::new()
        .with(keys::PROVIDER_TASK_ID, "task-77")
        .with(keys::MODEL, "video-pro")
        .with(keys::DURATION_SECONDS, 6)
        .with(keys::PROMPT, "a fox at dawn");
    let mut job = Job::new(USER, JobType::VideoGeneration, meta);
    job.mark_running().unwrap();
    job_repo::create(&h.db, &job).await.unwrap();

    let poll = PollContext::from_job(&job, &h.ctx().config.generation).unwrap();
    (job, poll)
}

#[tokio::test]
async fn test_submitted_video_succeeds_after_three_polls() {
    let h = TestHarness::new().await;
    h.provider
        .push_statuses([status("queued"), status("processing"), completed(VIDEO_URL)]);

    let submitted = h
        .orchestrator
        .submit_video(
            USER,
            VideoGeneration {
                prompt: "waves on a cliff".to_string(),
                duration_seconds: Some(8),
                ..VideoGeneration::default()
            },
            JobType::VideoGeneration,
        )
        .await
        .unwrap();
    assert_eq!(submitted.status, JobStatus::Pending);

    let job = h.wait_for_terminal(&submitted.job_id).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.progress, 100);
    assert!(job.finished_at.is_some());

    let result_url = job.result_url.clone().unwrap();
    assert!(result_url.starts_with("https://storage.test/"));
    assert!(result_url.ends_with(".mp4"));
    assert_eq!(job.meta.provider_task_id(), Some("task-1"));

    let charges = h.ledger.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].biz_type, BizType::VideoGeneration);
    assert_eq!(charges[0].quantity, 8);
    assert_eq!(charges[0].job_id, submitted.job_id);

    assert_eq!(h.fetcher.fetched(), vec![VIDEO_URL.to_string()]);
    assert_eq!(h.provider.status_calls(), 3);
}

#[tokio::test]
async fn test_transient_query_failures_consume_one_iteration() {
    let h = TestHarness::new().await;
    let (job, poll) = running_video_job(&h).await;
    h.provider.push_statuses([
        query_error(),
        query_error(),
        status("processing"),
        completed(VIDEO_URL),
    ]);

    let outcome = h.engine(5).run(poll).await;

    assert_eq!(outcome.result, PollResult::Succeeded);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(h.provider.status_calls(), 4);

    let job = h.job(&job.id).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert!(job.error_message.is_none());
    assert_eq!(h.ledger.charges()[0].quantity, 6);
}

#[tokio::test]
async fn test_exhausted_query_attempts_skip_the_iteration() {
    let h = TestHarness::new().await;
    let (job, poll) = running_video_job(&h).await;
    h.provider.push_statuses([
        query_error(),
        query_error(),
        query_error(),
        completed(VIDEO_URL),
    ]);

    let outcome = h.engine(5).run(poll).await;

    assert_eq!(outcome.result, PollResult::Succeeded);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(h.job(&job.id).await.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn test_poll_budget_exhausted_fails_job() {
    let h = TestHarness::new().await;
    let (job, poll) = running_video_job(&h).await;

    let outcome = h.engine(4).run(poll).await;

    assert_eq!(outcome.result, PollResult::TimedOut);
    assert_eq!(outcome.iterations, 4);
    assert_eq!(h.provider.status_calls(), 4);

    let job = h.job(&job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("timed out"));
    assert!(h.ledger.charges().is_empty());
}

#[tokio::test]
async fn test_submitted_video_times_out_with_config_budget() {
    let h = HarnessBuilder::new().max_polls(3).build().await;

    let submitted = h
        .orchestrator
        .submit_video(
            USER,
            VideoGeneration {
                prompt: "slow render".to_string(),
                ..VideoGeneration::default()
            },
            JobType::SingleShotVideo,
        )
        .await
        .unwrap();

    let job = h.wait_for_terminal(&submitted.job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("timed out after 3"));
    assert_eq!(h.provider.status_calls(), 3);
}

#[tokio::test]
async fn test_provider_failure_fails_job_without_charge() {
    let h = TestHarness::new().await;
    let (job, poll) = running_video_job(&h).await;
    h.provider.push_statuses([status("processing"), status("failed")]);

    let outcome = h.engine(5).run(poll).await;

    assert!(matches!(outcome.result, PollResult::Failed(_)));
    assert_eq!(outcome.iterations, 2);
    let job = h.job(&job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("task-77"));
    assert!(h.ledger.charges().is_empty());
    assert!(h.storage.uploads().is_empty());
}

#[tokio::test]
async fn test_completed_without_video_url_fails_job() {
    let h = TestHarness::new().await;
    let (job, poll) = running_video_job(&h).await;
    h.provider.push_statuses([status("completed")]);

    let outcome = h.engine(5).run(poll).await;

    assert!(matches!(outcome.result, PollResult::Failed(_)));
    let job = h.job(&job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .unwrap()
        .starts_with("Failed to finalize generation"));
    assert!(h.ledger.charges().is_empty());
}

#[tokio::test]
async fn test_canceled_job_stops_polling() {
    let h = TestHarness::new().await;
    let (job, poll) = running_video_job(&h).await;
    assert!(h.orchestrator.cancel(&job.id).await.unwrap());
    h.provider.push_statuses([completed(VIDEO_URL)]);

    let outcome = h.engine(5).run(poll).await;

    assert_eq!(outcome.result, PollResult::Canceled);
    assert_eq!(outcome.iterations, 1);

    let job = h.job(&job.id).await;
    assert_eq!(job.status, JobStatus::Canceled);
    assert!(job.result_url.is_none());
    assert!(h.ledger.charges().is_empty());
    assert!(h.storage.uploads().is_empty());
}

#[tokio::test]
async fn test_progress_is_recorded_between_polls() {
    let h = TestHarness::new().await;
    let (job, poll) = running_video_job(&h).await;
    h.provider.set_fallback_status("processing");

    let outcome = h.engine(2).run(poll).await;
    assert_eq!(outcome.result, PollResult::TimedOut);

    let job = h.job(&job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 50);
}

#[tokio::test]
async fn test_deleted_job_orphans_provider_task() {
    let h = TestHarness::new().await;
    let (mut job, _) = running_video_job(&h).await;
    job.id = "never-stored".to_string();
    let poll = PollContext::from_job(&job, &h.ctx().config.generation).unwrap();

    let outcome = h.engine(5).run(poll).await;

    assert_eq!(outcome.result, PollResult::Orphaned);
    assert_eq!(outcome.iterations, 1);
}
