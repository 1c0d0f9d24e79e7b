//! In-process stand-ins for the external collaborators.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use shotflow::billing::{ChargeError, ChargeReceipt, ChargeRequest, ChargingService};
use shotflow::error::StorageError;
use shotflow::provider::{
    GenerationProvider, ImageRequest, ImageResponse, ProviderError, TaskStatusResponse,
    VideoRequest, VideoSubmission,
};
use shotflow::storage::{ArtifactFetcher, ArtifactStorage, FetchedArtifact};

pub const VIDEO_URL: &str = "https://provider.example.com/out/clip.mp4";

pub fn status(s: &str) -> Result<TaskStatusResponse, ProviderError> {
    Ok(TaskStatusResponse {
        status: s.to_string(),
        video_url: None,
    })
}

pub fn completed(url: &str) -> Result<TaskStatusResponse, ProviderError> {
    Ok(TaskStatusResponse {
        status: "completed".to_string(),
        video_url: Some(url.to_string()),
    })
}

pub fn query_error() -> Result<TaskStatusResponse, ProviderError> {
    Err(ProviderError::Request("connection reset".to_string()))
}

/// Provider whose answers are queued up front.
pub struct ScriptedProvider {
    image_data: Mutex<Vec<String>>,
    failing_prompts: Mutex<HashSet<String>>,
    statuses: Mutex<VecDeque<Result<TaskStatusResponse, ProviderError>>>,
    fallback_status: Mutex<String>,
    fail_video_submit: Mutex<bool>,
    pub image_requests: Mutex<Vec<ImageRequest>>,
    pub video_requests: Mutex<Vec<VideoRequest>>,
    pub status_queries: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            image_data: Mutex::new(vec!["https://provider.example.com/img/0.png".to_string()]),
            failing_prompts: Mutex::new(HashSet::new()),
            statuses: Mutex::new(VecDeque::new()),
            fallback_status: Mutex::new("processing".to_string()),
            fail_video_submit: Mutex::new(false),
            image_requests: Mutex::new(Vec::new()),
            video_requests: Mutex::new(Vec::new()),
            status_queries: AtomicUsize::new(0),
        }
    }

    /// Payloads returned by every image generation.
    pub fn set_image_data(&self, data: Vec<String>) {
        *self.image_data.lock().unwrap() = data;
    }

    pub fn fail_prompt(&self, prompt: &str) {
        self.failing_prompts
            .lock()
            .unwrap()
            .insert(prompt.to_string());
    }

    pub fn push_statuses(
        &self,
        statuses: impl IntoIterator<Item = Result<TaskStatusResponse, ProviderError>>,
    ) {
        self.statuses.lock().unwrap().extend(statuses);
    }

    /// Status reported once the script is exhausted.
    pub fn set_fallback_status(&self, status: &str) {
        *self.fallback_status.lock().unwrap() = status.to_string();
    }

    pub fn fail_video_submissions(&self) {
        *self.fail_video_submit.lock().unwrap() = true;
    }

    pub fn image_calls(&self) -> usize {
        self.image_requests.lock().unwrap().len()
    }

    pub fn video_calls(&self) -> usize {
        self.video_requests.lock().unwrap().len()
    }

    pub fn status_calls(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, ProviderError> {
        self.image_requests.lock().unwrap().push(request.clone());
        if self.failing_prompts.lock().unwrap().contains(&request.prompt) {
            return Err(ProviderError::Rejected(format!(
                "content policy: {}",
                request.prompt
            )));
        }
        Ok(ImageResponse {
            data: self.image_data.lock().unwrap().clone(),
        })
    }

    async fn generate_video(
        &self,
        request: &VideoRequest,
    ) -> Result<VideoSubmission, ProviderError> {
        let mut requests = self.video_requests.lock().unwrap();
        requests.push(request.clone());
        if *self.fail_video_submit.lock().unwrap() {
            return Err(ProviderError::Request("submit refused".to_string()));
        }
        Ok(VideoSubmission {
            task_id: format!("task-{}", requests.len()),
        })
    }

    async fn query_task_status(&self, _task_id: &str) -> Result<TaskStatusResponse, ProviderError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().unwrap().pop_front() {
            Some(next) => next,
            None => status(&self.fallback_status.lock().unwrap()),
        }
    }
}

/// Charging service that records every request.
pub struct RecordingLedger {
    balance: Mutex<f64>,
    unit_price: f64,
    pub charges: Mutex<Vec<ChargeRequest>>,
}

impl RecordingLedger {
    pub fn with_balance(balance: f64) -> Self {
        Self {
            balance: Mutex::new(balance),
            unit_price: 1.0,
            charges: Mutex::new(Vec::new()),
        }
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }

    pub fn balance(&self) -> f64 {
        *self.balance.lock().unwrap()
    }
}

#[async_trait]
impl ChargingService for RecordingLedger {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, ChargeError> {
        let cost = self.unit_price * f64::from(request.quantity);
        let mut balance = self.balance.lock().unwrap();
        if *balance < cost {
            return Err(ChargeError::InsufficientBalance {
                required: cost,
                available: *balance,
            });
        }
        *balance -= cost;
        self.charges.lock().unwrap().push(request);
        Ok(ChargeReceipt {
            total_cost: cost,
            balance_after: *balance,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub len: usize,
}

/// Storage that keeps uploads in memory.
pub struct MemoryStorage {
    pub uploads: Mutex<Vec<Upload>>,
    fail: Mutex<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
        }
    }

    pub fn fail_uploads(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStorage for MemoryStorage {
    async fn upload(
        &self,
        content: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if *self.fail.lock().unwrap() {
            return Err(StorageError::Upload("bucket unavailable".to_string()));
        }
        self.uploads.lock().unwrap().push(Upload {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            len: content.len(),
        });
        Ok(format!("https://storage.test/{}", filename))
    }
}

/// Fetcher answering every URL with the same bytes.
pub struct StaticFetcher {
    pub fetched: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self {
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedArtifact, StorageError> {
        self.fetched.lock().unwrap().push(url.to_string());
        Ok(FetchedArtifact {
            bytes: b"remote-bytes".to_vec(),
            content_type: None,
        })
    }
}
