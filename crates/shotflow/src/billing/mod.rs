//! Charging collaborator contract.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChargeError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Charging service unavailable: {0}")]
    Unavailable(String),
}

/// Billable business category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BizType {
    ImageGeneration,
    VideoGeneration,
}

impl BizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageGeneration => "image_generation",
            Self::VideoGeneration => "video_generation",
        }
    }
}

impl fmt::Display for BizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub job_id: String,
    pub user_id: i64,
    pub biz_type: BizType,
    pub model_code: String,
    /// Billable units: images for pre-charges, seconds for video.
    pub quantity: u32,
    pub metadata: Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeReceipt {
    pub total_cost: f64,
    pub balance_after: f64,
}

#[async_trait]
pub trait ChargingService: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, ChargeError>;
}
