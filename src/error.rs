use thiserror::Error;

use crate::providers::{AttemptFailure, FailureKind};

#[derive(Debug, Error)]
pub enum ImageBotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Unauthorized request")]
    Unauthorized,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Moderation error: {0}")]
    ModerationError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("No image provider succeeded: {}", summarize(.0))]
    ProviderChainExhausted(Vec<AttemptFailure>),
    #[error("Upload failed: {0}")]
    UploadError(String),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ImageBotError {
    /// Message safe to hand back to the caller, without upstream bodies.
    pub fn public_message(&self) -> String {
        match self {
            ImageBotError::Unauthorized => "Unauthorized request".to_string(),
            ImageBotError::InvalidRequest(msg) => msg.clone(),
            ImageBotError::ModerationError(_) => "Failed to moderate prompt".to_string(),
            ImageBotError::ProviderChainExhausted(failures) => {
                match failures.last().map(|f| f.kind) {
                    Some(FailureKind::NoCandidates) => {
                        "Image generation failed: no candidates returned".to_string()
                    }
                    Some(FailureKind::NoImagePart) => {
                        "Image generation failed: no image data in response".to_string()
                    }
                    _ => "Image generation failed: no provider succeeded".to_string(),
                }
            }
            ImageBotError::UploadError(_) => "Failed to upload generated image".to_string(),
            _ => "Failed to process image generation request".to_string(),
        }
    }
}

fn summarize(failures: &[AttemptFailure]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{} ({})", f.provider, f.kind.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ImageBotError>;
