pub mod chain;
pub mod gemini_client;
pub mod imagen_client;

use crate::{config::Config, error::Result, models::GeneratedImage};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub use chain::ImageProviderChain;
pub use gemini_client::{GeminiImageClient, GeminiTextClient};
pub use imagen_client::ImagenClient;

/// Text generation used for prompt moderation.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, instruction: &str, prompt: &str) -> Result<String>;
}

/// One image generation attempt. Implementations never fail with an error:
/// every problem is normalized into `AttemptOutcome::Failure`.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn attempt(&self, prompt: &str) -> AttemptOutcome;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(GeneratedImage),
    Failure(AttemptFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoCandidates,
    NoImagePart,
    #[serde(rename = "upstream_error")]
    Upstream,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NoCandidates => "no_candidates",
            FailureKind::NoImagePart => "no_image_part",
            FailureKind::Upstream => "upstream_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptFailure {
    pub provider: String,
    pub kind: FailureKind,
    /// Upstream text; logged always, returned to callers only when configured.
    pub detail: String,
}

impl AttemptFailure {
    pub fn new(provider: impl Into<String>, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            kind,
            detail: detail.into(),
        }
    }
}

/// Cuts upstream bodies down to something loggable.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 500;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let cut: String = body.chars().take(LIMIT).collect();
        format!("{}…", cut)
    }
}

pub(crate) fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

/// Upstream clients built from configuration, sharing one HTTP pool.
#[derive(Clone)]
pub struct ProviderClients {
    pub chain: ImageProviderChain,
    pub moderator_model: Option<Arc<dyn TextModel>>,
}

impl ProviderClients {
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        let mut providers: Vec<Arc<dyn ImageProvider>> = config
            .imagen
            .api_keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                Arc::new(ImagenClient::new(
                    http.clone(),
                    &config.imagen,
                    key.clone(),
                    format!("imagen#{}", index + 1),
                )) as Arc<dyn ImageProvider>
            })
            .collect();

        let mut moderator_model: Option<Arc<dyn TextModel>> = None;
        if let Some(key) = &config.gemini.api_key {
            providers.push(Arc::new(GeminiImageClient::new(
                http.clone(),
                &config.gemini,
                key.clone(),
            )));
            if config.moderation_active() {
                moderator_model = Some(Arc::new(GeminiTextClient::new(
                    http,
                    &config.gemini,
                    key.clone(),
                )));
            }
        }

        log::info!(
            "Image provider chain: [{}]",
            providers
                .iter()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Self {
            chain: ImageProviderChain::new(providers),
            moderator_model,
        }
    }
}
