use crate::{
    error::{ImageBotError, Result},
    models::GeneratedImage,
    providers::{AttemptOutcome, ImageProvider},
};
use std::sync::Arc;

/// Ordered fallback over image providers; first success wins.
#[derive(Clone)]
pub struct ImageProviderChain {
    providers: Vec<Arc<dyn ImageProvider>>,
}

impl ImageProviderChain {
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Tries each provider in turn, strictly one at a time.
    pub async fn generate(&self, prompt: &str, request_id: &str) -> Result<GeneratedImage> {
        let mut failures = Vec::with_capacity(self.providers.len());

        for (position, provider) in self.providers.iter().enumerate() {
            log::debug!(
                "[req:{}] attempt {}/{} via {}",
                request_id,
                position + 1,
                self.providers.len(),
                provider.name()
            );

            match provider.attempt(prompt).await {
                AttemptOutcome::Success(image) => {
                    log::info!(
                        "[req:{}] image produced by {} ({})",
                        request_id,
                        provider.name(),
                        image.mime_type
                    );
                    return Ok(image);
                }
                AttemptOutcome::Failure(failure) => {
                    log::warn!(
                        "[req:{}] {} failed ({}): {}",
                        request_id,
                        failure.provider,
                        failure.kind.as_str(),
                        failure.detail
                    );
                    failures.push(failure);
                }
            }
        }

        log::error!(
            "[req:{}] all {} image providers failed",
            request_id,
            failures.len()
        );
        Err(ImageBotError::ProviderChainExhausted(failures))
    }
}
