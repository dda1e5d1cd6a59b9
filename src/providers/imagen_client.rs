use crate::{
    config::{mask_key, ImagenConfig},
    models::{
        GeneratedImage, ImagenInstance, ImagenParameters, ImagenPredictRequest,
        ImagenPredictResponse,
    },
    providers::{
        is_image_mime, truncate_body, AttemptFailure, AttemptOutcome, FailureKind, ImageProvider,
    },
};
use async_trait::async_trait;
use reqwest::Client;

/// Primary provider: Imagen `:predict`, one instance per API key.
#[derive(Clone)]
pub struct ImagenClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    label: String,
}

impl ImagenClient {
    pub fn new(client: Client, config: &ImagenConfig, api_key: String, label: String) -> Self {
        Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            label,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:predict", self.base_url, self.model)
    }

    fn failure(&self, kind: FailureKind, detail: impl Into<String>) -> AttemptOutcome {
        AttemptOutcome::Failure(AttemptFailure::new(self.label.clone(), kind, detail))
    }

    /// Normalizes a decoded `:predict` body into an attempt outcome.
    pub fn extract_image(&self, response: ImagenPredictResponse, prompt: &str) -> AttemptOutcome {
        if response.predictions.is_empty() {
            return self.failure(FailureKind::NoCandidates, "Imagen returned no predictions");
        }

        let found = response.predictions.into_iter().find_map(|prediction| {
            let data = prediction.bytes_base64_encoded.filter(|d| !d.is_empty())?;
            let mime_type = prediction
                .mime_type
                .unwrap_or_else(|| "image/png".to_string());
            is_image_mime(&mime_type).then_some((data, mime_type))
        });

        match found {
            Some((data, mime_type)) => AttemptOutcome::Success(GeneratedImage {
                data,
                mime_type,
                caption: prompt.to_string(),
                provider: self.label.clone(),
            }),
            None => self.failure(
                FailureKind::NoImagePart,
                "Imagen predictions carried no image bytes",
            ),
        }
    }
}

#[async_trait]
impl ImageProvider for ImagenClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn attempt(&self, prompt: &str) -> AttemptOutcome {
        let payload = ImagenPredictRequest {
            instances: vec![ImagenInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImagenParameters { sample_count: 1 },
        };

        log::info!(
            "Generating image with {} (model: {}, key: {})",
            self.label,
            self.model,
            mask_key(&self.api_key)
        );

        let response = match self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.failure(FailureKind::Upstream, format!("request failed: {}", e)),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return self.failure(
                    FailureKind::Upstream,
                    format!("failed to read response body: {}", e),
                )
            }
        };
        if !status.is_success() {
            return self.failure(
                FailureKind::Upstream,
                format!("HTTP {}: {}", status.as_u16(), truncate_body(&body)),
            );
        }

        match serde_json::from_str::<ImagenPredictResponse>(&body) {
            Ok(decoded) => self.extract_image(decoded, prompt),
            Err(e) => self.failure(
                FailureKind::Upstream,
                format!("malformed response: {}", e),
            ),
        }
    }
}
