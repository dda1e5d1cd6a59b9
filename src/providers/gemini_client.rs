use crate::{
    config::{mask_key, GeminiConfig},
    error::{ImageBotError, Result},
    models::{
        gemini::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig},
        GeneratedImage,
    },
    providers::{
        is_image_mime, truncate_body, AttemptFailure, AttemptOutcome, FailureKind, ImageProvider,
        TextModel,
    },
};
use async_trait::async_trait;
use reqwest::Client;

const GEMINI_PROVIDER: &str = "gemini";

async fn generate_content(
    client: &Client,
    base_url: &str,
    model: &str,
    api_key: &str,
    request: &GenerateContentRequest,
) -> Result<GenerateContentResponse> {
    let url = format!(
        "{}/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    );

    log::debug!(
        "Invoking Gemini model {} (key: {})",
        model,
        mask_key(api_key)
    );

    let response = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(request)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ImageBotError::ProviderError(format!(
            "Gemini HTTP {}: {}",
            status.as_u16(),
            truncate_body(&body)
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| ImageBotError::ProviderError(format!("Gemini malformed response: {}", e)))
}

/// Text model used by the moderator.
#[derive(Clone)]
pub struct GeminiTextClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiTextClient {
    pub fn new(client: Client, config: &GeminiConfig, api_key: String) -> Self {
        Self {
            client,
            api_key,
            model: config.text_model.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl TextModel for GeminiTextClient {
    async fn generate(&self, instruction: &str, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            system_instruction: Some(Content::text(instruction)),
            generation_config: Some(GenerationConfig {
                response_modalities: Vec::new(),
                temperature: Some(0.0),
            }),
        };

        let response = generate_content(
            &self.client,
            &self.base_url,
            &self.model,
            &self.api_key,
            &request,
        )
        .await?;

        response.first_text().ok_or_else(|| {
            ImageBotError::ProviderError("Gemini text response contained no text".into())
        })
    }
}

/// Secondary image provider, asked for both text and image modalities.
#[derive(Clone)]
pub struct GeminiImageClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiImageClient {
    pub fn new(client: Client, config: &GeminiConfig, api_key: String) -> Self {
        Self {
            client,
            api_key,
            model: config.image_model.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

/// Finds the first image-bearing part across candidates. Text parts of that
/// candidate become the caption, falling back to the prompt.
pub fn extract_image(response: &GenerateContentResponse, prompt: &str) -> AttemptOutcome {
    if response.candidates.is_empty() {
        let detail = match &response.prompt_feedback {
            Some(feedback) => format!("no candidates returned (promptFeedback: {})", feedback),
            None => "no candidates returned".to_string(),
        };
        return AttemptOutcome::Failure(AttemptFailure::new(
            GEMINI_PROVIDER,
            FailureKind::NoCandidates,
            detail,
        ));
    }

    for candidate in &response.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        let image = content
            .parts
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .find(|inline| is_image_mime(&inline.mime_type) && !inline.data.is_empty());

        if let Some(inline) = image {
            let caption = content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();

            return AttemptOutcome::Success(GeneratedImage {
                data: inline.data.clone(),
                mime_type: inline.mime_type.clone(),
                caption: if caption.is_empty() {
                    prompt.to_string()
                } else {
                    caption
                },
                provider: GEMINI_PROVIDER.to_string(),
            });
        }
    }

    let finish_reasons = response
        .candidates
        .iter()
        .filter_map(|c| c.finish_reason.as_deref())
        .collect::<Vec<_>>()
        .join(",");
    AttemptOutcome::Failure(AttemptFailure::new(
        GEMINI_PROVIDER,
        FailureKind::NoImagePart,
        format!("no image part in candidates (finishReason: {})", finish_reasons),
    ))
}

#[async_trait]
impl ImageProvider for GeminiImageClient {
    fn name(&self) -> &str {
        GEMINI_PROVIDER
    }

    async fn attempt(&self, prompt: &str) -> AttemptOutcome {
        let request = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                temperature: None,
            }),
        };

        log::info!("Generating image with Gemini model: {}", self.model);

        match generate_content(
            &self.client,
            &self.base_url,
            &self.model,
            &self.api_key,
            &request,
        )
        .await
        {
            Ok(response) => extract_image(&response, prompt),
            Err(e) => AttemptOutcome::Failure(AttemptFailure::new(
                GEMINI_PROVIDER,
                FailureKind::Upstream,
                e.to_string(),
            )),
        }
    }
}
