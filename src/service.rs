use crate::{
    config::Config,
    error::{ImageBotError, Result},
    models::{
        GeneratedImage, GeneratedImagePayload, GenerationRequest, ModerationVerdict,
        ResponseEnvelope, StoredImage, UnauthorizedBody,
    },
    moderation::Moderator,
    notify::{Notifier, TelegramNotifier},
    providers::{ImageProviderChain, ProviderClients},
    storage::{unique_image_name, CloudinaryStore, ImageStore},
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Terminal state of one request.
#[derive(Debug)]
pub enum PipelineOutcome {
    Unauthorized,
    Moderated {
        prompt: String,
        chat_id: i64,
        verdict: ModerationVerdict,
    },
    Success {
        prompt: String,
        chat_id: i64,
        image: GeneratedImage,
        stored: StoredImage,
    },
    Failed {
        prompt: String,
        error: ImageBotError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedResponse {
    pub status: u16,
    pub body: Value,
}

/// Authorize, moderate, generate, upload.
#[derive(Clone)]
pub struct ImageService {
    shared_secret: String,
    moderator: Option<Moderator>,
    moderation_fail_open: bool,
    chain: ImageProviderChain,
    store: Arc<dyn ImageStore>,
    folder: String,
    notifier: Option<Arc<dyn Notifier>>,
    expose_upstream_details: bool,
}

impl ImageService {
    pub fn new(
        shared_secret: impl Into<String>,
        chain: ImageProviderChain,
        store: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            shared_secret: shared_secret.into(),
            moderator: None,
            moderation_fail_open: false,
            chain,
            store,
            folder: "telegram-bot-images".to_string(),
            notifier: None,
            expose_upstream_details: false,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let clients = ProviderClients::from_config(config, http.clone());
        let store = Arc::new(CloudinaryStore::new(&config.cloudinary, http.clone())?);
        let secret = config
            .shared_secret
            .clone()
            .ok_or_else(|| ImageBotError::ConfigError("SHARED_SECRET is required".into()))?;

        let mut service = Self::new(secret, clients.chain, store)
            .with_folder(config.cloudinary.folder.clone())
            .with_upstream_details(config.expose_upstream_details);

        if let Some(model) = clients.moderator_model {
            service = service.with_moderator(Moderator::new(model), config.moderation.fail_open);
        } else {
            log::warn!("Prompt moderation is disabled");
        }

        if config.telegram.notify {
            let notifier = TelegramNotifier::new(&config.telegram, http)?;
            service = service.with_notifier(Arc::new(notifier));
        }

        Ok(service)
    }

    pub fn with_moderator(mut self, moderator: Moderator, fail_open: bool) -> Self {
        self.moderator = Some(moderator);
        self.moderation_fail_open = fail_open;
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_upstream_details(mut self, expose: bool) -> Self {
        self.expose_upstream_details = expose;
        self
    }

    pub fn moderation_enabled(&self) -> bool {
        self.moderator.is_some()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.chain.provider_names()
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifier.is_some()
    }

    /// Runs the pipeline, then fires notifications without waiting on them.
    pub async fn handle(&self, request: GenerationRequest) -> ComposedResponse {
        let outcome = self.process(request).await;
        let _ = self.notify_outcome(&outcome);
        self.compose(&outcome)
    }

    pub async fn process(&self, request: GenerationRequest) -> PipelineOutcome {
        let request_id = Uuid::new_v4().to_string();
        log::info!(
            "[req:{}] image request from user {} in chat {}",
            request_id,
            request.user_id,
            request.chat_id
        );

        if request.shared_secret != self.shared_secret {
            log::warn!("[req:{}] rejected: shared secret mismatch", request_id);
            return PipelineOutcome::Unauthorized;
        }

        let GenerationRequest {
            prompt, chat_id, ..
        } = request;

        match self.run_authorized(&prompt, chat_id, &request_id).await {
            Ok(outcome) => outcome,
            Err(error) => {
                log::error!("[req:{}] request failed: {}", request_id, error);
                PipelineOutcome::Failed { prompt, error }
            }
        }
    }

    async fn run_authorized(
        &self,
        prompt: &str,
        chat_id: i64,
        request_id: &str,
    ) -> Result<PipelineOutcome> {
        if prompt.trim().is_empty() {
            return Err(ImageBotError::InvalidRequest("Prompt is required".into()));
        }

        if let Some(moderator) = &self.moderator {
            match moderator.check(prompt).await {
                Ok(verdict) if !verdict.safe => {
                    log::info!(
                        "[req:{}] prompt rejected by moderation: {}",
                        request_id,
                        verdict.reason.as_deref().unwrap_or_default()
                    );
                    return Ok(PipelineOutcome::Moderated {
                        prompt: prompt.to_string(),
                        chat_id,
                        verdict,
                    });
                }
                Ok(_) => log::debug!("[req:{}] prompt passed moderation", request_id),
                Err(e) if self.moderation_fail_open => {
                    log::warn!(
                        "[req:{}] moderation unavailable, continuing unmoderated: {}",
                        request_id,
                        e
                    );
                }
                Err(e) => return Err(ImageBotError::ModerationError(e.to_string())),
            }
        }

        let image = self.chain.generate(prompt, request_id).await?;

        let unique_name = unique_image_name();
        let stored = self
            .store
            .upload(&image.data_uri(), &self.folder, &unique_name)
            .await
            .map_err(|e| match e {
                ImageBotError::UploadError(_) => e,
                other => ImageBotError::UploadError(other.to_string()),
            })?;

        log::info!("[req:{}] image stored at {}", request_id, stored.url);

        Ok(PipelineOutcome::Success {
            prompt: prompt.to_string(),
            chat_id,
            image,
            stored,
        })
    }

    /// Sends the chat notification for an outcome, if a notifier is set.
    pub fn notify_outcome(
        &self,
        outcome: &PipelineOutcome,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let notifier = self.notifier.clone()?;

        match outcome {
            PipelineOutcome::Success {
                chat_id,
                image,
                stored,
                ..
            } => {
                let (chat_id, url, caption) = (*chat_id, stored.url.clone(), image.caption.clone());
                Some(tokio::spawn(async move {
                    if let Err(e) = notifier.send_photo(chat_id, &url, &caption).await {
                        log::warn!("Photo notification to chat {} failed: {}", chat_id, e);
                    }
                }))
            }
            PipelineOutcome::Moderated {
                chat_id, verdict, ..
            } => {
                let chat_id = *chat_id;
                let text = format!(
                    "🚫 {}",
                    verdict.reason.clone().unwrap_or_default()
                );
                Some(tokio::spawn(async move {
                    if let Err(e) = notifier.send_message(chat_id, &text).await {
                        log::warn!("Moderation notification to chat {} failed: {}", chat_id, e);
                    }
                }))
            }
            _ => None,
        }
    }

    pub fn compose(&self, outcome: &PipelineOutcome) -> ComposedResponse {
        match outcome {
            PipelineOutcome::Unauthorized => ComposedResponse {
                status: 401,
                body: to_value(&UnauthorizedBody::default()),
            },
            PipelineOutcome::Moderated {
                prompt, verdict, ..
            } => ComposedResponse {
                status: 200,
                body: to_value(&ResponseEnvelope::Moderated {
                    message: verdict.reason.clone().unwrap_or_default(),
                    prompt: prompt.clone(),
                    moderation_feedback: Value::String(verdict.feedback.clone()),
                }),
            },
            PipelineOutcome::Success {
                prompt,
                image,
                stored,
                ..
            } => ComposedResponse {
                status: 200,
                body: to_value(&ResponseEnvelope::Success {
                    image_url: stored.url.clone(),
                    message: image.caption.clone(),
                    prompt: prompt.clone(),
                    generated_image: GeneratedImagePayload {
                        mime_type: image.mime_type.clone(),
                        caption: image.caption.clone(),
                        image_url: stored.url.clone(),
                    },
                }),
            },
            PipelineOutcome::Failed { prompt, error } => ComposedResponse {
                status: match error {
                    ImageBotError::InvalidRequest(_) => 400,
                    ImageBotError::Unauthorized => 401,
                    _ => 500,
                },
                body: to_value(&ResponseEnvelope::Error {
                    message: error.public_message(),
                    prompt: prompt.clone(),
                    details: error_details(error, self.expose_upstream_details),
                }),
            },
        }
    }
}

fn to_value<T: serde::Serialize>(body: &T) -> Value {
    serde_json::to_value(body)
        .unwrap_or_else(|e| json!({ "status": "error", "message": e.to_string() }))
}

fn error_category(error: &ImageBotError) -> &'static str {
    match error {
        ImageBotError::ConfigError(_) => "config_error",
        ImageBotError::Unauthorized => "unauthorized",
        ImageBotError::InvalidRequest(_) => "invalid_request",
        ImageBotError::ModerationError(_) => "moderation_failed",
        ImageBotError::ProviderError(_) => "provider_error",
        ImageBotError::ProviderChainExhausted(_) => "generation_failed",
        ImageBotError::UploadError(_) => "upload_failed",
        ImageBotError::HttpError(_) => "http_error",
        ImageBotError::SerializationError(_) => "serialization_error",
        ImageBotError::InternalError(_) => "internal_error",
    }
}

/// Failure kinds and storage errors are always reported; provider text only
/// when `expose` is set.
pub fn error_details(error: &ImageBotError, expose: bool) -> Value {
    let mut details = json!({ "reason": error_category(error) });

    if let ImageBotError::ProviderChainExhausted(failures) = error {
        let attempts: Vec<Value> = failures
            .iter()
            .map(|f| {
                if expose {
                    json!({ "provider": f.provider, "kind": f.kind, "detail": f.detail })
                } else {
                    json!({ "provider": f.provider, "kind": f.kind })
                }
            })
            .collect();
        details["attempts"] = Value::Array(attempts);
    }

    match error {
        ImageBotError::UploadError(message) => {
            details["error"] = Value::String(message.clone());
        }
        _ if expose => details["error"] = Value::String(error.to_string()),
        _ => {}
    }

    details
}
