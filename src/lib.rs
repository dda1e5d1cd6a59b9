pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod moderation;
pub mod notify;
pub mod providers;
pub mod server;
pub mod service;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{CloudinaryConfig, Config, GeminiConfig, ImagenConfig, TelegramConfig};
pub use error::{ImageBotError, Result};
pub use models::{GeneratedImage, GenerationRequest, ModerationVerdict, ResponseEnvelope};
pub use moderation::Moderator;
pub use providers::{ImageProvider, ImageProviderChain, TextModel};
pub use service::{ImageService, PipelineOutcome};
pub use storage::ImageStore;
