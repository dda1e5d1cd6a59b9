use crate::{
    config::TelegramConfig,
    error::{ImageBotError, Result},
    notify::Notifier,
    providers::truncate_body,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// Telegram caps photo captions at 1024 characters.
const MAX_CAPTION_CHARS: usize = 1024;

pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, client: Client) -> Result<Self> {
        let token = config
            .bot_token
            .clone()
            .ok_or_else(|| ImageBotError::ConfigError("Telegram bot token is required".into()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call(&self, method: &str, payload: serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            Err(ImageBotError::ProviderError(format!(
                "Telegram {} failed with HTTP {}: {}",
                method,
                status,
                truncate_body(&body)
            )))
        }
    }
}

fn clip_caption(caption: &str) -> String {
    caption.chars().take(MAX_CAPTION_CHARS).collect()
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> Result<()> {
        self.call(
            "sendPhoto",
            json!({
                "chat_id": chat_id,
                "photo": photo_url,
                "caption": clip_caption(caption)
            }),
        )
        .await
    }
}
