pub mod telegram;

use crate::error::Result;
use async_trait::async_trait;

pub use telegram::TelegramNotifier;

/// Chat notification sink. Callers treat failures as log-only.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
    async fn send_photo(&self, chat_id: i64, photo_url: &str, caption: &str) -> Result<()>;
}
