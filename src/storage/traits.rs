use crate::{error::Result, models::StoredImage};
use async_trait::async_trait;

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Uploads a `data:<mime>;base64,...` payload and returns its durable URL.
    async fn upload(&self, data_uri: &str, folder: &str, unique_name: &str)
        -> Result<StoredImage>;

    fn name(&self) -> &str;
}
