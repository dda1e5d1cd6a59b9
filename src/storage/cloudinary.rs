use crate::{
    config::{CloudinaryConfig, SignatureAlgorithm},
    error::{ImageBotError, Result},
    models::StoredImage,
    providers::truncate_body,
    storage::traits::ImageStore,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

pub struct CloudinaryStore {
    client: Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    signature_algorithm: SignatureAlgorithm,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
    error: Option<UploadErrorBody>,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    message: String,
}

impl CloudinaryStore {
    pub fn new(config: &CloudinaryConfig, client: Client) -> Result<Self> {
        let cloud_name = config
            .cloud_name
            .clone()
            .ok_or_else(|| ImageBotError::ConfigError("Cloudinary cloud name is required".into()))?;

        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ImageBotError::ConfigError("Cloudinary API key is required".into()))?;

        let api_secret = config.api_secret.clone().ok_or_else(|| {
            ImageBotError::ConfigError("Cloudinary API secret is required".into())
        })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cloud_name,
            api_key,
            api_secret,
            signature_algorithm: config.signature_algorithm,
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", self.base_url, self.cloud_name)
    }

    /// Signs the alphabetically sorted `key=value` params joined by `&`,
    /// with the secret appended. Every form field except `file` and
    /// `api_key` must be in `params`.
    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let payload = format!("{}{}", to_sign, self.api_secret);

        match self.signature_algorithm {
            SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(payload.as_bytes())),
            SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(payload.as_bytes())),
        }
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    async fn upload(&self, data_uri: &str, folder: &str, unique_name: &str) -> Result<StoredImage> {
        let timestamp = Utc::now().timestamp().to_string();
        let signed = [
            ("folder", folder.to_string()),
            ("public_id", unique_name.to_string()),
            ("timestamp", timestamp),
        ];
        let signature = self.sign(&signed);

        let mut form: Vec<(&str, String)> = signed.to_vec();
        form.push(("file", data_uri.to_string()));
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));

        log::info!("Uploading image to Cloudinary: {}/{}", folder, unique_name);

        let response = self
            .client
            .post(self.upload_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| ImageBotError::UploadError(format!("Cloudinary request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ImageBotError::UploadError(format!("Cloudinary response could not be read: {}", e))
        })?;
        let parsed: Option<UploadResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|p| p.error)
                .map(|e| e.message)
                .unwrap_or_else(|| truncate_body(&body));
            return Err(ImageBotError::UploadError(format!(
                "Cloudinary HTTP {}: {}",
                status.as_u16(),
                message
            )));
        }

        let parsed = parsed.ok_or_else(|| {
            ImageBotError::UploadError("Cloudinary returned an unreadable response".into())
        })?;
        let url = parsed.secure_url.ok_or_else(|| {
            ImageBotError::UploadError("Cloudinary response has no secure_url".into())
        })?;

        Ok(StoredImage {
            url,
            public_id: parsed
                .public_id
                .unwrap_or_else(|| format!("{}/{}", folder, unique_name)),
        })
    }

    fn name(&self) -> &str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    fn config() -> CloudinaryConfig {
        CloudinaryConfig::new().with_credentials("demo", "1234", "abcd")
    }

    fn store() -> CloudinaryStore {
        CloudinaryStore::new(&config(), Client::new()).unwrap()
    }

    fn store_at(base_url: &str) -> CloudinaryStore {
        CloudinaryStore::new(&config().with_base_url(base_url), Client::new()).unwrap()
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let result = CloudinaryStore::new(&CloudinaryConfig::new(), Client::new());
        assert!(matches!(result, Err(ImageBotError::ConfigError(_))));
    }

    #[test]
    fn test_upload_url() {
        assert_eq!(
            store().upload_url(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_signature_is_order_independent() {
        let store = store();
        let a = store.sign(&[
            ("timestamp", "1700000000".to_string()),
            ("folder", "bot".to_string()),
        ]);
        let b = store.sign(&[
            ("folder", "bot".to_string()),
            ("timestamp", "1700000000".to_string()),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_sha1_signature_matches_published_example() {
        let actual = store().sign(&[
            ("timestamp", "1315060510".to_string()),
            ("public_id", "sample_image".to_string()),
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string()),
        ]);
        assert_eq!(actual, "bfd09f95f331f558cbd1320e67aa8d488770583e");
    }

    #[test]
    fn test_sha256_signature_when_configured() {
        let store = CloudinaryStore::new(
            &config().with_signature_algorithm(SignatureAlgorithm::Sha256),
            Client::new(),
        )
        .unwrap();
        let expected = hex::encode(Sha256::digest(
            b"folder=bot&public_id=img_1&timestamp=1700000000abcd",
        ));
        let actual = store.sign(&[
            ("public_id", "img_1".to_string()),
            ("timestamp", "1700000000".to_string()),
            ("folder", "bot".to_string()),
        ]);
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_upload_posts_signed_form_and_returns_secure_url() {
        let (base_url, server) = serve_once(
            200,
            r#"{"secure_url":"https://res.cloudinary.com/demo/image/upload/v1/bot/img_1.png","public_id":"bot/img_1"}"#,
        )
        .await;

        let stored = store_at(&base_url)
            .upload("data:image/png;base64,AAAA", "bot", "img_1")
            .await
            .unwrap();
        let request = server.await.unwrap();

        assert_eq!(
            stored.url,
            "https://res.cloudinary.com/demo/image/upload/v1/bot/img_1.png"
        );
        assert_eq!(stored.public_id, "bot/img_1");
        assert!(request.starts_with("POST /demo/image/upload "));
        assert!(request.contains("api_key=1234"));
        assert!(request.contains("public_id=img_1"));
        assert!(request.contains("signature="));
        assert!(!request.contains("signature_algorithm"));
    }

    #[tokio::test]
    async fn test_rejected_upload_carries_cloudinary_message() {
        let (base_url, _server) =
            serve_once(401, r#"{"error":{"message":"Invalid Signature"}}"#).await;

        let result = store_at(&base_url)
            .upload("data:image/png;base64,AAAA", "bot", "img_1")
            .await;

        match result {
            Err(ImageBotError::UploadError(message)) => {
                assert_eq!(message, "Cloudinary HTTP 401: Invalid Signature");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_secure_url_is_upload_error() {
        let (base_url, _server) = serve_once(200, r#"{"public_id":"bot/img_1"}"#).await;

        let result = store_at(&base_url)
            .upload("data:image/png;base64,AAAA", "bot", "img_1")
            .await;

        assert!(matches!(
            result,
            Err(ImageBotError::UploadError(ref m)) if m.contains("secure_url")
        ));
    }
}
