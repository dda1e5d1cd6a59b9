use std::env;
use std::time::Duration;

use crate::error::{ImageBotError, Result};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CLOUDINARY_BASE_URL: &str = "https://api.cloudinary.com/v1_1";
pub const DEFAULT_TELEGRAM_BASE_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct ImagenConfig {
    pub api_keys: Vec<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub image_model: String,
    pub text_model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub folder: String,
    pub base_url: String,
    pub signature_algorithm: SignatureAlgorithm,
}

/// Digest Cloudinary checks upload signatures with. Accounts use SHA-1
/// unless SHA-256 was switched on in their security settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "sha256" | "sha-256" => SignatureAlgorithm::Sha256,
            _ => SignatureAlgorithm::Sha1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub notify: bool,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub enabled: bool,
    pub fail_open: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: Option<u16>,
    pub shared_secret: Option<String>,
    pub imagen: ImagenConfig,
    pub gemini: GeminiConfig,
    pub cloudinary: CloudinaryConfig,
    pub telegram: TelegramConfig,
    pub moderation: ModerationConfig,
    pub expose_upstream_details: bool,
    pub request_timeout: Duration,
}

/// Splits a comma separated key list, dropping blanks and keeping order.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(String::from)
        .collect()
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|val| matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|val| !val.trim().is_empty())
}

impl Default for ImagenConfig {
    fn default() -> Self {
        ImagenConfig {
            api_keys: Vec::new(),
            model: "imagen-3.0-generate-002".to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

impl ImagenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `IMAGEN_API_KEYS` wins over the single `IMAGEN_API_KEY`.
    pub fn from_env() -> Self {
        let api_keys = env_non_empty("IMAGEN_API_KEYS")
            .or_else(|| env_non_empty("IMAGEN_API_KEY"))
            .map(|raw| parse_key_list(&raw))
            .unwrap_or_default();
        let defaults = Self::default();

        ImagenConfig {
            api_keys,
            model: env_non_empty("IMAGEN_MODEL").unwrap_or(defaults.model),
            base_url: env_non_empty("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
        }
    }

    pub fn with_api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            image_model: "gemini-2.0-flash-exp-image-generation".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        GeminiConfig {
            api_key: env_non_empty("GEMINI_API_KEY"),
            image_model: env_non_empty("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            text_model: env_non_empty("GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model),
            base_url: env_non_empty("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        CloudinaryConfig {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            folder: "telegram-bot-images".to_string(),
            base_url: DEFAULT_CLOUDINARY_BASE_URL.to_string(),
            signature_algorithm: SignatureAlgorithm::default(),
        }
    }
}

impl CloudinaryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        CloudinaryConfig {
            cloud_name: env_non_empty("CLOUDINARY_CLOUD_NAME"),
            api_key: env_non_empty("CLOUDINARY_API_KEY"),
            api_secret: env_non_empty("CLOUDINARY_API_SECRET"),
            folder: env_non_empty("CLOUDINARY_FOLDER").unwrap_or(defaults.folder),
            base_url: defaults.base_url,
            signature_algorithm: env_non_empty("CLOUDINARY_SIGNATURE_ALGORITHM")
                .map(|raw| SignatureAlgorithm::parse(&raw))
                .unwrap_or_default(),
        }
    }

    pub fn with_credentials(
        mut self,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        self.cloud_name = Some(cloud_name.into());
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = algorithm;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_complete(&self) -> bool {
        self.cloud_name.is_some() && self.api_key.is_some() && self.api_secret.is_some()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        TelegramConfig {
            bot_token: None,
            notify: false,
            base_url: DEFAULT_TELEGRAM_BASE_URL.to_string(),
        }
    }
}

impl TelegramConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        TelegramConfig {
            bot_token: env_non_empty("TELEGRAM_BOT_TOKEN"),
            notify: env_flag("TELEGRAM_NOTIFY", false),
            base_url: DEFAULT_TELEGRAM_BASE_URL.to_string(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = Some(token.into());
        self.notify = true;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        ModerationConfig {
            enabled: true,
            fail_open: false,
        }
    }
}

impl ModerationConfig {
    pub fn from_env() -> Self {
        ModerationConfig {
            enabled: env_flag("MODERATION_ENABLED", true),
            fail_open: env_flag("MODERATION_FAIL_OPEN", false),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: None,
            shared_secret: None,
            imagen: ImagenConfig::default(),
            gemini: GeminiConfig::default(),
            cloudinary: CloudinaryConfig::default(),
            telegram: TelegramConfig::default(),
            moderation: ModerationConfig::default(),
            expose_upstream_details: false,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());
        let request_timeout = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        Config {
            host: env_non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            shared_secret: env_non_empty("SHARED_SECRET"),
            imagen: ImagenConfig::from_env(),
            gemini: GeminiConfig::from_env(),
            cloudinary: CloudinaryConfig::from_env(),
            telegram: TelegramConfig::from_env(),
            moderation: ModerationConfig::from_env(),
            expose_upstream_details: env_flag("EXPOSE_UPSTREAM_DETAILS", false),
            request_timeout,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = Some(secret.into());
        self
    }

    pub fn with_imagen(mut self, config: ImagenConfig) -> Self {
        self.imagen = config;
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_cloudinary(mut self, config: CloudinaryConfig) -> Self {
        self.cloudinary = config;
        self
    }

    pub fn with_telegram(mut self, config: TelegramConfig) -> Self {
        self.telegram = config;
        self
    }

    pub fn with_moderation(mut self, enabled: bool, fail_open: bool) -> Self {
        self.moderation = ModerationConfig { enabled, fail_open };
        self
    }

    pub fn with_upstream_details(mut self, expose: bool) -> Self {
        self.expose_upstream_details = expose;
        self
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(8080)
    }

    /// Moderation runs only when enabled and a text model credential exists.
    pub fn moderation_active(&self) -> bool {
        self.moderation.enabled && self.gemini.api_key.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.shared_secret.is_none() {
            return Err(ImageBotError::ConfigError(
                "SHARED_SECRET is required".into(),
            ));
        }
        if !self.cloudinary.is_complete() {
            return Err(ImageBotError::ConfigError(
                "Cloudinary cloud name, API key and API secret are required".into(),
            ));
        }
        if self.imagen.api_keys.is_empty() && self.gemini.api_key.is_none() {
            return Err(ImageBotError::ConfigError(
                "At least one image provider credential is required".into(),
            ));
        }
        if self.telegram.notify && self.telegram.bot_token.is_none() {
            return Err(ImageBotError::ConfigError(
                "TELEGRAM_NOTIFY is set but TELEGRAM_BOT_TOKEN is missing".into(),
            ));
        }
        Ok(())
    }
}

/// Shows only the first few characters of a credential.
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}…({} chars)", visible, key.chars().count())
}
