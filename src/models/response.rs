use serde::Serialize;
use serde_json::Value;

/// Body returned for every outcome except an authorization failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    Success {
        #[serde(rename = "imageUrl")]
        image_url: String,
        message: String,
        prompt: String,
        #[serde(rename = "generatedImage")]
        generated_image: GeneratedImagePayload,
    },
    Moderated {
        message: String,
        prompt: String,
        #[serde(rename = "moderationFeedback")]
        moderation_feedback: Value,
    },
    Error {
        message: String,
        prompt: String,
        details: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImagePayload {
    pub mime_type: String,
    pub caption: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnauthorizedBody {
    pub error: String,
}

impl Default for UnauthorizedBody {
    fn default() -> Self {
        Self {
            error: "Unauthorized request".to_string(),
        }
    }
}
