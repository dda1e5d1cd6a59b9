use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationVerdict {
    pub safe: bool,
    pub reason: Option<String>,
    /// Raw classifier text, relayed as `moderationFeedback`.
    pub feedback: String,
}

impl ModerationVerdict {
    pub fn safe(feedback: impl Into<String>) -> Self {
        Self {
            safe: true,
            reason: None,
            feedback: feedback.into(),
        }
    }

    pub fn unsafe_with(reason: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
            feedback: feedback.into(),
        }
    }
}
