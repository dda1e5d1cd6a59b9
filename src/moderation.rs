use crate::{error::Result, models::ModerationVerdict, providers::TextModel};
use std::sync::Arc;

pub const SAFETY_INSTRUCTION: &str = "You are a content moderator for an image generation bot. \
Decide whether the user's prompt is appropriate for generating an image. \
Reject prompts asking for sexual content involving minors, explicit sexual content, \
graphic violence or gore, hate symbols or harassment of real people, self-harm, \
or instructions for illegal activity. \
Reply with exactly one line: `SAFE` if the prompt is acceptable, \
or `UNSAFE: <short reason>` if it is not.";

pub const DEFAULT_REJECTION_REASON: &str =
    "Your prompt was flagged as inappropriate and cannot be processed.";

/// Classifies prompts through a text model.
#[derive(Clone)]
pub struct Moderator {
    model: Arc<dyn TextModel>,
}

impl Moderator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub async fn check(&self, prompt: &str) -> Result<ModerationVerdict> {
        let raw = self.model.generate(SAFETY_INSTRUCTION, prompt).await?;
        Ok(parse_verdict(&raw))
    }
}

/// Only a reply starting with `UNSAFE` (any case) rejects; anything else passes.
pub fn parse_verdict(raw: &str) -> ModerationVerdict {
    let trimmed = raw.trim_start();
    let is_unsafe = trimmed
        .get(..6)
        .map(|head| head.eq_ignore_ascii_case("unsafe"))
        .unwrap_or(false);

    if !is_unsafe {
        return ModerationVerdict::safe(raw.trim());
    }

    let reason = trimmed[6..]
        .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
        .trim();
    let reason = if reason.is_empty() {
        DEFAULT_REJECTION_REASON.to_string()
    } else {
        reason.to_string()
    };

    ModerationVerdict::unsafe_with(reason, raw.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_reply() {
        let verdict = parse_verdict("SAFE");
        assert!(verdict.safe);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_unsafe_any_case_with_reason() {
        let verdict = parse_verdict("  unSafe: depicts graphic violence\n");
        assert!(!verdict.safe);
        assert_eq!(verdict.reason.as_deref(), Some("depicts graphic violence"));
        assert_eq!(verdict.feedback, "unSafe: depicts graphic violence");
    }

    #[test]
    fn test_bare_unsafe_gets_default_reason() {
        let verdict = parse_verdict("UNSAFE");
        assert!(!verdict.safe);
        assert_eq!(verdict.reason.as_deref(), Some(DEFAULT_REJECTION_REASON));
    }

    #[test]
    fn test_unrecognized_reply_is_accepted() {
        assert!(parse_verdict("I think this is fine").safe);
        assert!(parse_verdict("").safe);
        assert!(parse_verdict("SAFE - a landscape").safe);
    }

    #[test]
    fn test_multibyte_prefix_does_not_panic() {
        assert!(parse_verdict("ünsafe").safe);
    }
}
