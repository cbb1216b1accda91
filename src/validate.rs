use crate::error::ValidationError;
use crate::models::{FeedbackText, MAX_FEEDBACK_CHARS, MIN_FEEDBACK_CHARS};

/// Previews only run once the cleaned input is longer than this.
pub const PREVIEW_MIN_CHARS: usize = 20;

/// Trims the input and collapses every internal whitespace run to one space.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn validate(raw: &str) -> Result<FeedbackText, ValidationError> {
    let cleaned = normalize(raw);
    let len = cleaned.chars().count();

    if len == 0 {
        return Err(ValidationError::EmptyInput);
    }
    if len < MIN_FEEDBACK_CHARS {
        return Err(ValidationError::TooShort);
    }
    if len > MAX_FEEDBACK_CHARS {
        return Err(ValidationError::TooLong);
    }

    Ok(FeedbackText::from_cleaned(cleaned))
}

pub fn wants_preview(raw: &str) -> bool {
    normalize(raw).chars().count() > PREVIEW_MIN_CHARS
}
