use serde::Serialize;

use crate::models::{Category, FeedbackText, UrgencyScore};

/// Advisory triage computed locally while the user is still typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub category: Category,
    pub urgency: UrgencyScore,
}

/// A local stand-in for the authoritative classifier.
pub trait PreviewModel: Send + Sync {
    /// Takes normalized text of any length; previews also run on input too
    /// long to submit.
    fn classify_text(&self, text: &str) -> Preview;

    fn classify_preview(&self, text: &FeedbackText) -> Preview {
        self.classify_text(text.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub keywords: &'static [&'static str],
    pub category: Category,
    pub urgency: UrgencyScore,
}

impl KeywordRule {
    pub fn matches(&self, lowercase: &str) -> bool {
        self.keywords.iter().any(|keyword| lowercase.contains(keyword))
    }
}

/// Evaluated top to bottom, first match wins.
pub const CATEGORY_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["bug", "error", "crash", "broken"],
        category: Category::BugReport,
        urgency: UrgencyScore::of(4),
    },
    KeywordRule {
        keywords: &["feature", "request", "add", "improve"],
        category: Category::FeatureRequest,
        urgency: UrgencyScore::of(3),
    },
    KeywordRule {
        keywords: &["love", "great", "awesome", "good"],
        category: Category::Praise,
        urgency: UrgencyScore::of(1),
    },
];

pub const FALLBACK_RULE: KeywordRule = KeywordRule {
    keywords: &[],
    category: Category::GeneralInquiry,
    urgency: UrgencyScore::of(2),
};

/// Forces urgency to the maximum whatever category matched.
pub const URGENCY_OVERRIDE: &[&str] = &["urgent", "critical", "immediately"];

#[derive(Debug, Clone, Copy)]
pub struct KeywordClassifier {
    rules: &'static [KeywordRule],
    fallback: KeywordRule,
    override_keywords: &'static [&'static str],
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            rules: CATEGORY_RULES,
            fallback: FALLBACK_RULE,
            override_keywords: URGENCY_OVERRIDE,
        }
    }
}

impl PreviewModel for KeywordClassifier {
    fn classify_text(&self, text: &str) -> Preview {
        let lowercase = text.to_lowercase();
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.matches(&lowercase))
            .unwrap_or(&self.fallback);

        let urgency = if self
            .override_keywords
            .iter()
            .any(|keyword| lowercase.contains(keyword))
        {
            UrgencyScore::MAX
        } else {
            rule.urgency
        };

        Preview {
            category: rule.category,
            urgency,
        }
    }
}

pub fn classify_preview(text: &FeedbackText) -> Preview {
    KeywordClassifier::default().classify_preview(text)
}
