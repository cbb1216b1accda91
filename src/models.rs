use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MIN_FEEDBACK_CHARS: usize = 3;
pub const MAX_FEEDBACK_CHARS: usize = 1000;

/// Normalized feedback text. Only `validate::validate` builds one, so the
/// length and whitespace invariants always hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FeedbackText(String);

impl FeedbackText {
    pub(crate) fn from_cleaned(cleaned: String) -> Self {
        Self(cleaned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for FeedbackText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FeedbackText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        crate::validate::validate(&raw).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<&str> for FeedbackText {
    type Error = ValidationError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        crate::validate::validate(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Category {
    BugReport,
    FeatureRequest,
    Praise,
    GeneralInquiry,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::BugReport,
        Category::FeatureRequest,
        Category::Praise,
        Category::GeneralInquiry,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::BugReport => "Bug Report",
            Category::FeatureRequest => "Feature Request",
            Category::Praise => "Praise/Positive Feedback",
            Category::GeneralInquiry => "General Inquiry",
        }
    }

    /// Unknown labels degrade to `GeneralInquiry`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(label))
            .unwrap_or(Category::GeneralInquiry)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from_label(&value)
    }
}

impl From<Category> for &'static str {
    fn from(value: Category) -> Self {
        value.label()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct UrgencyScore(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("urgency score {0} is outside 1..=5")]
pub struct UrgencyOutOfRange(pub i64);

impl UrgencyScore {
    pub const MIN: UrgencyScore = UrgencyScore(1);
    pub const MAX: UrgencyScore = UrgencyScore(5);

    /// For constant tables; an out-of-range value fails const evaluation.
    pub const fn of(value: u8) -> Self {
        assert!(value >= 1 && value <= 5, "urgency score must be within 1..=5");
        UrgencyScore(value)
    }

    pub fn new(value: u8) -> Result<Self, UrgencyOutOfRange> {
        Self::try_from(i64::from(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = UrgencyScore> {
        (Self::MIN.0..=Self::MAX.0).map(UrgencyScore)
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Not Urgent",
            2 => "Low",
            3 => "Medium",
            4 => "High",
            _ => "Critical",
        }
    }

    pub fn is_urgent(self) -> bool {
        self.0 >= 4
    }
}

impl TryFrom<i64> for UrgencyScore {
    type Error = UrgencyOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1..=5 => Ok(UrgencyScore(value as u8)),
            _ => Err(UrgencyOutOfRange(value)),
        }
    }
}

impl From<UrgencyScore> for u8 {
    fn from(value: UrgencyScore) -> Self {
        value.0
    }
}

impl fmt::Display for UrgencyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageResult {
    pub feedback_text: FeedbackText,
    pub category: Category,
    #[serde(rename = "urgency_score")]
    pub urgency: UrgencyScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub feedback_text: String,
    pub category: Category,
    #[serde(rename = "urgency_score")]
    pub urgency: UrgencyScore,
    pub created_at: NaiveDateTime,
    pub processing_time_ms: Option<f64>,
}

/// Parameters for fetching historical records from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub window_days: Option<i64>,
    pub category: Option<Category>,
    pub search_term: Option<String>,
    pub limit: i64,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            window_days: None,
            category: None,
            search_term: None,
            limit: 100,
        }
    }
}
