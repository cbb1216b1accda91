use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Category, FeedbackRecord, UrgencyScore};

pub const URGENT_FEEDBACK_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: usize,
    pub moving_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_count: usize,
    pub category_distribution: BTreeMap<Category, usize>,
    pub urgency_distribution: BTreeMap<UrgencyScore, usize>,
    pub daily_trend: Vec<TrendPoint>,
    pub avg_processing_time_ms: f64,
    pub urgent_feedback: Vec<FeedbackRecord>,
    pub window_days: i64,
}

impl DashboardSummary {
    pub fn category_shares(&self) -> Vec<CategoryShare> {
        self.category_distribution
            .iter()
            .map(|(&category, &count)| CategoryShare {
                category,
                count,
                percentage: percentage(count, self.total_count),
            })
            .collect()
    }

    pub fn urgency_percentage(&self, score: UrgencyScore) -> f64 {
        let count = self.urgency_distribution.get(&score).copied().unwrap_or(0);
        percentage(count, self.total_count)
    }

    /// Records scored 4 or 5.
    pub fn urgent_count(&self) -> usize {
        self.urgency_distribution
            .iter()
            .filter(|(score, _)| score.is_urgent())
            .map(|(_, count)| count)
            .sum()
    }

    pub fn avg_daily(&self) -> i64 {
        (self.total_count as f64 / self.window_days.max(1) as f64).round() as i64
    }
}

/// `100 * count / max(total, 1)`, rounded to one decimal place.
pub fn percentage(count: usize, total: usize) -> f64 {
    let raw = 100.0 * count as f64 / total.max(1) as f64;
    (raw * 10.0).round() / 10.0
}

/// Builds the dashboard view of `records`. The caller is expected to have
/// already filtered them to the window; nothing here reads the clock.
pub fn summarize(records: &[FeedbackRecord], window_days: i64) -> DashboardSummary {
    let mut category_distribution = BTreeMap::new();
    let mut urgency_distribution: BTreeMap<UrgencyScore, usize> =
        UrgencyScore::all().map(|score| (score, 0)).collect();
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut processing_total = 0.0;
    let mut processing_count = 0usize;

    for record in records {
        *category_distribution.entry(record.category).or_insert(0) += 1;
        *urgency_distribution.entry(record.urgency).or_insert(0) += 1;
        *per_day.entry(record.created_at.date()).or_insert(0) += 1;

        if let Some(ms) = record.processing_time_ms {
            processing_total += ms;
            processing_count += 1;
        }
    }

    DashboardSummary {
        total_count: records.len(),
        category_distribution,
        urgency_distribution,
        daily_trend: daily_trend(&per_day),
        avg_processing_time_ms: if processing_count == 0 {
            0.0
        } else {
            processing_total / processing_count as f64
        },
        urgent_feedback: most_urgent(records, URGENT_FEEDBACK_LIMIT),
        window_days,
    }
}

/// Each point carries the running mean of all counts up to and including it.
fn daily_trend(per_day: &BTreeMap<NaiveDate, usize>) -> Vec<TrendPoint> {
    let mut running = 0usize;
    per_day
        .iter()
        .enumerate()
        .map(|(index, (&date, &count))| {
            running += count;
            TrendPoint {
                date,
                count,
                moving_average: running as f64 / (index + 1) as f64,
            }
        })
        .collect()
}

pub fn most_urgent(records: &[FeedbackRecord], limit: usize) -> Vec<FeedbackRecord> {
    let mut urgent: Vec<FeedbackRecord> = records
        .iter()
        .filter(|record| record.urgency.is_urgent())
        .cloned()
        .collect();
    urgent.sort_by(|a, b| {
        b.urgency
            .cmp(&a.urgency)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    urgent.truncate(limit);
    urgent
}
