use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregate::DashboardSummary;
use crate::models::Category;

pub fn build_report(
    category: Option<Category>,
    cutoff: NaiveDate,
    summary: &DashboardSummary,
) -> String {
    let mut output = String::new();
    let scope_label = category.map(Category::label).unwrap_or("all categories");

    let _ = writeln!(output, "# Feedback Triage Report");
    let _ = writeln!(
        output,
        "Generated for {} (feedback since {}, {} days)",
        scope_label, cutoff, summary.window_days
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total feedback: {}", summary.total_count);
    let _ = writeln!(output, "- Urgent (4-5): {}", summary.urgent_count());
    let _ = writeln!(output, "- Average per day: {}", summary.avg_daily());
    let _ = writeln!(
        output,
        "- Average processing time: {:.0} ms",
        summary.avg_processing_time_ms
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Category Mix");

    let shares = summary.category_shares();
    if shares.is_empty() {
        let _ = writeln!(output, "No feedback recorded for this window.");
    } else {
        for share in shares.iter() {
            let _ = writeln!(
                output,
                "- {}: {} ({:.1}%)",
                share.category, share.count, share.percentage
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Urgency");
    for (score, count) in summary.urgency_distribution.iter() {
        let _ = writeln!(
            output,
            "- Level {} ({}): {}",
            score,
            score.label(),
            count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Trend");

    if summary.daily_trend.is_empty() {
        let _ = writeln!(output, "No feedback recorded for this window.");
    } else {
        for point in summary.daily_trend.iter() {
            let _ = writeln!(
                output,
                "- {}: {} (running avg {:.1})",
                point.date.format("%b %d"),
                point.count,
                point.moving_average
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Urgent Feedback");

    if summary.urgent_feedback.is_empty() {
        let _ = writeln!(output, "Nothing urgent in this window.");
    } else {
        for record in summary.urgent_feedback.iter() {
            let _ = writeln!(
                output,
                "- [{}] {} on {}: {}",
                record.urgency.label(),
                record.category,
                record.created_at.date(),
                record.feedback_text
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::summarize;
    use crate::models::{FeedbackRecord, UrgencyScore};
    use chrono::NaiveDateTime;

    fn record(id: i64, category: Category, urgency: u8, text: &str) -> FeedbackRecord {
        FeedbackRecord {
            id,
            feedback_text: text.to_string(),
            category,
            urgency: UrgencyScore::new(urgency).unwrap(),
            created_at: NaiveDateTime::parse_from_str("2026-02-01 09:00", "%Y-%m-%d %H:%M")
                .unwrap(),
            processing_time_ms: Some(850.0),
        }
    }

    #[test]
    fn report_lists_sections() {
        let records = vec![
            record(1, Category::BugReport, 5, "Checkout is broken"),
            record(2, Category::BugReport, 3, "Typo on the error page"),
            record(3, Category::Praise, 1, "Love the new layout"),
        ];
        let summary = summarize(&records, 30);
        let cutoff = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let report = build_report(None, cutoff, &summary);

        assert!(report.contains("Generated for all categories (feedback since 2026-01-02, 30 days)"));
        assert!(report.contains("- Total feedback: 3"));
        assert!(report.contains("- Bug Report: 2 (66.7%)"));
        assert!(report.contains("- Level 5 (Critical): 1"));
        assert!(report.contains("- Feb 01: 3 (running avg 3.0)"));
        assert!(report.contains("- [Critical] Bug Report on 2026-02-01: Checkout is broken"));
    }

    #[test]
    fn empty_report_has_placeholders() {
        let summary = summarize(&[], 7);
        let cutoff = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let report = build_report(Some(Category::Praise), cutoff, &summary);

        assert!(report.contains("Generated for Praise/Positive Feedback"));
        assert!(report.contains("No feedback recorded for this window."));
        assert!(report.contains("Nothing urgent in this window."));
        assert!(report.contains("- Level 1 (Not Urgent): 0"));
    }
}
