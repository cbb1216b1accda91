use chrono::NaiveDate;

use crate::models::FeedbackRecord;

pub const CSV_HEADER: &str = "Feedback,Category,Urgency,Date";

// Quote characters inside the feedback text or category are written as-is,
// so a text containing `"` produces a row other CSV readers will misparse.
pub fn to_csv(records: &[FeedbackRecord]) -> String {
    let rows: Vec<String> = records
        .iter()
        .map(|record| {
            format!(
                "\"{}\",\"{}\",\"{}\",\"{}\"",
                record.feedback_text,
                record.category,
                record.urgency,
                record.created_at.format("%Y-%m-%dT%H:%M:%S")
            )
        })
        .collect();

    format!("{CSV_HEADER}\n{}", rows.join("\n"))
}

pub fn suggested_filename(today: NaiveDate) -> String {
    format!("feedback-data-{}.csv", today.format("%Y-%m-%d"))
}
