use anyhow::Context;
use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Category, FeedbackRecord, RecordFilter, TriageResult, UrgencyScore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now().naive_utc();
    let records = vec![
        (
            "seed-001",
            "The app crashes every time I open settings",
            Category::BugReport,
            4,
            Some(812.0),
            now - Duration::days(1),
        ),
        (
            "seed-002",
            "Please add an option to export reports as PDF",
            Category::FeatureRequest,
            3,
            Some(655.5),
            now - Duration::days(2),
        ),
        (
            "seed-003",
            "Love how fast the new search is",
            Category::Praise,
            1,
            None,
            now - Duration::days(2),
        ),
        (
            "seed-004",
            "Checkout is broken for all customers, fix immediately",
            Category::BugReport,
            5,
            Some(930.2),
            now - Duration::days(3),
        ),
        (
            "seed-005",
            "Where can I find my invoices?",
            Category::GeneralInquiry,
            2,
            Some(498.7),
            now - Duration::days(5),
        ),
    ];

    for (source_key, text, category, urgency, processing_time_ms, created_at) in records {
        sqlx::query(
            r#"
            INSERT INTO feedback_triage.feedback_records
            (feedback_text, category, urgency_score, processing_time_ms, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(text)
        .bind(category.label())
        .bind(urgency)
        .bind(processing_time_ms)
        .bind(created_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn insert_record(
    pool: &PgPool,
    result: &TriageResult,
    processing_time_ms: Option<f64>,
) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO feedback_triage.feedback_records
        (feedback_text, category, urgency_score, processing_time_ms)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(result.feedback_text.as_str())
    .bind(result.category.label())
    .bind(i32::from(result.urgency.value()))
    .bind(processing_time_ms)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

pub fn cutoff(window_days: i64) -> NaiveDateTime {
    Utc::now().naive_utc() - Duration::days(window_days.max(1))
}

pub async fn fetch_records(
    pool: &PgPool,
    filter: &RecordFilter,
) -> anyhow::Result<Vec<FeedbackRecord>> {
    let mut query = String::from(
        "SELECT id, feedback_text, category, urgency_score, created_at, processing_time_ms \
         FROM feedback_triage.feedback_records WHERE TRUE",
    );
    let mut param = 0;
    let mut next_param = || {
        param += 1;
        param
    };

    if filter.window_days.is_some() {
        query.push_str(&format!(" AND created_at >= ${}", next_param()));
    }
    if filter.category.is_some() {
        query.push_str(&format!(" AND category = ${}", next_param()));
    }
    if filter.search_term.is_some() {
        query.push_str(&format!(" AND feedback_text ILIKE ${}", next_param()));
    }
    query.push_str(&format!(
        " ORDER BY created_at DESC LIMIT ${}",
        next_param()
    ));

    let mut rows = sqlx::query(&query);
    if let Some(days) = filter.window_days {
        rows = rows.bind(cutoff(days));
    }
    if let Some(category) = filter.category {
        rows = rows.bind(category.label());
    }
    if let Some(term) = filter.search_term.as_deref() {
        rows = rows.bind(format!("%{}%", term.trim()));
    }
    rows = rows.bind(filter.limit.max(1));

    let fetched = rows.fetch_all(pool).await?;
    debug!(count = fetched.len(), ?filter, "fetched feedback records");

    let mut records = Vec::with_capacity(fetched.len());
    for row in fetched {
        let category: String = row.get("category");
        let urgency: i32 = row.get("urgency_score");
        records.push(FeedbackRecord {
            id: row.get("id"),
            feedback_text: row.get("feedback_text"),
            category: Category::from_label(&category),
            urgency: UrgencyScore::try_from(i64::from(urgency))
                .context("stored urgency score is invalid")?,
            created_at: row.get("created_at"),
            processing_time_ms: row.get("processing_time_ms"),
        });
    }

    Ok(records)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        feedback_text: String,
        category: Category,
        urgency_score: UrgencyScore,
        created_at: NaiveDateTime,
        processing_time_ms: Option<f64>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid row {}", line + 1))?;
        let text = crate::validate::validate(&row.feedback_text)
            .with_context(|| format!("invalid feedback text on row {}", line + 1))?;
        let processing_time_ms = check_processing_time(row.processing_time_ms, line + 1)?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO feedback_triage.feedback_records
            (feedback_text, category, urgency_score, processing_time_ms, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(text.as_str())
        .bind(row.category.label())
        .bind(i32::from(row.urgency_score.value()))
        .bind(processing_time_ms)
        .bind(row.created_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

fn check_processing_time(value: Option<f64>, row: usize) -> anyhow::Result<Option<f64>> {
    match value {
        Some(ms) if ms.is_nan() || ms < 0.0 => {
            anyhow::bail!("row {row}: processing_time_ms must be non-negative, got {ms}")
        }
        other => Ok(other),
    }
}
