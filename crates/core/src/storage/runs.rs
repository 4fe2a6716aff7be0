use crate::scrape::orchestrator::{RunReport, RunState};
use anyhow::Context;
use uuid::Uuid;

pub async fn record_scrape_run(
    pool: &sqlx::PgPool,
    report: &RunReport,
    strategy: &str,
    error: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let status = match report.state {
        RunState::Done => "done",
        _ => "failed",
    };
    let summary = serde_json::to_value(&report.cities).context("serialize run summary failed")?;
    let records_emitted =
        i32::try_from(report.records_emitted()).context("records_emitted overflows INT")?;

    sqlx::query(
        "INSERT INTO scrape_runs (id, hotel_name, strategy, started_at, finished_at, status, records_emitted, summary, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .persistent(false)
    .bind(id)
    .bind(&report.hotel_name)
    .bind(strategy)
    .bind(report.started_at)
    .bind(report.finished_at)
    .bind(status)
    .bind(records_emitted)
    .bind(summary)
    .bind(error)
    .execute(pool)
    .await
    .context("insert scrape_runs failed")?;

    Ok(id)
}
