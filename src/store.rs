//! Persistence boundary for assembled reports.
//!
//! The pipeline never writes partial results, so a store only ever sees
//! complete [`ReportAggregate`]s. [`SqliteReportStore`] keeps the full report
//! as JSON alongside a few indexed columns used for listing.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::models::{ReportAggregate, ReportStatus};

/// Listing row; the full report is fetched with [`ReportStore::get`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub id: String,
    pub project_id: String,
    pub original_filename: String,
    pub status: ReportStatus,
    pub compliance_score: Option<f64>,
    pub risk_percentage: Option<f64>,
    pub created_at: String,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, project_id: &str, report: &ReportAggregate) -> Result<()>;

    async fn get(&self, report_id: &str) -> Result<Option<ReportAggregate>>;

    /// Newest first. `None` filters match everything.
    async fn list(
        &self,
        project_id: Option<&str>,
        status: Option<ReportStatus>,
    ) -> Result<Vec<ReportSummary>>;
}

pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    /// Expects the schema from [`crate::migrate::apply`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn save(&self, project_id: &str, report: &ReportAggregate) -> Result<()> {
        if project_id.trim().is_empty() {
            bail!("project id must not be empty");
        }
        let report_json = serde_json::to_string(report)?;
        let result = sqlx::query(
            r#"
            INSERT INTO reports (id, project_id, original_filename, media_type, source_sha256,
                                 extraction_method, status, compliance_score, risk_percentage,
                                 created_at, report_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(project_id)
        .bind(&report.original_filename)
        .bind(&report.media_type)
        .bind(&report.source_sha256)
        .bind(report.extraction_method.as_str())
        .bind(report.status.as_str())
        .bind(report.compliance.as_ref().map(|c| c.compliance_score))
        .bind(report.risk.as_ref().and_then(|r| r.risk_percentage))
        .bind(report.created_at.timestamp_millis())
        .bind(report_json)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save report {}", report.id))?;

        tracing::debug!(report = %report.id, project = project_id, rows = result.rows_affected(), "report saved");
        Ok(())
    }

    async fn get(&self, report_id: &str) -> Result<Option<ReportAggregate>> {
        let row = sqlx::query("SELECT report_json FROM reports WHERE id = ?")
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.get("report_json");
                let report = serde_json::from_str(&json)
                    .with_context(|| format!("Stored report {} is not valid JSON", report_id))?;
                Ok(Some(report))
            }
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        project_id: Option<&str>,
        status: Option<ReportStatus>,
    ) -> Result<Vec<ReportSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, original_filename, status, compliance_score,
                   risk_percentage, created_at
            FROM reports
            WHERE (?1 IS NULL OR project_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(project_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ReportSummary> {
                let status: String = row.get("status");
                let created_at: i64 = row.get("created_at");
                Ok(ReportSummary {
                    id: row.get("id"),
                    project_id: row.get("project_id"),
                    original_filename: row.get("original_filename"),
                    status: status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
                    compliance_score: row.get("compliance_score"),
                    risk_percentage: row.get("risk_percentage"),
                    created_at: format_ts_iso(created_at),
                })
            })
            .collect()
    }
}

/// Milliseconds since epoch as RFC 3339.
fn format_ts_iso(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts_millis.to_string())
}
