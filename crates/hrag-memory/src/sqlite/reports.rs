use serde::Serialize;

use super::SqliteStore;
use crate::error::MemoryError;
use crate::types::ReportId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ReportRow {
    pub id: ReportId,
    pub topic: String,
    pub report_content: String,
    pub status: String,
    pub created_at: String,
}

/// Report listing entry, without the Markdown body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ReportSummary {
    pub id: ReportId,
    pub topic: String,
    pub status: String,
    pub created_at: String,
}

impl SqliteStore {
    /// Persist a finished research report and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn save_report(
        &self,
        topic: &str,
        report_content: &str,
        status: &str,
    ) -> Result<ReportId, MemoryError> {
        let row: (ReportId,) = sqlx::query_as(
            "INSERT INTO research_reports (topic, report_content, status) \
             VALUES (?, ?, ?) RETURNING id",
        )
        .bind(topic)
        .bind(report_content)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Most recent reports first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_reports(&self, limit: u32) -> Result<Vec<ReportSummary>, MemoryError> {
        let rows: Vec<ReportSummary> = sqlx::query_as(
            "SELECT id, topic, status, created_at FROM research_reports \
             ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_report(&self, id: ReportId) -> Result<Option<ReportRow>, MemoryError> {
        let row: Option<ReportRow> = sqlx::query_as(
            "SELECT id, topic, report_content, status, created_at \
             FROM research_reports WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
