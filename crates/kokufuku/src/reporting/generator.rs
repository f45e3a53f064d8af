use crate::aggregate::{MAX_SCORE, PERCENTAGE, SCORE, SUBJECT, TOPIC};
use crate::canonicalize::CanonicalizationReport;
use crate::error::Result;
use crate::session::Analysis;
use crate::types::{IngestReport, SubjectSummaryRow, SummaryRow};
use chrono::Local;
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// Report Types
// ============================================================================

/// Everything one analysis run produced, for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub target_school: String,
    pub exam_date: String,
    pub ingest: IngestReport,
    pub by_topic: Vec<SummaryRow>,
    pub by_subject: Vec<SubjectSummaryRow>,
    pub priority: Vec<SummaryRow>,
    pub canonicalization: CanonicalizationReport,
}

impl AnalysisReport {
    pub fn new(
        ingest: IngestReport,
        analysis: Analysis,
        target_school: &str,
        exam_date: chrono::NaiveDate,
    ) -> Self {
        Self {
            generated_at: Local::now().to_rfc3339(),
            target_school: target_school.to_string(),
            exam_date: exam_date.to_string(),
            ingest,
            by_topic: analysis.summary.by_topic,
            by_subject: analysis.summary.by_subject,
            priority: analysis.priority,
            canonicalization: analysis.canonicalization,
        }
    }
}

// ============================================================================
// Report Generator
// ============================================================================

/// Writes summary tables and reports under an output directory.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Frame for the `(subject, topic)` table.
    pub fn topic_frame(rows: &[SummaryRow]) -> PolarsResult<DataFrame> {
        df!(
            SUBJECT => rows.iter().map(|r| r.subject.as_str()).collect::<Vec<_>>(),
            TOPIC => rows.iter().map(|r| r.topic.as_str()).collect::<Vec<_>>(),
            SCORE => rows.iter().map(|r| r.score).collect::<Vec<_>>(),
            MAX_SCORE => rows.iter().map(|r| r.max_score).collect::<Vec<_>>(),
            PERCENTAGE => rows.iter().map(|r| r.percentage).collect::<Vec<_>>()
        )
    }

    /// Frame for the per-subject table.
    pub fn subject_frame(rows: &[SubjectSummaryRow]) -> PolarsResult<DataFrame> {
        df!(
            SUBJECT => rows.iter().map(|r| r.subject.as_str()).collect::<Vec<_>>(),
            SCORE => rows.iter().map(|r| r.score).collect::<Vec<_>>(),
            MAX_SCORE => rows.iter().map(|r| r.max_score).collect::<Vec<_>>(),
            PERCENTAGE => rows.iter().map(|r| r.percentage).collect::<Vec<_>>()
        )
    }

    /// Write `topic_summary.csv` and `subject_summary.csv`.
    pub fn write_summary_csv(
        &self,
        by_topic: &[SummaryRow],
        by_subject: &[SubjectSummaryRow],
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)?;

        let topic_path = self.output_dir.join("topic_summary.csv");
        write_csv(&mut Self::topic_frame(by_topic)?, &topic_path)?;

        let subject_path = self.output_dir.join("subject_summary.csv");
        write_csv(&mut Self::subject_frame(by_subject)?, &subject_path)?;

        info!("Summary tables saved to {}", self.output_dir.display());
        Ok(vec![topic_path, subject_path])
    }

    /// Write the report as pretty JSON to `report.json`.
    pub fn write_report_json(&self, report: &AnalysisReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join("report.json");
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }
}

fn write_csv(frame: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(frame)?;
    Ok(())
}
