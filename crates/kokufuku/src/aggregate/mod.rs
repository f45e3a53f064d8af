//! Score aggregation.
//!
//! Records are loaded into a polars [`DataFrame`] and grouped lazily; the
//! percentage column is guarded so an empty denominator yields `0.0`.
//! Rows enter the frame in a canonical order and summed scores are rounded,
//! so the result does not depend on input order.

use crate::error::Result;
use crate::types::{AnalysisSummary, ScoreRecord, SubjectSummaryRow, SummaryRow};
use crate::utils::{round1, round_total};
use polars::prelude::*;
use tracing::debug;

pub const SUBJECT: &str = "subject";
pub const TOPIC: &str = "topic";
pub const SCORE: &str = "score";
pub const MAX_SCORE: &str = "max_score";
pub const PERCENTAGE: &str = "percentage";

/// Build a frame with one row per record (subject, canonical topic, score, max score).
///
/// Rows are sorted by all four columns.
pub fn records_to_frame<'r>(
    records: impl IntoIterator<Item = &'r ScoreRecord>,
) -> PolarsResult<DataFrame> {
    let mut records: Vec<&ScoreRecord> = records.into_iter().collect();
    records.sort_by(|a, b| {
        (&a.subject, &a.topic_canonical)
            .cmp(&(&b.subject, &b.topic_canonical))
            .then(a.score.total_cmp(&b.score))
            .then(a.max_score.total_cmp(&b.max_score))
    });

    let mut subjects: Vec<String> = Vec::new();
    let mut topics: Vec<String> = Vec::new();
    let mut scores: Vec<f64> = Vec::new();
    let mut max_scores: Vec<f64> = Vec::new();

    for record in records {
        subjects.push(record.subject.clone());
        topics.push(record.topic_canonical.clone());
        scores.push(record.score);
        max_scores.push(record.max_score);
    }

    df!(
        SUBJECT => subjects,
        TOPIC => topics,
        SCORE => scores,
        MAX_SCORE => max_scores
    )
}

fn percentage_expr() -> Expr {
    when(col(MAX_SCORE).gt(lit(0.0)))
        .then(col(SCORE) / col(MAX_SCORE) * lit(100.0))
        .otherwise(lit(0.0))
        .alias(PERCENTAGE)
}

fn group_scores(frame: &DataFrame, keys: &[&str]) -> PolarsResult<DataFrame> {
    let key_exprs: Vec<Expr> = keys.iter().map(|key| col(*key)).collect();
    frame
        .clone()
        .lazy()
        .group_by(key_exprs)
        .agg([col(SCORE).sum(), col(MAX_SCORE).sum()])
        .with_column(percentage_expr())
        .collect()
}

fn str_values(frame: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    Ok(frame
        .column(name)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect())
}

fn f64_values(frame: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let series = frame
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|value| value.unwrap_or(0.0))
        .collect())
}

/// Stateless aggregator over score records.
pub struct Aggregator;

impl Aggregator {
    /// Compute the `(subject, topic)` and per-subject summary tables.
    pub fn summarize<'r>(
        records: impl IntoIterator<Item = &'r ScoreRecord>,
    ) -> Result<AnalysisSummary> {
        let frame = records_to_frame(records)?;
        if frame.height() == 0 {
            return Ok(AnalysisSummary::default());
        }

        let by_topic = Self::topic_rows(&frame)?;
        let by_subject = Self::subject_rows(&frame)?;
        debug!(
            "Aggregated {} records into {} topic rows / {} subject rows",
            frame.height(),
            by_topic.len(),
            by_subject.len()
        );

        Ok(AnalysisSummary {
            by_topic,
            by_subject,
        })
    }

    fn topic_rows(frame: &DataFrame) -> Result<Vec<SummaryRow>> {
        let grouped = group_scores(frame, &[SUBJECT, TOPIC])?;
        let subjects = str_values(&grouped, SUBJECT)?;
        let topics = str_values(&grouped, TOPIC)?;
        let scores = f64_values(&grouped, SCORE)?;
        let max_scores = f64_values(&grouped, MAX_SCORE)?;
        let percentages = f64_values(&grouped, PERCENTAGE)?;

        let mut rows: Vec<SummaryRow> = subjects
            .into_iter()
            .zip(topics)
            .zip(scores.into_iter().zip(max_scores).zip(percentages))
            .map(|((subject, topic), ((score, max_score), percentage))| SummaryRow {
                subject,
                topic,
                score: round_total(score),
                max_score: round_total(max_score),
                percentage: round1(percentage),
            })
            .collect();

        rows.sort_by(|a, b| (&a.subject, &a.topic).cmp(&(&b.subject, &b.topic)));
        Ok(rows)
    }

    fn subject_rows(frame: &DataFrame) -> Result<Vec<SubjectSummaryRow>> {
        let grouped = group_scores(frame, &[SUBJECT])?;
        let subjects = str_values(&grouped, SUBJECT)?;
        let scores = f64_values(&grouped, SCORE)?;
        let max_scores = f64_values(&grouped, MAX_SCORE)?;
        let percentages = f64_values(&grouped, PERCENTAGE)?;

        let mut rows: Vec<SubjectSummaryRow> = subjects
            .into_iter()
            .zip(scores.into_iter().zip(max_scores).zip(percentages))
            .map(|(subject, ((score, max_score), percentage))| SubjectSummaryRow {
                subject,
                score: round_total(score),
                max_score: round_total(max_score),
                percentage: round1(percentage),
            })
            .collect();

        rows.sort_by(|a, b| a.subject.cmp(&b.subject));
        Ok(rows)
    }
}

/// Weakest topics first, at most `limit` rows.
///
/// The sort is stable, so rows with equal percentages keep their key order.
pub fn priority_review(rows: &[SummaryRow], limit: usize) -> Vec<SummaryRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));
    sorted.truncate(limit);
    sorted
}
