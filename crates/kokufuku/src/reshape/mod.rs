//! Score sheet reshaping.
//!
//! Exported score sheets are human oriented: a title block, then a table
//! whose header cell contains `大問` or `内容`, usually with attributes running
//! down the first column and one question per column. This module turns such a
//! sheet into one [`ScoreRecord`] per graded sub-question:
//!
//! 1. Decode (UTF-8, then Shift_JIS)
//! 2. Locate the first header-marker row and the leftmost marker cell
//! 3. Cut the block below/right of it and transpose if needed
//! 4. Promote the first row to labels (trimmed, de-duplicated)
//! 5. Drop blank trailer rows, coerce scores, tag the subject

mod decode;
mod grid;
mod subject;

pub use subject::{SubjectMatch, resolve_subject};

use crate::config::AnalysisConfig;
use crate::error::{KokufukuError, Result};
use crate::types::ScoreRecord;
use crate::utils::coerce_score;
use grid::LabelledBlock;
use tracing::debug;

/// Converts raw uploads into score records according to an [`AnalysisConfig`].
pub struct Reshaper<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> Reshaper<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Reshape one uploaded file.
    ///
    /// An empty vector is a valid result (a sheet with a header but no
    /// graded rows). Errors are per-file ingestion errors.
    pub fn reshape(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<ScoreRecord>> {
        let text = decode::decode_text(bytes).ok_or_else(|| KokufukuError::Decode {
            file: file_name.to_string(),
        })?;

        let grid = grid::read_grid(&text).map_err(|e| KokufukuError::MalformedCsv {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?;

        let (header_row, pivot_col) = grid::locate_header(&grid, &self.config.header_markers)
            .ok_or_else(|| KokufukuError::HeaderNotFound {
                file: file_name.to_string(),
            })?;

        let columns = &self.config.columns;
        let block = grid::orient_block(&grid, header_row, pivot_col, &columns.score);

        let score_idx = block.column_index(&columns.score).ok_or_else(|| {
            KokufukuError::ScoreColumnMissing {
                file: file_name.to_string(),
            }
        })?;
        let max_idx = block.column_index(&columns.max_score);
        let question_idx = block.column_index(&columns.question);
        let topic_idx = block.column_index(&columns.topic);
        let note_idx = block.column_index(&columns.note);

        let subject = resolve_subject(&self.config.subject_rules, file_name)
            .label_or(&self.config.other_subject)
            .to_string();

        let records: Vec<ScoreRecord> = block
            .rows
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .filter(|row| {
                question_idx.is_none() || non_blank(LabelledBlock::cell(row, question_idx)).is_some()
            })
            .map(|row| {
                let question = non_blank(LabelledBlock::cell(row, question_idx));
                let topic_raw = non_blank(LabelledBlock::cell(row, topic_idx))
                    .or_else(|| question.clone())
                    .unwrap_or_else(|| self.config.unknown_topic.clone());

                ScoreRecord {
                    subject: subject.clone(),
                    question,
                    topic_canonical: topic_raw.clone(),
                    topic_raw,
                    score: coerce_score(LabelledBlock::cell(row, Some(score_idx))),
                    max_score: coerce_score(LabelledBlock::cell(row, max_idx)),
                    source_file: file_name.to_string(),
                    note: non_blank(LabelledBlock::cell(row, note_idx)),
                }
            })
            .collect();

        debug!(
            "Reshaped '{}' as {}: {} records",
            file_name,
            subject,
            records.len()
        );
        Ok(records)
    }
}

fn non_blank(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
