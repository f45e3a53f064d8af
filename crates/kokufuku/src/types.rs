use serde::{Deserialize, Serialize};
use std::path::Path;

/// One graded sub-question from an uploaded score sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub question: Option<String>,
    pub topic_raw: String,
    pub topic_canonical: String,
    pub score: f64,
    pub max_score: f64,
    pub source_file: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

/// Aggregated score rate for one `(subject, topic)` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub subject: String,
    pub topic: String,
    pub score: f64,
    pub max_score: f64,
    /// Score rate in percent, rounded to one decimal. `0.0` when `max_score` is zero.
    pub percentage: f64,
}

/// Aggregated score rate for a whole subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummaryRow {
    pub subject: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
}

/// Both summary tables produced by the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub by_topic: Vec<SummaryRow>,
    pub by_subject: Vec<SubjectSummaryRow>,
}

impl AnalysisSummary {
    /// Look up the row for a `(subject, topic)` pair.
    pub fn topic(&self, subject: &str, topic: &str) -> Option<&SummaryRow> {
        self.by_topic
            .iter()
            .find(|row| row.subject == subject && row.topic == topic)
    }

    /// Distinct subjects present in the summary, in table order.
    pub fn subjects(&self) -> Vec<&str> {
        self.by_subject.iter().map(|row| row.subject.as_str()).collect()
    }

    /// Topic rows of one subject, weakest first.
    pub fn topics_for(&self, subject: &str) -> Vec<&SummaryRow> {
        let mut rows: Vec<&SummaryRow> = self
            .by_topic
            .iter()
            .filter(|row| row.subject == subject)
            .collect();
        rows.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));
        rows
    }

    pub fn is_empty(&self) -> bool {
        self.by_topic.is_empty()
    }
}

/// Raw upload handed over by the host (file name plus bytes).
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keyed by its base name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// A file that was skipped during ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub name: String,
    pub code: String,
    pub reason: String,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// `(file name, record count)` for every file that was accepted.
    pub loaded: Vec<(String, usize)>,
    /// Names of accepted files that replaced an earlier upload with the same name.
    pub replaced: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

impl IngestReport {
    pub fn total_records(&self) -> usize {
        self.loaded.iter().map(|(_, count)| count).sum()
    }

    /// Human readable one-paragraph summary of the batch.
    pub fn summary_message(&self) -> String {
        let mut message = format!(
            "{}件のファイルを読み込みました（{}行）。",
            self.loaded.len(),
            self.total_records()
        );
        if !self.replaced.is_empty() {
            message.push_str(&format!("上書き: {}。", self.replaced.join(", ")));
        }
        if !self.skipped.is_empty() {
            let names: Vec<&str> = self.skipped.iter().map(|s| s.name.as_str()).collect();
            message.push_str(&format!("読み込めなかったファイル: {}。", names.join(", ")));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(subject: &str, topic: &str, percentage: f64) -> SummaryRow {
        SummaryRow {
            subject: subject.to_string(),
            topic: topic.to_string(),
            score: 0.0,
            max_score: 0.0,
            percentage,
        }
    }

    #[test]
    fn test_topics_for_orders_weakest_first() {
        let summary = AnalysisSummary {
            by_topic: vec![
                row("数学", "関数", 80.0),
                row("数学", "図形", 40.0),
                row("英語", "文法", 10.0),
            ],
            by_subject: vec![],
        };

        let topics: Vec<&str> = summary
            .topics_for("数学")
            .iter()
            .map(|r| r.topic.as_str())
            .collect();
        assert_eq!(topics, vec!["図形", "関数"]);
        assert!(summary.topic("英語", "文法").is_some());
        assert!(summary.topic("英語", "関数").is_none());
    }

    #[test]
    fn test_ingest_summary_lists_skipped_files() {
        let report = IngestReport {
            loaded: vec![("数学.csv".to_string(), 4)],
            replaced: vec![],
            skipped: vec![SkippedFile {
                name: "memo.csv".to_string(),
                code: "HEADER_NOT_FOUND".to_string(),
                reason: "No header marker found in 'memo.csv'".to_string(),
            }],
        };

        let message = report.summary_message();
        assert!(message.contains("1件"));
        assert!(message.contains("memo.csv"));
        assert_eq!(report.total_records(), 4);
    }
}
