//! Configuration types for score analysis.
//!
//! Everything that the original score sheets hard-coded (header markers,
//! column labels, subject names, topic taxonomy, exam target) lives here so it
//! can be supplied from a JSON file instead.

use crate::ai::RetryPolicy;
use crate::canonicalize::{KEY_SEPARATOR, Taxonomy};
use crate::error::{KokufukuError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One `(pattern, label)` rule for inferring the subject from a file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRule {
    /// Substring searched for in the file's base name.
    pub pattern: String,
    /// Subject label assigned on match.
    pub label: String,
}

impl SubjectRule {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            label: label.into(),
        }
    }
}

/// Accepted header labels for each logical column of a score sheet.
///
/// Labels are compared after trimming; the first alias present wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub question: Vec<String>,
    pub topic: Vec<String>,
    pub score: Vec<String>,
    pub max_score: Vec<String>,
    pub note: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            question: vec!["大問".to_string()],
            topic: vec!["内容".to_string(), "単元".to_string()],
            score: vec!["点数".to_string(), "得点".to_string()],
            max_score: vec!["配点".to_string(), "満点".to_string()],
            note: vec!["振り返り".to_string(), "メモ".to_string(), "反省".to_string()],
        }
    }
}

/// The exam the student is preparing for; embedded into generated prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamProfile {
    pub target_school: String,
    pub exam_date: NaiveDate,
}

impl Default for ExamProfile {
    fn default() -> Self {
        Self {
            target_school: "新潟高校（普通科）".to_string(),
            exam_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap_or_default(),
        }
    }
}

fn default_subject_rules() -> Vec<SubjectRule> {
    ["数学", "英語", "理科", "社会", "国語"]
        .into_iter()
        .map(|name| SubjectRule::new(name, name))
        .collect()
}

/// Configuration for ingestion, canonicalization and generation.
///
/// Use [`AnalysisConfig::builder()`] for a fluent setup or
/// [`AnalysisConfig::from_json_file`] to load one from disk. Missing JSON
/// fields fall back to their defaults.
///
/// # Example
///
/// ```rust,ignore
/// use kokufuku::config::{AnalysisConfig, SubjectRule};
///
/// let config = AnalysisConfig::builder()
///     .add_subject_rule(SubjectRule::new("math", "数学"))
///     .priority_limit(5)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Substrings that identify the header row of a score sheet.
    /// Default: ["大問", "内容"]
    pub header_markers: Vec<String>,

    /// Header labels for each logical column.
    pub columns: ColumnAliases,

    /// Ordered subject rules; the first matching pattern wins.
    /// Default: the five core subjects, each matching its own name.
    pub subject_rules: Vec<SubjectRule>,

    /// Subject label used when no rule matches.
    /// Default: "その他"
    pub other_subject: String,

    /// Topic label used when a row has neither a topic nor a question group.
    /// Default: "未分類"
    pub unknown_topic: String,

    /// Versioned per-subject topic taxonomy used for canonicalization.
    pub taxonomy: Taxonomy,

    /// Exam target embedded into guidance and schedule prompts.
    pub exam: ExamProfile,

    /// Retry policy for rate-limited completion calls.
    pub retry: RetryPolicy,

    /// Number of rows shown in the priority review table.
    /// Default: 10
    pub priority_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            header_markers: vec!["大問".to_string(), "内容".to_string()],
            columns: ColumnAliases::default(),
            subject_rules: default_subject_rules(),
            other_subject: "その他".to_string(),
            unknown_topic: "未分類".to_string(),
            taxonomy: Taxonomy::default(),
            exam: ExamProfile::default(),
            retry: RetryPolicy::default(),
            priority_limit: 10,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&content).map_err(|e| {
            KokufukuError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config
            .validate()
            .map_err(|e| KokufukuError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.header_markers.is_empty() || self.header_markers.iter().any(|m| m.trim().is_empty())
        {
            return Err(ConfigValidationError::EmptyEntries("header_markers"));
        }

        if self.columns.score.is_empty() {
            return Err(ConfigValidationError::EmptyEntries("columns.score"));
        }

        if let Some(index) = self
            .subject_rules
            .iter()
            .position(|rule| rule.pattern.is_empty() || rule.label.trim().is_empty())
        {
            return Err(ConfigValidationError::EmptySubjectRule(index));
        }

        if self.other_subject.trim().is_empty() {
            return Err(ConfigValidationError::EmptyEntries("other_subject"));
        }

        if let Some(label) = self
            .subject_rules
            .iter()
            .map(|rule| rule.label.as_str())
            .chain(std::iter::once(self.other_subject.as_str()))
            .chain(self.taxonomy.subjects.keys().map(String::as_str))
            .find(|label| label.contains(KEY_SEPARATOR))
        {
            return Err(ConfigValidationError::SeparatorInSubject(label.to_string()));
        }

        if self.taxonomy.version.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTaxonomyVersion);
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidRetryAttempts(
                self.retry.max_attempts,
            ));
        }

        if self.priority_limit == 0 {
            return Err(ConfigValidationError::InvalidPriorityLimit(
                self.priority_limit,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("'{0}' must not be empty or contain blank entries")]
    EmptyEntries(&'static str),

    #[error("Subject rule #{0} has an empty pattern or label")]
    EmptySubjectRule(usize),

    #[error("Subject label '{0}' must not contain ':'")]
    SeparatorInSubject(String),

    #[error("Taxonomy version must not be empty")]
    EmptyTaxonomyVersion,

    #[error("Invalid retry attempts: {0} (must be at least 1)")]
    InvalidRetryAttempts(u32),

    #[error("Invalid priority limit: {0} (must be at least 1)")]
    InvalidPriorityLimit(usize),
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    header_markers: Option<Vec<String>>,
    columns: Option<ColumnAliases>,
    subject_rules: Option<Vec<SubjectRule>>,
    extra_subject_rules: Vec<SubjectRule>,
    other_subject: Option<String>,
    unknown_topic: Option<String>,
    taxonomy: Option<Taxonomy>,
    exam: Option<ExamProfile>,
    retry: Option<RetryPolicy>,
    priority_limit: Option<usize>,
}

impl AnalysisConfigBuilder {
    /// Replace the header marker substrings.
    pub fn header_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_markers = Some(markers.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the column aliases.
    pub fn columns(mut self, columns: ColumnAliases) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Replace the whole subject rule list.
    pub fn subject_rules(mut self, rules: Vec<SubjectRule>) -> Self {
        self.subject_rules = Some(rules);
        self
    }

    /// Append a rule after the configured (or default) rules.
    pub fn add_subject_rule(mut self, rule: SubjectRule) -> Self {
        self.extra_subject_rules.push(rule);
        self
    }

    /// Set the label used when no subject rule matches.
    pub fn other_subject(mut self, label: impl Into<String>) -> Self {
        self.other_subject = Some(label.into());
        self
    }

    /// Set the label for rows without any topic information.
    pub fn unknown_topic(mut self, label: impl Into<String>) -> Self {
        self.unknown_topic = Some(label.into());
        self
    }

    /// Set the topic taxonomy.
    pub fn taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    /// Set the exam target.
    pub fn exam(mut self, target_school: impl Into<String>, exam_date: NaiveDate) -> Self {
        self.exam = Some(ExamProfile {
            target_school: target_school.into(),
            exam_date,
        });
        self
    }

    /// Set the retry policy for completion calls.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set the number of rows in the priority review table.
    pub fn priority_limit(mut self, limit: usize) -> Self {
        self.priority_limit = Some(limit);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<AnalysisConfig, ConfigValidationError> {
        let defaults = AnalysisConfig::default();
        let mut subject_rules = self.subject_rules.unwrap_or(defaults.subject_rules);
        subject_rules.extend(self.extra_subject_rules);

        let config = AnalysisConfig {
            header_markers: self.header_markers.unwrap_or(defaults.header_markers),
            columns: self.columns.unwrap_or(defaults.columns),
            subject_rules,
            other_subject: self.other_subject.unwrap_or(defaults.other_subject),
            unknown_topic: self.unknown_topic.unwrap_or(defaults.unknown_topic),
            taxonomy: self.taxonomy.unwrap_or(defaults.taxonomy),
            exam: self.exam.unwrap_or(defaults.exam),
            retry: self.retry.unwrap_or(defaults.retry),
            priority_limit: self.priority_limit.unwrap_or(defaults.priority_limit),
        };

        config.validate()?;
        Ok(config)
    }
}
