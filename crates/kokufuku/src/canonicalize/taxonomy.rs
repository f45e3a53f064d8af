//! Versioned per-subject topic taxonomy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical topic lists keyed by subject label.
///
/// The `version` string is recorded alongside every topic map built against
/// this taxonomy; a map built for another version is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub version: String,
    pub subjects: BTreeMap<String, Vec<String>>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        let entries: [(&str, &[&str]); 5] = [
            ("数学", &["数と式", "方程式", "関数", "図形", "確率", "データの活用"]),
            ("英語", &["文法", "語彙", "長文読解", "英作文", "リスニング"]),
            ("理科", &["物理", "化学", "生物", "地学"]),
            ("社会", &["地理", "歴史", "公民"]),
            ("国語", &["現代文", "古文", "漢文", "文法", "漢字", "作文"]),
        ];

        let subjects = entries
            .iter()
            .map(|(subject, topics)| {
                (
                    subject.to_string(),
                    topics.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();

        Self {
            version: "2025.1".to_string(),
            subjects,
        }
    }
}

impl Taxonomy {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            subjects: BTreeMap::new(),
        }
    }

    /// Add (or replace) the topic list for a subject.
    pub fn with_subject<I, S>(mut self, subject: impl Into<String>, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects
            .insert(subject.into(), topics.into_iter().map(Into::into).collect());
        self
    }

    /// Canonical topics for a subject, empty when the subject is unknown.
    pub fn topics(&self, subject: &str) -> &[String] {
        self.subjects
            .get(subject)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, subject: &str, topic: &str) -> bool {
        self.topics(subject).iter().any(|t| t == topic)
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        !self.topics(subject).is_empty()
    }
}
