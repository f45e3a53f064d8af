//! Topic canonicalization.
//!
//! Free-form topic labels from score sheets (`一次関数`, `不定詞の用法`) are
//! mapped onto a fixed per-subject [`Taxonomy`]. Resolution order:
//!
//! 1. labels that already are taxonomy members map to themselves
//! 2. labels already in the [`TopicMap`] are reused
//! 3. everything else is sent to the model in one classification request
//!
//! A missing provider, a failing call or an unusable answer never blocks
//! aggregation: unresolved labels keep their raw text and the report carries
//! a warning.

mod extract;
mod taxonomy;
mod topic_map;

pub use extract::{ExtractionError, extract_json_object, parse_classification};
pub use taxonomy::Taxonomy;
pub use topic_map::{KEY_SEPARATOR, TopicMap};

use crate::ai::AIProvider;
use crate::types::ScoreRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Counts of how the distinct `(subject, topic)` pairs were resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalizationReport {
    /// Pairs that already were taxonomy members.
    pub exact: usize,
    /// Pairs found in the existing topic map.
    pub cached: usize,
    /// Pairs newly mapped by the classification call.
    pub classified: usize,
    /// Pairs left with their raw label.
    pub unresolved: usize,
    /// Set when classification was skipped or failed.
    pub warning: Option<String>,
}

/// Resolves raw topic labels against a taxonomy, optionally via a model.
pub struct TopicCanonicalizer<'a> {
    taxonomy: &'a Taxonomy,
    provider: Option<&'a dyn AIProvider>,
}

impl<'a> TopicCanonicalizer<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self {
            taxonomy,
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: &'a dyn AIProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Resolve every distinct pair in `records` into `map` and rewrite
    /// `topic_canonical` on each record.
    pub fn canonicalize(
        &self,
        records: &mut [ScoreRecord],
        map: &mut TopicMap,
    ) -> CanonicalizationReport {
        let report = self.resolve(records.iter(), map);
        apply(map, records.iter_mut());
        report
    }

    /// Populate `map` for the distinct pairs of `records` without touching them.
    pub fn resolve<'r>(
        &self,
        records: impl IntoIterator<Item = &'r ScoreRecord>,
        map: &mut TopicMap,
    ) -> CanonicalizationReport {
        let pairs: BTreeSet<(String, String)> = records
            .into_iter()
            .map(|r| (r.subject.clone(), r.topic_raw.clone()))
            .collect();

        let mut report = CanonicalizationReport::default();
        let mut unknown: Vec<(String, String)> = Vec::new();

        for (subject, topic) in pairs {
            if map.contains(&subject, &topic) {
                report.cached += 1;
            } else if self.taxonomy.contains(&subject, &topic) {
                map.insert_if_absent(subject, topic.clone(), topic);
                report.exact += 1;
            } else if self.taxonomy.has_subject(&subject) {
                unknown.push((subject, topic));
            } else {
                report.unresolved += 1;
            }
        }

        if unknown.is_empty() {
            return report;
        }

        let Some(provider) = self.provider else {
            report.unresolved += unknown.len();
            report.warning = Some(format!(
                "AI provider not configured; {} topics keep their original labels",
                unknown.len()
            ));
            return report;
        };

        let prompt = self.classification_prompt(&unknown);
        debug!("Classifying {} topics with {}", unknown.len(), provider.name());

        let answer = match provider.generate_text(&prompt) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Topic classification failed: {}", e);
                report.unresolved += unknown.len();
                report.warning = Some(format!("topic classification failed: {}", e));
                return report;
            }
        };

        let resolved = match parse_classification(&answer) {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!("Unusable classification response: {}", e);
                report.unresolved += unknown.len();
                report.warning = Some(format!("unusable classification response: {}", e));
                return report;
            }
        };

        let requested: BTreeSet<&(String, String)> = unknown.iter().collect();
        for ((subject, topic), canonical) in resolved {
            let key = (subject, topic);
            if canonical.is_empty() || !requested.contains(&key) {
                continue;
            }
            let (subject, topic) = key;
            if map.insert_if_absent(subject, topic, canonical) {
                report.classified += 1;
            }
        }
        report.unresolved += unknown.len() - report.classified;

        info!(
            "Canonicalized topics: {} exact, {} cached, {} classified, {} unresolved",
            report.exact, report.cached, report.classified, report.unresolved
        );
        report
    }

    /// Build the single classification request for the unknown pairs.
    pub fn classification_prompt(&self, unknown: &[(String, String)]) -> String {
        let taxonomy_json = serde_json::to_string_pretty(&self.taxonomy.subjects)
            .unwrap_or_else(|_| "{}".to_string());

        let mut prompt = format!(
            "次の教科ごとの単元一覧に、テストの「内容」欄の表記を分類してください。\n\n\
            単元一覧(JSON):\n{}\n\n\
            分類する項目(「教科: 内容」):\n",
            taxonomy_json
        );
        for (subject, topic) in unknown {
            prompt.push_str(&format!("- {}: {}\n", subject, topic));
        }
        prompt.push_str(
            "\n回答は JSON オブジェクトのみで返してください。\n\
            キーは上の「教科: 内容」をそのまま、値はその教科の単元一覧の中の1つにしてください。\n\
            例: {\"数学: 一次関数\": \"関数\"}",
        );
        prompt
    }
}

/// Rewrite `topic_canonical` from the map, falling back to the raw label.
pub fn apply<'r>(map: &TopicMap, records: impl IntoIterator<Item = &'r mut ScoreRecord>) {
    for record in records {
        record.topic_canonical = map
            .get(&record.subject, &record.topic_raw)
            .unwrap_or(record.topic_raw.as_str())
            .to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ImageInput;
    use std::sync::Mutex;

    struct ScriptedProvider {
        answer: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                answer: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl AIProvider for ScriptedProvider {
        fn generate_text(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().map_err(|e| anyhow::anyhow!(e))
        }

        fn generate_with_images(
            &self,
            _prompt: &str,
            _images: &[ImageInput],
        ) -> anyhow::Result<String> {
            unreachable!()
        }

        fn name(&self) -> &str {
            "Scripted"
        }
    }

    fn record(subject: &str, topic: &str) -> ScoreRecord {
        ScoreRecord {
            subject: subject.to_string(),
            question: None,
            topic_raw: topic.to_string(),
            topic_canonical: topic.to_string(),
            score: 1.0,
            max_score: 2.0,
            source_file: "test.csv".to_string(),
            note: None,
        }
    }

    // -------------------------------------------------------------------------
    // Resolution order
    // -------------------------------------------------------------------------

    #[test]
    fn test_exact_members_need_no_call() {
        let taxonomy = Taxonomy::default();
        let provider = ScriptedProvider::answering("{}");
        let mut records = vec![record("数学", "関数"), record("数学", "関数")];
        let mut map = TopicMap::new();

        let report = TopicCanonicalizer::new(&taxonomy)
            .with_provider(&provider)
            .canonicalize(&mut records, &mut map);

        assert_eq!(report.exact, 1);
        assert_eq!(provider.calls(), 0);
        assert_eq!(map.get("数学", "関数"), Some("関数"));
    }

    #[test]
    fn test_single_batched_call() {
        let taxonomy = Taxonomy::default();
        let provider = ScriptedProvider::answering(
            "結果:\n{\"数学: 一次関数\": \"関数\", \"英語: 不定詞\": \"文法\"}",
        );
        let mut records = vec![
            record("数学", "一次関数"),
            record("英語", "不定詞"),
            record("数学", "一次関数"),
        ];
        let mut map = TopicMap::new();

        let report = TopicCanonicalizer::new(&taxonomy)
            .with_provider(&provider)
            .canonicalize(&mut records, &mut map);

        assert_eq!(provider.calls(), 1);
        assert_eq!(report.classified, 2);
        assert_eq!(report.unresolved, 0);
        assert!(report.warning.is_none());
        assert_eq!(records[0].topic_canonical, "関数");
        assert_eq!(records[1].topic_canonical, "文法");
        assert_eq!(records[0].topic_raw, "一次関数");
    }

    #[test]
    fn test_cached_pairs_are_not_resent() {
        let taxonomy = Taxonomy::default();
        let provider = ScriptedProvider::answering("{}");
        let mut map = TopicMap::new();
        map.insert_if_absent("数学", "一次関数", "関数");
        let mut records = vec![record("数学", "一次関数")];

        let report = TopicCanonicalizer::new(&taxonomy)
            .with_provider(&provider)
            .canonicalize(&mut records, &mut map);

        assert_eq!(report.cached, 1);
        assert_eq!(provider.calls(), 0);
        assert_eq!(records[0].topic_canonical, "関数");
    }

    #[test]
    fn test_subject_without_taxonomy_is_not_sent() {
        let taxonomy = Taxonomy::default();
        let provider = ScriptedProvider::answering("{}");
        let mut records = vec![record("その他", "面接")];
        let mut map = TopicMap::new();

        let report = TopicCanonicalizer::new(&taxonomy)
            .with_provider(&provider)
            .canonicalize(&mut records, &mut map);

        assert_eq!(provider.calls(), 0);
        assert_eq!(report.unresolved, 1);
        assert_eq!(records[0].topic_canonical, "面接");
    }

    // -------------------------------------------------------------------------
    // Failure handling
    // -------------------------------------------------------------------------

    #[test]
    fn test_free_text_answer_keeps_raw_labels() {
        let taxonomy = Taxonomy::default();
        let provider = ScriptedProvider::answering("一次関数は関数の単元です。");
        let mut records = vec![record("数学", "一次関数")];
        let mut map = TopicMap::new();

        let report = TopicCanonicalizer::new(&taxonomy)
            .with_provider(&provider)
            .canonicalize(&mut records, &mut map);

        assert_eq!(report.unresolved, 1);
        assert!(report.warning.is_some());
        assert!(map.is_empty());
        assert_eq!(records[0].topic_canonical, "一次関数");
    }

    #[test]
    fn test_provider_error_keeps_raw_labels() {
        let taxonomy = Taxonomy::default();
        let provider = ScriptedProvider::failing("connection reset");
        let mut records = vec![record("数学", "一次関数")];
        let mut map = TopicMap::new();

        let report = TopicCanonicalizer::new(&taxonomy)
            .with_provider(&provider)
            .canonicalize(&mut records, &mut map);

        assert_eq!(provider.calls(), 1);
        assert!(report.warning.unwrap().contains("connection reset"));
        assert_eq!(records[0].topic_canonical, "一次関数");
    }

    #[test]
    fn test_no_provider_warns() {
        let taxonomy = Taxonomy::default();
        let mut records = vec![record("数学", "一次関数"), record("数学", "関数")];
        let mut map = TopicMap::new();

        let report = TopicCanonicalizer::new(&taxonomy).canonicalize(&mut records, &mut map);

        assert_eq!(report.exact, 1);
        assert_eq!(report.unresolved, 1);
        assert!(report.warning.is_some());
    }

    #[test]
    fn test_unrequested_and_empty_answers_are_ignored() {
        let taxonomy = Taxonomy::default();
        let provider = ScriptedProvider::answering(
            "{\"数学: 一次関数\": \"\", \"数学: 作図\": \"図形\"}",
        );
        let mut records = vec![record("数学", "一次関数")];
        let mut map = TopicMap::new();

        let report = TopicCanonicalizer::new(&taxonomy)
            .with_provider(&provider)
            .canonicalize(&mut records, &mut map);

        assert_eq!(report.classified, 0);
        assert_eq!(report.unresolved, 1);
        assert!(!map.contains("数学", "作図"));
    }

    #[test]
    fn test_classification_prompt_lists_pairs() {
        let taxonomy = Taxonomy::default();
        let canonicalizer = TopicCanonicalizer::new(&taxonomy);
        let prompt = canonicalizer
            .classification_prompt(&[("数学".to_string(), "一次関数".to_string())]);

        assert!(prompt.contains("- 数学: 一次関数"));
        assert!(prompt.contains("データの活用"));
        assert!(prompt.contains("長文読解"));
    }
}
