//! Per-user application state.
//!
//! A [`Session`] owns everything one student has loaded: the uploaded score
//! files (keyed by file name, re-upload replaces), textbook names, and the
//! topic map built against the configured taxonomy. Sessions are plain values;
//! a host that serves several users keeps them in a [`SessionRegistry`].

mod registry;
mod snapshot;

pub use registry::SessionRegistry;
pub use snapshot::{SNAPSHOT_FORMAT_VERSION, SessionSnapshot};

use crate::advisor::StudyAdvisor;
use crate::aggregate::{Aggregator, priority_review};
use crate::ai::AIProvider;
use crate::canonicalize::{self, CanonicalizationReport, Taxonomy, TopicCanonicalizer, TopicMap};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::reshape::Reshaper;
use crate::types::{AnalysisSummary, IngestReport, ScoreRecord, SkippedFile, SummaryRow, UploadedFile};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of [`Session::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub summary: AnalysisSummary,
    /// Weakest topics first, limited by the configured priority limit.
    pub priority: Vec<SummaryRow>,
    pub canonicalization: CanonicalizationReport,
}

/// One student's loaded data and derived state.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    config: AnalysisConfig,
    files: BTreeMap<String, Vec<ScoreRecord>>,
    textbooks: BTreeMap<String, String>,
    topic_map: TopicMap,
}

impl Session {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            files: BTreeMap::new(),
            textbooks: BTreeMap::new(),
            topic_map: TopicMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Reshape and store uploads.
    ///
    /// A file whose name was loaded before fully replaces the earlier records.
    /// Files that cannot be parsed are listed in the report and leave any
    /// earlier upload of the same name untouched.
    pub fn ingest(&mut self, uploads: &[UploadedFile]) -> IngestReport {
        let reshaper = Reshaper::new(&self.config);
        let mut report = IngestReport::default();

        for upload in uploads {
            match reshaper.reshape(&upload.name, &upload.bytes) {
                Ok(records) => {
                    report.loaded.push((upload.name.clone(), records.len()));
                    if self.files.insert(upload.name.clone(), records).is_some() {
                        report.replaced.push(upload.name.clone());
                    }
                }
                Err(e) => {
                    warn!("Skipping '{}': {}", upload.name, e);
                    report.skipped.push(SkippedFile {
                        name: upload.name.clone(),
                        code: e.error_code().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Ingested {} files ({} records), skipped {}",
            report.loaded.len(),
            report.total_records(),
            report.skipped.len()
        );
        report
    }

    /// Forget one uploaded file. Returns `true` if it was loaded.
    pub fn remove_file(&mut self, name: &str) -> bool {
        self.files.remove(name).is_some()
    }

    /// Full data reset: uploaded files and the topic map.
    pub fn clear(&mut self) {
        self.files.clear();
        self.topic_map.clear();
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// All records across uploaded files, ordered by file name.
    pub fn records(&self) -> impl Iterator<Item = &ScoreRecord> {
        self.files.values().flatten()
    }

    pub fn record_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn set_textbook(&mut self, subject: impl Into<String>, name: impl Into<String>) {
        let subject = subject.into();
        let name = name.into();
        if name.trim().is_empty() {
            self.textbooks.remove(&subject);
        } else {
            self.textbooks.insert(subject, name.trim().to_string());
        }
    }

    pub fn textbook(&self, subject: &str) -> Option<&str> {
        self.textbooks.get(subject).map(String::as_str)
    }

    pub fn textbooks(&self) -> &BTreeMap<String, String> {
        &self.textbooks
    }

    pub fn topic_map(&self) -> &TopicMap {
        &self.topic_map
    }

    /// Switch taxonomy. A different version discards the cached topic map.
    pub fn set_taxonomy(&mut self, taxonomy: Taxonomy) {
        if taxonomy.version != self.config.taxonomy.version {
            info!(
                "Taxonomy changed from '{}' to '{}', clearing {} cached topic mappings",
                self.config.taxonomy.version,
                taxonomy.version,
                self.topic_map.len()
            );
            self.topic_map.clear();
        }
        self.config.taxonomy = taxonomy;
    }

    /// Canonicalize topics and aggregate every loaded record.
    pub fn analyze(&mut self, provider: Option<&dyn AIProvider>) -> Result<Analysis> {
        let mut canonicalizer = TopicCanonicalizer::new(&self.config.taxonomy);
        if let Some(provider) = provider {
            canonicalizer = canonicalizer.with_provider(provider);
        }

        let canonicalization =
            canonicalizer.resolve(self.files.values().flatten(), &mut self.topic_map);
        canonicalize::apply(&self.topic_map, self.files.values_mut().flatten());

        let summary = Aggregator::summarize(self.files.values().flatten())?;
        let priority = priority_review(&summary.by_topic, self.config.priority_limit);

        Ok(Analysis {
            summary,
            priority,
            canonicalization,
        })
    }

    /// Advisor bound to this session's exam profile and retry policy.
    pub fn advisor<'a>(&'a self, provider: Option<&'a dyn AIProvider>) -> StudyAdvisor<'a> {
        StudyAdvisor::new(provider, &self.config.exam).with_retry(self.config.retry)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            textbooks: self.textbooks.clone(),
            files: self.files.clone(),
            topic_map: self.topic_map.clone(),
            taxonomy_version: self.config.taxonomy.version.clone(),
        }
    }

    /// Encode the session's data as a portable text blob.
    pub fn export_snapshot(&self) -> Result<String> {
        self.snapshot().encode()
    }

    /// Resolve every loaded topic, then export.
    ///
    /// The snapshot carries the classifications made here, so a restored
    /// session does not ask the provider again.
    pub fn export_analyzed_snapshot(
        &mut self,
        provider: Option<&dyn AIProvider>,
    ) -> Result<(CanonicalizationReport, String)> {
        let analysis = self.analyze(provider)?;
        Ok((analysis.canonicalization, self.export_snapshot()?))
    }

    /// Replace this session's data with a snapshot.
    ///
    /// On error the session is left unchanged. A topic map built against
    /// another taxonomy version is dropped.
    pub fn import_snapshot(&mut self, blob: &str) -> Result<()> {
        let snapshot = SessionSnapshot::decode(blob)?;
        self.restore(snapshot);
        Ok(())
    }

    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        let mut topic_map = snapshot.topic_map;
        if snapshot.taxonomy_version != self.config.taxonomy.version {
            warn!(
                "Snapshot topic map was built for taxonomy '{}', current is '{}'; discarding it",
                snapshot.taxonomy_version, self.config.taxonomy.version
            );
            topic_map.clear();
        }

        self.files = snapshot.files;
        self.textbooks = snapshot.textbooks;
        self.topic_map = topic_map;
        info!(
            "Restored session {} with {} files",
            self.id,
            self.files.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, content: &str) -> UploadedFile {
        UploadedFile::new(name, content.as_bytes())
    }

    const MATH: &str = "大問,内容,点数,配点\n1,関数,8,10\n2,関数,3,5\n";

    #[test]
    fn test_reupload_replaces() {
        let mut session = Session::new(AnalysisConfig::default());

        let first = session.ingest(&[upload("数学_A.csv", MATH)]);
        assert!(first.replaced.is_empty());
        let second = session.ingest(&[upload("数学_A.csv", "大問,内容,点数,配点\n1,図形,1,5\n")]);

        assert_eq!(second.replaced, vec!["数学_A.csv".to_string()]);
        assert_eq!(session.record_count(), 1);
        assert_eq!(session.records().next().unwrap().topic_raw, "図形");
    }

    #[test]
    fn test_bad_file_keeps_previous_upload() {
        let mut session = Session::new(AnalysisConfig::default());
        session.ingest(&[upload("数学_A.csv", MATH)]);

        let report = session.ingest(&[upload("数学_A.csv", "no header here\n1,2\n")]);

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].code, "HEADER_NOT_FOUND");
        assert_eq!(session.record_count(), 2);
    }

    #[test]
    fn test_textbooks() {
        let mut session = Session::new(AnalysisConfig::default());
        session.set_textbook("数学", " チャート式 ");
        assert_eq!(session.textbook("数学"), Some("チャート式"));
        session.set_textbook("数学", "");
        assert_eq!(session.textbook("数学"), None);
    }

    #[test]
    fn test_taxonomy_version_change_clears_topic_map() {
        let mut session = Session::new(AnalysisConfig::default());
        session.ingest(&[upload("数学_A.csv", MATH)]);
        session.analyze(None).unwrap();
        assert!(!session.topic_map().is_empty());

        let same_version = session.config().taxonomy.clone();
        session.set_taxonomy(same_version);
        assert!(!session.topic_map().is_empty());

        session.set_taxonomy(Taxonomy::new("v-next").with_subject("数学", ["関数"]));
        assert!(session.topic_map().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut session = Session::new(AnalysisConfig::default());
        session.ingest(&[upload("数学_A.csv", MATH)]);
        session.analyze(None).unwrap();
        session.clear();

        assert_eq!(session.record_count(), 0);
        assert!(session.topic_map().is_empty());
        assert!(session.analyze(None).unwrap().summary.is_empty());
    }

    #[test]
    fn test_import_failure_leaves_session_unchanged() {
        let mut session = Session::new(AnalysisConfig::default());
        session.ingest(&[upload("数学_A.csv", MATH)]);

        assert!(session.import_snapshot("%%%").is_err());
        assert_eq!(session.record_count(), 2);
    }

    #[test]
    fn test_restore_drops_foreign_topic_map() {
        let mut source = Session::new(AnalysisConfig::default());
        source.ingest(&[upload("数学_A.csv", MATH)]);
        source.analyze(None).unwrap();
        let mut snapshot = source.snapshot();
        snapshot.taxonomy_version = "old".to_string();

        let mut target = Session::new(AnalysisConfig::default());
        target.restore(snapshot);

        assert_eq!(target.record_count(), 2);
        assert!(target.topic_map().is_empty());
        assert_ne!(target.id(), source.id());
    }
}
