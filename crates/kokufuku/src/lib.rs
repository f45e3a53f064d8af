//! kokufuku: exam score analysis and AI study guidance.
//!
//! Load the score sheets a student exports after each mock exam, find the
//! weakest topics, and ask an LLM for targeted review material.
//!
//! # Overview
//!
//! - **Reshaping**: human-oriented CSV sheets (title rows, attributes running
//!   down a column, UTF-8 or Shift_JIS) become flat [`ScoreRecord`]s
//! - **Topic canonicalization**: free-form topic labels are mapped onto a
//!   versioned per-subject [`Taxonomy`], with one batched classification call
//!   for labels it does not know
//! - **Aggregation**: score, max score and score rate per `(subject, topic)`
//!   and per subject, computed with Polars
//! - **Study advisor**: review guidance, practice problems, schedules and
//!   answer-sheet grading through any [`ai::AIProvider`]
//! - **Sessions**: per-user state with replace-on-reupload, textbook names and
//!   portable snapshots
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use kokufuku::{AnalysisConfig, Session, UploadedFile};
//! use kokufuku::ai::GeminiProvider;
//!
//! let provider = GeminiProvider::new(api_key)?;
//! let mut session = Session::new(AnalysisConfig::default());
//!
//! let report = session.ingest(&[UploadedFile::from_path("数学_第2回.csv".as_ref())?]);
//! println!("{}", report.summary_message());
//!
//! let analysis = session.analyze(Some(&provider))?;
//! for row in &analysis.priority {
//!     println!("{} {} {:.1}%", row.subject, row.topic, row.percentage);
//! }
//!
//! let weakest = &analysis.priority[0];
//! let guidance = session.advisor(Some(&provider)).review_guidance(
//!     &weakest.subject,
//!     &weakest.topic,
//!     weakest.percentage,
//!     session.textbook(&weakest.subject),
//! );
//! println!("{}", guidance);
//! ```
//!
//! # AI Providers
//!
//! - [`ai::GeminiProvider`] - Google Gemini API
//! - [`ai::OpenRouterProvider`] - OpenRouter API (many hosted models)
//!
//! Both require the `ai` feature (enabled by default). Without a provider,
//! analysis still works and topics keep their raw labels.

pub mod advisor;
pub mod aggregate;
pub mod ai;
pub mod canonicalize;
pub mod config;
pub mod error;
pub mod reporting;
pub mod reshape;
pub mod session;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use advisor::{StudyAdvisor, load_grading_images};
pub use aggregate::{Aggregator, priority_review};
pub use ai::{GenerationOutcome, RetryPolicy};
pub use canonicalize::{
    CanonicalizationReport, ExtractionError, Taxonomy, TopicCanonicalizer, TopicMap,
};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, ColumnAliases, ConfigValidationError, ExamProfile,
    SubjectRule,
};
pub use error::{KokufukuError, Result, ResultExt};
pub use reporting::{AnalysisReport, ReportGenerator};
pub use reshape::{Reshaper, SubjectMatch, resolve_subject};
pub use session::{Analysis, Session, SessionRegistry, SessionSnapshot};
pub use types::{
    AnalysisSummary, IngestReport, ScoreRecord, SkippedFile, SubjectSummaryRow, SummaryRow,
    UploadedFile,
};
pub use utils::{coerce_score, collect_uploads, parse_numeric_string, round1, score_rate};
