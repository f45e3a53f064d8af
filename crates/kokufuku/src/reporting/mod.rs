//! Report generation module.
//!
//! Renders summary tables as markdown for terminal output and writes them to
//! disk as CSV (via polars) or as a JSON report.
//!
//! # Example
//!
//! ```rust,ignore
//! use kokufuku::reporting::{markdown, ReportGenerator};
//!
//! let analysis = session.analyze(provider)?;
//! println!("{}", markdown::topic_table(&analysis.priority));
//!
//! ReportGenerator::new("output")
//!     .write_summary_csv(&analysis.summary.by_topic, &analysis.summary.by_subject)?;
//! ```

mod generator;
pub mod markdown;

pub use generator::{AnalysisReport, ReportGenerator};
