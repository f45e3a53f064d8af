//! AI study advisor: review guidance, practice tests, schedules and grading.
//!
//! Every operation builds a prompt from aggregated statistics and makes one
//! completion call through [`generate_with_retry`]. Nothing here returns an
//! error; failures come back as [`GenerationOutcome::Failed`] or
//! [`GenerationOutcome::Unavailable`] so the caller can display them inline.

pub mod prompts;

use crate::ai::{AIProvider, GenerationOutcome, ImageInput, RetryPolicy, generate_with_retry};
use crate::config::ExamProfile;
use crate::error::{KokufukuError, Result};
use crate::types::SummaryRow;
use chrono::NaiveDate;
use prompts::{DEFAULT_TEXTBOOK, GRADING_INSTRUCTION};
use std::path::PathBuf;
use tracing::{debug, info};

/// Accepted number of images for one grading request.
pub const GRADING_IMAGE_RANGE: std::ops::RangeInclusive<usize> = 2..=3;

/// Read the images for one grading request.
///
/// The count is checked before any file is opened.
pub fn load_grading_images(paths: &[PathBuf]) -> Result<Vec<ImageInput>> {
    if !GRADING_IMAGE_RANGE.contains(&paths.len()) {
        return Err(KokufukuError::InvalidInput(format!(
            "grading needs {} to {} images, got {}",
            GRADING_IMAGE_RANGE.start(),
            GRADING_IMAGE_RANGE.end(),
            paths.len()
        )));
    }
    paths
        .iter()
        .map(|path| {
            ImageInput::from_path(path).map_err(|e| {
                KokufukuError::from(e).with_context(format!("reading {}", path.display()))
            })
        })
        .collect()
}

/// Generates study material for one session.
pub struct StudyAdvisor<'a> {
    provider: Option<&'a dyn AIProvider>,
    exam: &'a ExamProfile,
    retry: RetryPolicy,
}

impl<'a> StudyAdvisor<'a> {
    pub fn new(provider: Option<&'a dyn AIProvider>, exam: &'a ExamProfile) -> Self {
        Self {
            provider,
            exam,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Where to look in the textbook and what to check for one topic.
    pub fn review_guidance(
        &self,
        subject: &str,
        topic: &str,
        percentage: f64,
        textbook: Option<&str>,
    ) -> GenerationOutcome {
        let textbook = textbook
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_TEXTBOOK);
        let prompt = prompts::guidance_prompt(self.exam, subject, topic, percentage, textbook);
        self.complete(&prompt)
    }

    /// One exam-level practice problem with solution.
    pub fn practice_test(&self, subject: &str, topic: &str) -> GenerationOutcome {
        self.complete(&prompts::practice_test_prompt(self.exam, subject, topic))
    }

    /// A plan from `today` until the exam, prioritizing `weak_topics`.
    pub fn study_schedule(&self, today: NaiveDate, weak_topics: &[SummaryRow]) -> GenerationOutcome {
        self.complete(&prompts::schedule_prompt(self.exam, today, weak_topics))
    }

    /// Grade an answer sheet from 2–3 photos (problem, answer, model answer).
    pub fn grade_images(&self, images: &[ImageInput]) -> GenerationOutcome {
        if !GRADING_IMAGE_RANGE.contains(&images.len()) {
            return GenerationOutcome::failed(format!(
                "画像は2〜3枚アップロードしてください（{}枚）",
                images.len()
            ));
        }
        let Some(provider) = self.provider else {
            return Self::not_configured();
        };

        info!("Grading {} images with {}", images.len(), provider.name());
        generate_with_retry(&self.retry, || {
            provider.generate_with_images(GRADING_INSTRUCTION, images)
        })
    }

    fn complete(&self, prompt: &str) -> GenerationOutcome {
        if prompt.trim().is_empty() {
            return GenerationOutcome::failed("プロンプトが空です");
        }
        let Some(provider) = self.provider else {
            return Self::not_configured();
        };

        debug!("Sending prompt to {}: {}", provider.name(), prompt);
        generate_with_retry(&self.retry, || provider.generate_text(prompt))
    }

    fn not_configured() -> GenerationOutcome {
        GenerationOutcome::failed("AIプロバイダーが設定されていません（APIキーを確認してください）")
    }
}
