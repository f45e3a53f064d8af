//! Prompt builders for the study advisor.
//!
//! All builders are pure; they only format the statistics they are given.

use crate::config::ExamProfile;
use crate::types::SummaryRow;
use chrono::NaiveDate;

/// Textbook name used when none is registered for a subject.
pub const DEFAULT_TEXTBOOK: &str = "参考書";

/// Instruction sent with answer-sheet images.
pub const GRADING_INSTRUCTION: &str = "\
添付画像は高校入試問題の「問題」「生徒の解答」「模範解答」です。\n\
生徒の解答を採点し、次の形式で日本語で答えてください。\n\
1. 各設問の正誤と得点\n\
2. 間違えた原因の分析\n\
3. 同じ間違いをしないための復習ポイント";

/// Review guidance for one weak topic.
pub fn guidance_prompt(
    exam: &ExamProfile,
    subject: &str,
    topic: &str,
    percentage: f64,
    textbook: &str,
) -> String {
    format!(
        "{school}志望。教科{subject}、単元{topic}、得点率{percentage:.1}%。\
        参考書『{textbook}』のどこを見るべきか、{school}レベルの理解の深さ、\
        チェック項目3つを教えて。",
        school = exam.target_school,
    )
}

/// One practice problem with worked solution.
pub fn practice_test_prompt(exam: &ExamProfile, subject: &str, topic: &str) -> String {
    format!(
        "{}レベル。{}の{}の実践問題1問作成。解答解説付き。",
        exam.target_school, subject, topic
    )
}

/// Study schedule from `today` until the exam date.
///
/// Weak topics are listed weakest first so the plan can prioritize them.
pub fn schedule_prompt(exam: &ExamProfile, today: NaiveDate, weak_topics: &[SummaryRow]) -> String {
    let days_left = (exam.exam_date - today).num_days();
    let mut prompt = format!(
        "今日{}から入試{}まで(残り{}日)の{}合格スケジュール。",
        today.format("%Y-%m-%d"),
        exam.exam_date.format("%Y-%m-%d"),
        days_left.max(0),
        exam.target_school
    );

    if !weak_topics.is_empty() {
        prompt.push_str("\n優先して復習する単元:\n");
        for row in weak_topics {
            prompt.push_str(&format!(
                "- {} {} (得点率{:.1}%)\n",
                row.subject, row.topic, row.percentage
            ));
        }
    }
    prompt
}
