//! Markdown rendering of summary tables.

use crate::types::{SubjectSummaryRow, SummaryRow};

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Numeric columns (everything after the first `text_columns`) are right aligned.
fn table(
    headers: &[&str],
    text_columns: usize,
    rows: impl Iterator<Item = Vec<String>>,
) -> String {
    let mut out = format!("| {} |\n", headers.join(" | "));
    out.push('|');
    for i in 0..headers.len() {
        out.push_str(if i < text_columns { "---|" } else { "---:|" });
    }
    out.push('\n');
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

/// `教科 | 内容 | 点数 | 配点 | 得点率` table.
pub fn topic_table(rows: &[SummaryRow]) -> String {
    table(
        &["教科", "内容", "点数", "配点", "得点率"],
        2,
        rows.iter().map(|row| {
            vec![
                row.subject.clone(),
                row.topic.clone(),
                format_number(row.score),
                format_number(row.max_score),
                format!("{:.1}%", row.percentage),
            ]
        }),
    )
}

/// Per-subject averages.
pub fn subject_table(rows: &[SubjectSummaryRow]) -> String {
    table(
        &["教科", "点数", "配点", "得点率"],
        1,
        rows.iter().map(|row| {
            vec![
                row.subject.clone(),
                format_number(row.score),
                format_number(row.max_score),
                format!("{:.1}%", row.percentage),
            ]
        }),
    )
}
