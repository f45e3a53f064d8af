//! Subject inference from upload file names.

use crate::config::SubjectRule;

/// Result of matching a file name against the subject rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectMatch<'a> {
    /// A rule matched; carries the rule's label.
    Matched(&'a str),
    /// No rule matched.
    NoMatch,
}

impl<'a> SubjectMatch<'a> {
    /// Resolve to a label, using `other` for [`SubjectMatch::NoMatch`].
    pub fn label_or(self, other: &'a str) -> &'a str {
        match self {
            SubjectMatch::Matched(label) => label,
            SubjectMatch::NoMatch => other,
        }
    }
}

/// Evaluate the ordered rules against the base name of `file_name`.
///
/// The first rule whose pattern occurs in the name wins.
pub fn resolve_subject<'a>(rules: &'a [SubjectRule], file_name: &str) -> SubjectMatch<'a> {
    let base_name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    rules
        .iter()
        .find(|rule| base_name.contains(rule.pattern.as_str()))
        .map_or(SubjectMatch::NoMatch, |rule| {
            SubjectMatch::Matched(rule.label.as_str())
        })
}
