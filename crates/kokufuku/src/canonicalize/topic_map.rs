//! Cache of `(subject, raw topic) → canonical topic` mappings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separates subject and topic in serialized keys; subject labels may not contain it.
pub const KEY_SEPARATOR: char = ':';

/// Persistent topic mapping.
///
/// Entries are only ever added; an existing mapping is never overwritten.
/// Serialized as a flat object with `"subject:topic"` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct TopicMap {
    entries: BTreeMap<(String, String), String>,
}

impl TopicMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject: &str, topic: &str) -> Option<&str> {
        self.entries
            .get(&(subject.to_string(), topic.to_string()))
            .map(String::as_str)
    }

    pub fn contains(&self, subject: &str, topic: &str) -> bool {
        self.get(subject, topic).is_some()
    }

    /// Insert a mapping unless one already exists. Returns `true` if inserted.
    pub fn insert_if_absent(
        &mut self,
        subject: impl Into<String>,
        topic: impl Into<String>,
        canonical: impl Into<String>,
    ) -> bool {
        let key = (subject.into(), topic.into());
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, canonical.into());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.entries
            .iter()
            .map(|((subject, topic), canonical)| (subject.as_str(), topic.as_str(), canonical.as_str()))
    }
}

impl TryFrom<BTreeMap<String, String>> for TopicMap {
    type Error = String;

    fn try_from(flat: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut entries = BTreeMap::new();
        for (key, canonical) in flat {
            let (subject, topic) = key
                .split_once(KEY_SEPARATOR)
                .ok_or_else(|| format!("topic map key '{}' has no ':' separator", key))?;
            entries.insert((subject.to_string(), topic.to_string()), canonical);
        }
        Ok(Self { entries })
    }
}

impl From<TopicMap> for BTreeMap<String, String> {
    fn from(map: TopicMap) -> Self {
        map.entries
            .into_iter()
            .map(|((subject, topic), canonical)| (format!("{}{}{}", subject, KEY_SEPARATOR, topic), canonical))
            .collect()
    }
}
