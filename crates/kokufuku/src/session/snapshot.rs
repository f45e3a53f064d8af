//! Portable session snapshots: JSON, gzip-compressed, base64-encoded.

use crate::canonicalize::TopicMap;
use crate::error::{KokufukuError, Result};
use crate::types::ScoreRecord;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Current snapshot layout version.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Everything needed to restore a session's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub format_version: u32,
    #[serde(default)]
    pub textbooks: BTreeMap<String, String>,
    /// One record table per uploaded file name.
    #[serde(default)]
    pub files: BTreeMap<String, Vec<ScoreRecord>>,
    #[serde(default)]
    pub topic_map: TopicMap,
    /// Taxonomy version `topic_map` was built against.
    #[serde(default)]
    pub taxonomy_version: String,
}

impl SessionSnapshot {
    /// Serialize, compress and encode into a text blob.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;
        Ok(STANDARD.encode(compressed))
    }

    /// Inverse of [`SessionSnapshot::encode`].
    ///
    /// Any failure (bad base64, bad gzip, bad JSON, unknown version) is
    /// reported as [`KokufukuError::SnapshotCorrupt`].
    pub fn decode(blob: &str) -> Result<Self> {
        let compressed = STANDARD
            .decode(blob.trim())
            .map_err(|e| KokufukuError::SnapshotCorrupt(format!("invalid base64: {}", e)))?;

        let mut json = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut json)
            .map_err(|e| KokufukuError::SnapshotCorrupt(format!("invalid gzip data: {}", e)))?;

        let snapshot: SessionSnapshot = serde_json::from_slice(&json)
            .map_err(|e| KokufukuError::SnapshotCorrupt(format!("invalid JSON: {}", e)))?;

        if snapshot.format_version == 0 || snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(KokufukuError::SnapshotCorrupt(format!(
                "unsupported format version {}",
                snapshot.format_version
            )));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> SessionSnapshot {
        let mut topic_map = TopicMap::new();
        topic_map.insert_if_absent("数学", "一次関数", "関数");

        let record = ScoreRecord {
            subject: "数学".to_string(),
            question: Some("1".to_string()),
            topic_raw: "一次関数".to_string(),
            topic_canonical: "関数".to_string(),
            score: 8.0,
            max_score: 10.0,
            source_file: "数学_test.csv".to_string(),
            note: None,
        };

        SessionSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            textbooks: BTreeMap::from([("数学".to_string(), "チャート式".to_string())]),
            files: BTreeMap::from([("数学_test.csv".to_string(), vec![record])]),
            topic_map,
            taxonomy_version: "2025.1".to_string(),
        }
    }

    #[test]
    fn test_encode_decode() {
        let snapshot = sample();
        let blob = snapshot.encode().unwrap();
        assert!(blob.is_ascii());
        assert_eq!(SessionSnapshot::decode(&format!("{}\n", blob)).unwrap(), snapshot);
    }

    #[test]
    fn test_topic_map_uses_flat_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["topic_map"]["数学:一次関数"], "関数");
    }

    #[test]
    fn test_garbage_is_corrupt() {
        for blob in ["not base64!!", "aGVsbG8=", ""] {
            let err = SessionSnapshot::decode(blob).unwrap_err();
            assert_eq!(err.error_code(), "SNAPSHOT_CORRUPT");
        }
    }

    #[test]
    fn test_future_version_is_rejected() {
        let mut snapshot = sample();
        snapshot.format_version = SNAPSHOT_FORMAT_VERSION + 1;
        let blob = snapshot.encode().unwrap();
        assert!(matches!(
            SessionSnapshot::decode(&blob),
            Err(KokufukuError::SnapshotCorrupt(_))
        ));
    }
}
