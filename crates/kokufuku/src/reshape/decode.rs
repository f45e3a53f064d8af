//! Text decoding for uploaded score sheets.

use encoding_rs::SHIFT_JIS;
use tracing::debug;

/// Decode raw bytes as UTF-8 (BOM stripped), falling back to Shift_JIS.
///
/// Returns `None` when neither encoding yields valid text.
pub(crate) fn decode_text(bytes: &[u8]) -> Option<String> {
    let without_bom = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(without_bom) {
        return Some(text.to_string());
    }

    debug!("UTF-8 decoding failed, retrying as Shift_JIS");
    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_with_bom() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice("大問,内容".as_bytes());
        assert_eq!(decode_text(&bytes).as_deref(), Some("大問,内容"));
    }

    #[test]
    fn test_decode_shift_jis_fallback() {
        let (encoded, _, had_errors) = SHIFT_JIS.encode("大問,内容,点数");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&encoded).is_err());
        assert_eq!(decode_text(&encoded).as_deref(), Some("大問,内容,点数"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        // 0xFF is neither valid UTF-8 nor a Shift_JIS lead byte.
        assert_eq!(decode_text(&[0xFF, 0xFF, 0x80]), None);
    }
}
