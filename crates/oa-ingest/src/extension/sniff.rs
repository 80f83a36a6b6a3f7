//! Content sniffing over a short byte sample

/// Guess a MIME type from the first bytes of a file.
///
/// Binary formats are recognised by magic numbers. Text falls back to a few
/// markup and JSON checks, then to `text/plain`. An empty sample has no type.
pub fn sniff_mime(sample: &[u8]) -> Option<&'static str> {
    if sample.is_empty() {
        return None;
    }

    if let Some(kind) = infer::get(sample) {
        return Some(kind.mime_type());
    }

    let text = text_prefix(sample)?;
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    let lower = trimmed
        .chars()
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();

    if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
        Some("text/html")
    } else if lower.starts_with("<?xml") {
        Some("text/xml")
    } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
        Some("application/json")
    } else {
        Some("text/plain")
    }
}

/// The sample as text, tolerating a multi-byte character cut off at the end.
fn text_prefix(sample: &[u8]) -> Option<&str> {
    let text = match std::str::from_utf8(sample) {
        Ok(text) => text,
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&sample[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };

    let printable = text
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t' | '\u{c}'));

    printable.then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sample_has_no_type() {
        assert_eq!(sniff_mime(b""), None);
    }

    #[test]
    fn test_binary_signatures() {
        assert_eq!(sniff_mime(b"PK\x03\x04\x14\x00\x00\x00\x08\x00"), Some("application/zip"));
        assert_eq!(sniff_mime(b"\x1f\x8b\x08\x00\x00\x00\x00\x00"), Some("application/gzip"));
        assert_eq!(sniff_mime(b"%PDF-1.4\n%"), Some("application/pdf"));
    }

    #[test]
    fn test_text_fallbacks() {
        assert_eq!(sniff_mime(b"<!DOCTYPE html><html><body>"), Some("text/html"));
        assert_eq!(sniff_mime(b"<?xml version=\"1.0\"?><kml>"), Some("text/xml"));
        assert_eq!(sniff_mime(b"  {\"type\": \"FeatureCollection\""), Some("application/json"));
        assert_eq!(sniff_mime(b"NUMBER,STREET,CITY\n1,Main St,Oakland\n"), Some("text/plain"));
    }

    #[test]
    fn test_truncated_utf8_is_still_text() {
        let mut sample = b"STREET\nStra".to_vec();
        sample.extend_from_slice(&"\u{df}e".as_bytes()[..1]);
        assert_eq!(sniff_mime(&sample), Some("text/plain"));
    }

    #[test]
    fn test_unknown_binary() {
        assert_eq!(sniff_mime(&[0x00, 0x01, 0x02, 0x03, 0xfe, 0xff, 0x00, 0x10]), None);
    }
}
