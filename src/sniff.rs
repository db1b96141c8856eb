//! Content-based MIME detection, independent of anything the client declares.

/// Bytes examined when sniffing.
pub const SNIFF_LEN: usize = 512;

/// Detect a MIME type from the leading bytes of a file.
///
/// Known magic numbers win. Otherwise the WHATWG binary-byte rule decides between
/// `text/plain; charset=utf-8` and `application/octet-stream`.
pub fn sniff_content_type(data: &[u8]) -> String {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    if data.iter().copied().any(is_binary_byte) {
        "application/octet-stream".to_string()
    } else {
        "text/plain; charset=utf-8".to_string()
    }
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
