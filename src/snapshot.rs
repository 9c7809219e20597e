//! Classification of file snapshots as text or binary.

/// Text written in place of binary file contents.
pub const BINARY_PLACEHOLDER: &str = "# (binary file omitted from report)";

/// Share of control bytes above which content is treated as binary.
const CONTROL_BYTE_RATIO: f64 = 0.1;

/// Control characters outside the common whitespace range (tab..carriage return).
const fn is_control_byte(byte: u8) -> bool {
    byte < 9 || (byte > 13 && byte < 32)
}

/// Decodes a file snapshot for inclusion in a report.
///
/// Returns the displayable text and whether the content was classified as
/// binary. Any NUL byte, or more than 10% control bytes, marks the content as
/// binary and yields [`BINARY_PLACEHOLDER`]. Everything else is decoded as
/// UTF-8, replacing invalid sequences.
#[must_use]
pub fn decode_snapshot(content: &[u8]) -> (String, bool) {
    if content.is_empty() {
        return (String::new(), false);
    }
    if content.contains(&0) {
        return (BINARY_PLACEHOLDER.to_string(), true);
    }

    let control_bytes = content.iter().filter(|b| is_control_byte(**b)).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = control_bytes as f64 / content.len() as f64;
    if ratio > CONTROL_BYTE_RATIO {
        return (BINARY_PLACEHOLDER.to_string(), true);
    }

    (String::from_utf8_lossy(content).into_owned(), false)
}
