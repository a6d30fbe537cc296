/// Deduplication key for a title: lowercased, keeping only ASCII letters and digits.
///
/// Whitespace, punctuation and every non-ASCII character are dropped, so titles in
/// non-Latin scripts collapse to short (often empty) keys.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .filter(char::is_ascii_alphanumeric)
        .collect()
}
