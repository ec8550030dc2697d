//! Extraction of deliverable addresses from display-formatted header values.

/// Extract the deliverable address from a header value such as
/// `"Jane Doe <jane@example.com>"`.
///
/// The substring between the last `<` and the last `>` wins when brackets
/// are present; otherwise the whole value is returned. Either way the
/// result is trimmed. A value whose brackets are crossed or empty yields
/// an empty string.
#[must_use]
pub fn extract_address(value: &str) -> &str {
    match (value.rfind('<'), value.rfind('>')) {
        (Some(open), Some(close)) => value.get(open + 1..close).unwrap_or_default().trim(),
        _ => value.trim(),
    }
}
