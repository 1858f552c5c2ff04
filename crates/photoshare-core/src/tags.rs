//! Tag name normalization
//!
//! Tags arrive as free text (`"Sunset, beach #Sea"`) and are stored as
//! lowercase names with a leading `#`.

/// Maximum number of tags attached to one photo
pub const MAX_TAGS_PER_PHOTO: usize = 5;

/// Maximum length of a single tag, including the `#`
pub const MAX_TAG_LENGTH: usize = 50;

/// Normalize one tag name; `None` for blank input
pub fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('#').trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("#{}", trimmed.to_lowercase()))
}

/// Split free text on commas and whitespace into normalized, de-duplicated tags.
///
/// Order of first appearance is preserved.
pub fn normalize_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for piece in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if let Some(tag) = normalize_tag(piece) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}
