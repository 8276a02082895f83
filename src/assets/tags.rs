//! Free-text tags. Unique per asset, compared case-insensitively.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("Tag cannot be empty")]
    Empty,

    #[error("Tag \"{0}\" already exists")]
    Duplicate(String),
}

/// Whether `tags` already holds `tag`, ignoring case.
pub fn has_tag(tags: &[String], tag: &str) -> bool {
    let needle = tag.trim().to_lowercase();
    tags.iter().any(|t| t.to_lowercase() == needle)
}

/// Return a new tag list with `tag` appended.
///
/// The input is trimmed; an empty tag or one matching an existing tag
/// case-insensitively is rejected and the original list is left as is.
pub fn add_tag(tags: &[String], tag: &str) -> Result<Vec<String>, TagError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(TagError::Empty);
    }
    if has_tag(tags, tag) {
        return Err(TagError::Duplicate(tag.to_string()));
    }
    let mut next = tags.to_vec();
    next.push(tag.to_string());
    Ok(next)
}

/// Return a new tag list without `tag` (exact match). Removing a tag that is
/// not present leaves the list unchanged.
pub fn remove_tag(tags: &[String], tag: &str) -> Vec<String> {
    tags.iter().filter(|t| t.as_str() != tag).cloned().collect()
}

/// Trim, drop empties and case-insensitive duplicates, keeping first spelling.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !has_tag(&out, tag) {
            out.push(tag.to_string());
        }
    }
    out
}
