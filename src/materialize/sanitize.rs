//! Path-component and display-name sanitization.
//!
//! On-disk layout is derived from creator/album/title strings that come
//! straight from remote metadata, so they may contain separators, reserved
//! characters, and promotional suffixes. Sanitization is deterministic:
//! the same input always yields the same component.

/// Promotional suffixes stripped from display names before tagging.
const PROMOTIONAL_SUFFIXES: [&str; 4] = [" - Topic", " Official", "Official", "official"];

/// Filesystem-reserved characters removed from path components.
const RESERVED: [char; 10] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*', '.'];

/// Strips known promotional suffixes from a display name.
///
/// Used for the artist tag value; path components get the same treatment
/// inside [`sanitize_component`].
#[must_use]
pub fn strip_promotional(input: &str) -> String {
    let mut result = input.to_string();
    for suffix in PROMOTIONAL_SUFFIXES {
        result = result.replace(suffix, "");
    }
    result.trim().to_string()
}

/// Sanitizes a string into a safe on-disk path component.
///
/// Lowercases, strips promotional suffixes, maps slash variants and spaces
/// to underscores, and removes filesystem-reserved characters.
#[must_use]
pub fn sanitize_component(input: &str) -> String {
    let lowered = input
        .trim()
        .to_lowercase()
        .replace(" - topic", "")
        .replace(" official", "");

    lowered
        .chars()
        .filter_map(|c| match c {
            // Unicode big solidus variants show up in remote titles.
            '/' | '\\' | '⧸' | '⧹' => Some('_'),
            ' ' => Some('_'),
            c if RESERVED.contains(&c) => None,
            c => Some(c),
        })
        .collect()
}
