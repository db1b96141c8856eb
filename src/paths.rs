//! Name sanitisation and confinement checks for anything that becomes a path
//! under the storage root.

use std::path::{Component, Path};

/// Final path element of an untrusted name, treating both `/` and `\` as separators.
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Reduce a directory name to a single component of `[A-Za-z0-9_-]`.
///
/// Returns `None` when nothing is left.
pub fn sanitize_directory(name: &str) -> Option<String> {
    let cleaned: String = base_name(name.trim_end_matches(['/', '\\']))
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Keep only `[A-Za-z0-9_.-]` of the base name of an uploaded filename.
pub fn sanitize_file_name(name: &str) -> String {
    base_name(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

/// Extension including the leading dot, or `""`. Same rules as Go's `filepath.Ext`:
/// everything from the last dot of the final element.
pub fn extension(name: &str) -> &str {
    let base = base_name(name);
    match base.rfind('.') {
        Some(idx) => &base[idx..],
        None => "",
    }
}

/// True when `name` is exactly one normal path component (no separators, not `.`/`..`).
pub fn is_bare_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Human-readable name of a stored file: whatever follows the random prefix and
/// the token marker, i.e. the text after the first two `-` separators.
pub fn display_name(stored: &str) -> &str {
    let mut parts = stored.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(rest)) if !rest.is_empty() => rest,
        _ => stored,
    }
}
