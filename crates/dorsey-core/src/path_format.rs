use std::path::Path;

/// Renders a path with `/` separators so the same file compares equal
/// regardless of the host separator.
pub fn normalize_path(path: &Path) -> String {
    normalize_separators(&path.to_string_lossy())
}

pub fn normalize_separators(raw: &str) -> String {
    raw.replace('\\', "/")
}
