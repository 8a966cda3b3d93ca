//! File name helpers.

/// Extract the extension (including the leading dot) from a file name.
///
/// Follows `path.extname()` conventions: dot files have no extension, a
/// trailing dot yields `"."`, and only the last segment counts.
pub fn extract_file_extension(file_name: &str) -> &str {
    if file_name.is_empty() {
        return "";
    }

    let Some(last_dot) = file_name.rfind('.') else {
        return "";
    };

    // Dot file: ".profile" has no extension
    if last_dot == 0 {
        return "";
    }

    &file_name[last_dot..]
}
