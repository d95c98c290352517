//! Small cross-cutting helpers.

/// Join a URL base and a path segment with exactly one `/` between them.
///
/// Mirrors what the update pipeline needs: the base keeps its scheme and
/// host untouched, duplicate slashes at the seam are collapsed, and the
/// segment may itself contain `/` separators.
pub fn url_join(base: &str, segment: &str) -> String {
    let base = base.trim_end_matches('/');
    let segment = segment.trim_start_matches('/');
    if segment.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{segment}")
    }
}
