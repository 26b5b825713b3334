//! Upload filename sanitization.

/// Reduce an uploaded filename to a safe, flat ASCII name.
///
/// Path separators become spaces, runs of whitespace become a single `_`,
/// characters outside `[A-Za-z0-9_.-]` are dropped, and leading or trailing
/// `.`/`_` are stripped. The result may be empty, which callers must reject.
pub fn sanitize_filename(raw: &str) -> String {
    let flattened: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_unchanged() {
        assert_eq!(sanitize_filename("resume.pdf"), "resume.pdf");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(sanitize_filename("My  Resume 2024.pdf"), "My_Resume_2024.pdf");
    }

    #[test]
    fn test_path_traversal_flattened() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("C:\\Users\\bob\\cv.pdf"), "C_Users_bob_cv.pdf");
    }

    #[test]
    fn test_non_ascii_dropped() {
        assert_eq!(sanitize_filename("résumé.pdf"), "rsum.pdf");
    }

    #[test]
    fn test_degenerate_names_become_empty() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename("///"), "");
    }
}
