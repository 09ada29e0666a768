/// Truncate to at most `max_chars` characters, appending `...` when cut.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_untouched() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
    }

    #[test]
    fn exact_length_untouched() {
        assert_eq!(truncate_with_ellipsis("hello", 5), "hello");
    }

    #[test]
    fn long_string_cut_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
    }

    #[test]
    fn multibyte_boundary_safe() {
        let s = "héllo wörld";
        let out = truncate_with_ellipsis(s, 6);
        assert!(out.ends_with("..."));
        assert!(out.chars().count() <= 9);
    }

    #[test]
    fn trailing_whitespace_trimmed_before_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello   world", 7), "hello...");
    }
}
