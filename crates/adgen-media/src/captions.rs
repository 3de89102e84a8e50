//! Caption text preparation.

/// Characters removed from caption text before it reaches `drawtext`.
const STRIPPED: &[char] = &['\'', '"', '`', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];

/// Make segment text safe and short enough to burn in as a caption.
///
/// Quote characters and control characters are dropped, all whitespace
/// runs (including newlines) collapse to one space, and the result is cut
/// to at most `max_chars` characters on a char boundary.
pub fn sanitize_caption(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    collapsed
        .chars()
        .take(max_chars)
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_quotes() {
        assert_eq!(
            sanitize_caption("Don't miss \u{201C}the\u{201D} \"sale\"", 90),
            "Dont miss the sale"
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(sanitize_caption("  Fresh\n\nbread \t daily  ", 90), "Fresh bread daily");
    }

    #[test]
    fn test_caps_length_on_char_boundary() {
        let text = "é".repeat(100);
        let out = sanitize_caption(&text, 90);
        assert_eq!(out.chars().count(), 90);
    }

    #[test]
    fn test_quotes_only_becomes_empty() {
        assert_eq!(sanitize_caption("''\"", 90), "");
    }

    #[test]
    fn test_keeps_filter_metacharacters_for_escaping() {
        // Escaping happens in the filter serializer, not here
        assert_eq!(sanitize_caption("50% off: [today], only;", 90), "50% off: [today], only;");
    }
}
