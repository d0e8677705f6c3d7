//! Text shaping helpers shared by prompt building and rendering.

/// Truncates text to at most `max_chars` characters, ending with "..." when
/// anything was cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

/// Converts `snake_case` identifiers to "Title Case" words.
pub fn title_case(identifier: &str) -> String {
    identifier
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders an optional value for display, using "[empty]" for missing or
/// blank values.
pub fn value_preview(value: Option<&str>, max_chars: usize) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => truncate_text(v, max_chars),
        _ => "[empty]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate_text("budget", 10), "budget");
    }

    #[test]
    fn truncate_exact_length_unchanged() {
        assert_eq!(truncate_text("abcde", 5), "abcde");
    }

    #[test]
    fn truncate_long_text() {
        assert_eq!(truncate_text("abcdefghij", 6), "abc...");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_text("ééééé", 5), "ééééé");
        assert_eq!(truncate_text("éééééé", 5), "éé...");
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("sp_campaign_notes"), "Sp Campaign Notes");
        assert_eq!(title_case("__double__underscore"), "Double Underscore");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn value_preview_empty_values() {
        assert_eq!(value_preview(None, 10), "[empty]");
        assert_eq!(value_preview(Some("  "), 10), "[empty]");
        assert_eq!(value_preview(Some("42"), 10), "42");
    }
}
