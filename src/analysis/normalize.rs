//! Store name normalization
//!
//! Two forms are kept apart: the display form is what gets stored and
//! relayed, the match form only ever exists inside the duplicate index.

/// Collapse whitespace runs (including newlines) to a single space and trim.
///
/// Case and punctuation are preserved.
pub fn normalize_display(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form used for fuzzy comparison.
///
/// Lowercases, drops everything that is not an ASCII letter, digit or
/// whitespace, then collapses whitespace runs and trims.
pub fn normalize_for_match(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();

    normalize_display(&kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_basic() {
        assert_eq!(normalize_display("  Nike   Store  "), "Nike Store");
    }

    #[test]
    fn test_display_multiple_spaces() {
        assert_eq!(normalize_display("The    Big     Store"), "The Big Store");
    }

    #[test]
    fn test_display_newlines() {
        assert_eq!(normalize_display("Store\n\nName"), "Store Name");
        assert_eq!(normalize_display("\tA\r\nB "), "A B");
    }

    #[test]
    fn test_display_keeps_case_and_punctuation() {
        assert_eq!(normalize_display("H&M  Kids!"), "H&M Kids!");
    }

    #[test]
    fn test_match_form() {
        assert_eq!(normalize_for_match("Nike Store"), "nike store");
        assert_eq!(normalize_for_match("  NIKE   STORE!! "), "nike store");
        assert_eq!(normalize_for_match("H&M Kids"), "hm kids");
        assert_eq!(normalize_for_match("Store\n#1"), "store 1");
    }

    #[test]
    fn test_match_form_drops_non_ascii() {
        assert_eq!(normalize_for_match("Café Ünique"), "caf nique");
        assert_eq!(normalize_for_match("好店"), "");
    }

    #[test]
    fn test_match_form_removed_punctuation_does_not_leave_gaps() {
        // Punctuation between words is removed without inserting a space
        assert_eq!(normalize_for_match("a - b"), "a b");
        assert_eq!(normalize_for_match("a-b"), "ab");
    }

    #[test]
    fn test_match_form_is_idempotent() {
        let samples = [
            "",
            "   ",
            "Nike Store",
            "The  Big\nStore",
            "Ümlaut & Co. 2024",
            "ALL CAPS!!!",
            "mixed\t\tTabs  and\r\nlines",
            "İstanbul",
        ];

        for s in samples {
            let once = normalize_for_match(s);
            assert_eq!(normalize_for_match(&once), once, "not idempotent for {:?}", s);
        }
    }
}
