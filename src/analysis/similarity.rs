//! Similarity between normalized names
//!
//! Scores are the normalized indel similarity on a 0-100 scale: only
//! insertions and deletions count, so a substitution costs two edits.

use rapidfuzz::fuzz;

/// Similarity score in [0, 100]. Symmetric; two empty strings score 100.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    fuzz::ratio(a.chars(), b.chars()) * 100.0
}

/// Highest score two strings of these lengths could reach.
///
/// Used to skip records that cannot pass a threshold without scoring them.
pub fn max_ratio(len_a: usize, len_b: usize) -> f64 {
    let total = len_a + len_b;
    if total == 0 {
        return 100.0;
    }
    200.0 * len_a.min(len_b) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        assert!((ratio("nike store", "nike store") - 100.0).abs() < 1e-9);
        assert!((ratio("", "") - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_empty() {
        assert!(ratio("abc", "").abs() < 1e-9);
        assert!(ratio("", "abc").abs() < 1e-9);
    }

    #[test]
    fn test_known_scores() {
        // 200 * 9 / 19
        assert!((ratio("nike store", "nikestore") - 94.736_842).abs() < 1e-4);
        // 200 * 9 / 19
        assert!((ratio("nike store", "nike stor") - 94.736_842).abs() < 1e-4);
        // 200 * 11 / 24
        assert!((ratio("the big store", "thebigstore") - 91.666_666).abs() < 1e-4);
        // One substitution in ten characters
        assert!((ratio("abcdefghix", "abcdefghiy") - 90.0).abs() < 1e-9);
        assert!(ratio("nike", "adidas") < 50.0);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [("nike store", "nike stor"), ("abc", "xyz"), ("kitten", "sitting")];
        for (a, b) in pairs {
            assert!((ratio(a, b) - ratio(b, a)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_max_ratio_bounds_actual_ratio() {
        let pairs = [
            ("nike store", "completely different store name"),
            ("the big store", "thebigstore"),
            ("a", "abcdefghij"),
        ];
        for (a, b) in pairs {
            let bound = max_ratio(a.chars().count(), b.chars().count());
            assert!(ratio(a, b) <= bound + 1e-9, "{} vs {}", a, b);
        }
    }
}
