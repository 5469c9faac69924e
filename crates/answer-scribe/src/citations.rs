//! Citation scanner: distinct `[n]` markers in the answer markup.

use crate::types::CitationSet;
use regex::Regex;
use std::sync::OnceLock;

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("valid citation regex"))
}

/// Collect every positive number written as `[n]` anywhere in `markup`.
///
/// The scan runs over the raw serialized HTML, not just text nodes; citation
/// markers do not occur inside attribute values on the answer page.
pub fn scan_citations(markup: &str) -> CitationSet {
    marker_pattern()
        .captures_iter(markup)
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_sorted_numbers() {
        let set = scan_citations("<p>Claim [3] and [1], again [1].</p>");
        assert_eq!(set.iter().collect::<Vec<_>>(), [1, 3]);
    }

    #[test]
    fn test_empty_input() {
        assert!(scan_citations("").is_empty());
        assert!(scan_citations("<p>no markers</p>").is_empty());
    }

    #[test]
    fn test_idempotent_under_duplication() {
        let markup = r#"<p>A [12]</p><span class="ref">[4]</span>"#;
        let once = scan_citations(markup);
        assert_eq!(once, scan_citations(markup));
        assert_eq!(once, scan_citations(&format!("{markup}{markup}")));
    }

    #[test]
    fn test_ignores_malformed_and_zero() {
        let set = scan_citations("[a] [] [ 2] [0] [99999999999999] [7]");
        assert_eq!(set.iter().collect::<Vec<_>>(), [7]);
    }

    #[test]
    fn test_markers_split_across_tags_are_not_matched() {
        let set = scan_citations("<sup>[<a>5</a>]</sup> [6]");
        assert_eq!(set.iter().collect::<Vec<_>>(), [6]);
        assert_eq!(set.max(), Some(6));
    }
}
