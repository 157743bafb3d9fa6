//! Property-based tests for wildcard matching and path encoding.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{encode_path_component, PathFilter, WildcardPath};
    use proptest::prelude::*;

    // ============================================================================
    // WildcardPath property tests
    // ============================================================================

    proptest! {
        /// Property: a pattern without `*` matches exactly its own text
        #[test]
        fn literal_pattern_matches_only_itself(
            literal in "/[a-zA-Z0-9._()+\\[\\]?^$|-]{1,20}",
            other in "/[a-zA-Z0-9._-]{1,20}",
        ) {
            let p = WildcardPath::new(&literal).unwrap();
            prop_assert!(p.matches(&literal));
            if other != literal {
                prop_assert!(!p.matches(&other));
            }
        }

        /// Property: `prefix/*` covers every path under prefix
        #[test]
        fn directory_wildcard_covers_descendants(
            prefix in "/[a-z]{1,8}",
            rest in "[a-z]{1,8}(/[a-z]{1,8}){0,3}",
        ) {
            let p = WildcardPath::new(&format!("{}/*", prefix)).unwrap();
            let child = format!("{}/{}", prefix, rest);
            prop_assert!(p.matches(&child));
            prop_assert!(p.matches_path(&child));
            prop_assert!(p.matches_path(&prefix));
        }

        /// Property: matches implies matches_path
        #[test]
        fn exact_match_implies_path_match(
            pattern in "/[a-z*]{0,6}(/[a-z*]{0,6}){0,2}/?",
            path in "/[a-z]{0,6}(/[a-z]{0,6}){0,2}",
        ) {
            let p = WildcardPath::new(&pattern).unwrap();
            if p.matches(&path) {
                prop_assert!(p.matches_path(&path));
            }
        }

        /// Property: a tombstone is filtered exactly like the path it deletes
        #[test]
        fn tombstone_filtered_like_its_path(
            path in "/[a-z]{1,6}(/[a-z]{1,6}){0,2}",
            excluded in "/[a-z]{1,6}",
        ) {
            let filter = PathFilter::from_patterns(Vec::<&str>::new(), [format!("{}/*", excluded)]).unwrap();
            let tombstone = format!("{}_HIDDEN~", path);
            prop_assert_eq!(
                filter.should_skip(&path, "_HIDDEN~"),
                filter.should_skip(&tombstone, "_HIDDEN~")
            );
        }
    }

    // ============================================================================
    // encode_path_component property tests
    // ============================================================================

    proptest! {
        /// Property: encoded ids never contain separators or unsafe characters
        #[test]
        fn encode_never_produces_unsafe_chars(input in ".*") {
            let result = encode_path_component(&input);
            for ch in ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'] {
                prop_assert!(!result.contains(ch));
            }
            prop_assert!(!result.is_empty());
            prop_assert!(result != "." && result != "..");
        }

        /// Property: already-safe identifiers pass through unchanged
        #[test]
        fn encode_preserves_safe_ids(input in "[a-zA-Z0-9_-][a-zA-Z0-9._-]{0,30}") {
            prop_assume!(input != "." && input != "..");
            prop_assert_eq!(encode_path_component(&input), input);
        }
    }
}
