//! Path patterns and relative path helpers for isorun
//!
//! Merge filters are expressed as [`WildcardPath`] patterns over
//! root-relative paths written with a leading slash (`/src/lib.rs`). The only
//! metacharacter is `*`, which matches any run of characters including `/`.

use std::fmt;
use std::path::{Component, Path};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// A compiled wildcard pattern over root-relative paths.
///
/// The pattern `/src/*` compiles to the anchored regular expression
/// `^/src/.*$`. Two patterns compare equal when their source text is equal.
#[derive(Clone)]
pub struct WildcardPath {
    pattern: String,
    exact: Regex,
    subtree: Regex,
}

impl WildcardPath {
    /// Compile a wildcard pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let exact_src = format!("^{}$", body);

        // A pattern naming a directory also covers everything beneath it.
        let subtree_src = if let Some(stem) = exact_src.strip_suffix("/.*$") {
            format!("{}(/.*)?$", stem)
        } else if let Some(stem) = exact_src.strip_suffix("/$") {
            format!("{}(/.*)?$", stem)
        } else {
            exact_src.clone()
        };

        Ok(Self {
            pattern: pattern.to_string(),
            exact: Regex::new(&exact_src)?,
            subtree: Regex::new(&subtree_src)?,
        })
    }

    /// The pattern text this wildcard was compiled from.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whole-string match of `path` against the pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.exact.is_match(path)
    }

    /// Like [`matches`](Self::matches), but a pattern ending in `/` or `/*`
    /// also matches the directory itself and every path beneath it.
    pub fn matches_path(&self, path: &str) -> bool {
        self.subtree.is_match(path)
    }
}

impl fmt::Debug for WildcardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WildcardPath").field(&self.pattern).finish()
    }
}

impl fmt::Display for WildcardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl PartialEq for WildcardPath {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for WildcardPath {}

impl Serialize for WildcardPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

impl<'de> Deserialize<'de> for WildcardPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        WildcardPath::new(&pattern).map_err(serde::de::Error::custom)
    }
}

/// Inclusion and exclusion patterns applied to root-relative paths.
///
/// An empty filter accepts every path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFilter {
    #[serde(default)]
    pub inclusions: Vec<WildcardPath>,
    #[serde(default)]
    pub exclusions: Vec<WildcardPath>,
}

impl PathFilter {
    /// Compile a filter from raw pattern strings.
    pub fn from_patterns<I, E>(inclusions: I, exclusions: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Ok(Self {
            inclusions: inclusions
                .into_iter()
                .map(|p| WildcardPath::new(p.as_ref()))
                .collect::<Result<_>>()?,
            exclusions: exclusions
                .into_iter()
                .map(|p| WildcardPath::new(p.as_ref()))
                .collect::<Result<_>>()?,
        })
    }

    /// Decide whether `location` is left out of a merge.
    ///
    /// The deletion marker is stripped before matching, so a tombstone is
    /// filtered exactly like the path it deletes. With a non-empty inclusion
    /// list, a location matching none of the inclusions is skipped. Any
    /// location covered by an exclusion is skipped.
    pub fn should_skip(&self, location: &str, deleted_marker: &str) -> bool {
        let location = if deleted_marker.is_empty() {
            location.to_string()
        } else {
            location.replace(deleted_marker, "")
        };

        if !self.inclusions.is_empty() && !self.inclusions.iter().any(|p| p.matches(&location)) {
            return true;
        }

        self.exclusions.iter().any(|p| p.matches_path(&location))
    }

    /// True when the filter accepts everything.
    pub fn is_empty(&self) -> bool {
        self.inclusions.is_empty() && self.exclusions.is_empty()
    }
}

/// Render a relative path as a slash-prefixed location (`a/b` becomes `/a/b`).
pub fn to_location(relative: &Path) -> String {
    let mut location = String::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            location.push('/');
            location.push_str(&part.to_string_lossy());
        }
    }
    location
}

/// Number of normal components in a relative path.
pub fn depth(relative: &Path) -> usize {
    relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// Encode an identifier into a single filesystem-safe path component.
///
/// Separators and characters that are unsafe on common filesystems are
/// replaced; `.` and `..` are never produced on their own.
pub fn encode_path_component(id: &str) -> String {
    let encoded: String = id
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect();
    match encoded.as_str() {
        "" => "_".to_string(),
        "." | ".." => encoded.replace('.', "_"),
        _ => encoded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_wildcard_exact_match() {
        let p = WildcardPath::new("/src/*.rs").unwrap();
        assert!(p.matches("/src/main.rs"));
        assert!(p.matches("/src/nested/lib.rs"));
        assert!(!p.matches("/src/main.rsx"));
        assert!(!p.matches("/other/src/main.rs"));
    }

    #[test]
    fn test_wildcard_quotes_regex_metacharacters() {
        let p = WildcardPath::new("/a.b(c)/[x]+").unwrap();
        assert!(p.matches("/a.b(c)/[x]+"));
        assert!(!p.matches("/aXb(c)/[x]+"));
        assert!(!p.matches("/a.b(c)/xx"));
    }

    #[test]
    fn test_wildcard_matches_path_covers_subtree() {
        let slash_star = WildcardPath::new("/build/*").unwrap();
        assert!(slash_star.matches_path("/build"));
        assert!(slash_star.matches_path("/build/out/bin"));
        assert!(!slash_star.matches_path("/builder"));

        let trailing_slash = WildcardPath::new("/target/").unwrap();
        assert!(trailing_slash.matches_path("/target"));
        assert!(trailing_slash.matches_path("/target/debug"));
        assert!(!trailing_slash.matches("/target"));

        let plain = WildcardPath::new("/docs").unwrap();
        assert!(plain.matches_path("/docs"));
        assert!(!plain.matches_path("/docs/readme.md"));
    }

    #[test]
    fn test_wildcard_equality_by_pattern() {
        assert_eq!(
            WildcardPath::new("/a/*").unwrap(),
            WildcardPath::new("/a/*").unwrap()
        );
        assert_ne!(
            WildcardPath::new("/a/*").unwrap(),
            WildcardPath::new("/b/*").unwrap()
        );
    }

    #[test]
    fn test_wildcard_serde_roundtrip_through_yaml() {
        let filter: PathFilter =
            serde_yaml::from_str("inclusions: ['/src/*']\nexclusions: ['/src/gen/']\n").unwrap();
        assert_eq!(filter.inclusions[0].as_str(), "/src/*");
        assert_eq!(filter.exclusions[0].as_str(), "/src/gen/");
    }

    #[test]
    fn test_should_skip_empty_filter_accepts_all() {
        let filter = PathFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.should_skip("/anything/at/all", "_HIDDEN~"));
    }

    #[test]
    fn test_should_skip_inclusions() {
        let filter = PathFilter::from_patterns(["/src/*"], Vec::<&str>::new()).unwrap();
        assert!(!filter.should_skip("/src/lib.rs", "_HIDDEN~"));
        assert!(filter.should_skip("/README.md", "_HIDDEN~"));
    }

    #[test]
    fn test_should_skip_exclusions_win() {
        let filter = PathFilter::from_patterns(["/src/*"], ["/src/generated/*"]).unwrap();
        assert!(!filter.should_skip("/src/lib.rs", "_HIDDEN~"));
        assert!(filter.should_skip("/src/generated", "_HIDDEN~"));
        assert!(filter.should_skip("/src/generated/out.rs", "_HIDDEN~"));
    }

    #[test]
    fn test_should_skip_strips_deleted_marker() {
        let filter = PathFilter::from_patterns(Vec::<&str>::new(), ["/secret"]).unwrap();
        assert!(filter.should_skip("/secret_HIDDEN~", "_HIDDEN~"));
        assert!(!filter.should_skip("/public_HIDDEN~", "_HIDDEN~"));
    }

    #[test]
    fn test_to_location_and_depth() {
        assert_eq!(to_location(&PathBuf::from("a/b/c.txt")), "/a/b/c.txt");
        assert_eq!(to_location(&PathBuf::from("")), "");
        assert_eq!(depth(&PathBuf::from("a/b/c.txt")), 3);
        assert_eq!(depth(&PathBuf::from("")), 0);
    }

    #[test]
    fn test_encode_path_component() {
        assert_eq!(encode_path_component("lint/fix"), "lint-fix");
        assert_eq!(encode_path_component("a b:c"), "a_b_c");
        assert_eq!(encode_path_component(".."), "__");
        assert_eq!(encode_path_component(""), "_");
        assert_eq!(encode_path_component("step-1.v2_x"), "step-1.v2_x");
    }
}
