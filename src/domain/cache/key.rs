//! Cache key derivation and key patterns

use std::fmt;

use regex::Regex;

use super::scope::InvalidationScope;
use crate::domain::DomainError;
use crate::domain::user::{RangeDimension, UserId};

const DEFAULT_POINT_NAMESPACE: &str = "user";
const DEFAULT_RANGE_NAMESPACE: &str = "users";

/// Derives cache keys from query shapes.
///
/// - point lookups: `<point_ns>:<id>` (e.g. `user:42`)
/// - range lookups: `<range_ns>:<dimension>:<low>-<high>` (e.g. `users:age:20-30`)
///
/// The same query always yields the same key. IDs and bounds are integers and
/// the namespaces differ, so two distinct queries never share a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCacheKeys {
    point_namespace: String,
    range_namespace: String,
}

impl Default for UserCacheKeys {
    fn default() -> Self {
        Self {
            point_namespace: DEFAULT_POINT_NAMESPACE.to_string(),
            range_namespace: DEFAULT_RANGE_NAMESPACE.to_string(),
        }
    }
}

impl UserCacheKeys {
    /// Creates a key scheme with custom namespaces
    pub fn new(
        point_namespace: impl Into<String>,
        range_namespace: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let point_namespace = point_namespace.into();
        let range_namespace = range_namespace.into();

        validate_namespace(&point_namespace)?;
        validate_namespace(&range_namespace)?;

        if point_namespace == range_namespace {
            return Err(DomainError::configuration(format!(
                "Point and range cache namespaces must differ, both are '{}'",
                point_namespace
            )));
        }

        Ok(Self {
            point_namespace,
            range_namespace,
        })
    }

    pub fn point_key(&self, id: UserId) -> String {
        format!("{}:{}", self.point_namespace, id)
    }

    pub fn range_key(&self, dimension: RangeDimension, low: i64, high: i64) -> String {
        format!("{}:{}:{}-{}", self.range_namespace, dimension, low, high)
    }

    /// Scope covering every cached range result on `dimension`
    pub fn range_scope(&self, dimension: RangeDimension) -> InvalidationScope {
        InvalidationScope::new(format!("{}:{}:*", self.range_namespace, dimension))
    }
}

fn validate_namespace(namespace: &str) -> Result<(), DomainError> {
    if namespace.is_empty() {
        return Err(DomainError::configuration("Cache namespace cannot be empty"));
    }

    if let Some(c) = namespace
        .chars()
        .find(|c| matches!(c, '*' | '?' | '[' | ']' | '\\' | ':') || c.is_whitespace())
    {
        return Err(DomainError::configuration(format!(
            "Cache namespace '{}' contains reserved character '{}'",
            namespace, c
        )));
    }

    Ok(())
}

/// Glob pattern over cache keys, using the cache store's scan syntax:
/// `*` matches any run of characters, `?` exactly one. Everything else is literal
/// and the whole key must match.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    glob: String,
    regex: Regex,
}

impl KeyPattern {
    pub fn new(glob: impl Into<String>) -> Result<Self, DomainError> {
        let glob = glob.into();
        let mut source = String::with_capacity(glob.len() + 8);
        source.push('^');

        for c in glob.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }

        source.push('$');

        let regex = Regex::new(&source)
            .map_err(|e| DomainError::cache(format!("Invalid pattern '{}': {}", glob, e)))?;

        Ok(Self { glob, regex })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: i64) -> UserId {
        UserId::new(value).unwrap()
    }

    #[test]
    fn test_default_key_formats() {
        let keys = UserCacheKeys::default();

        assert_eq!(keys.point_key(id(1)), "user:1");
        assert_eq!(keys.range_key(RangeDimension::Age, 20, 30), "users:age:20-30");
        assert_eq!(keys.range_scope(RangeDimension::Age).pattern(), "users:age:*");
    }

    #[test]
    fn test_same_query_same_key() {
        let keys = UserCacheKeys::default();
        assert_eq!(
            keys.range_key(RangeDimension::Age, 20, 30),
            keys.range_key(RangeDimension::Age, 20, 30)
        );
    }

    #[test]
    fn test_distinct_queries_never_collide() {
        let keys = UserCacheKeys::default();
        let generated = [
            keys.point_key(id(1)),
            keys.point_key(id(12)),
            keys.range_key(RangeDimension::Age, 1, 23),
            keys.range_key(RangeDimension::Age, 12, 3),
            keys.range_key(RangeDimension::Age, -1, 2),
            keys.range_key(RangeDimension::Age, 1, -2),
        ];

        let unique: std::collections::HashSet<_> = generated.iter().collect();
        assert_eq!(unique.len(), generated.len());
    }

    #[test]
    fn test_custom_namespaces() {
        let keys = UserCacheKeys::new("member", "members").unwrap();
        assert_eq!(keys.point_key(id(5)), "member:5");
        assert_eq!(keys.range_key(RangeDimension::Age, 1, 2), "members:age:1-2");
    }

    #[test]
    fn test_invalid_namespaces() {
        assert!(UserCacheKeys::new("", "users").is_err());
        assert!(UserCacheKeys::new("user*", "users").is_err());
        assert!(UserCacheKeys::new("a:b", "users").is_err());
        assert!(UserCacheKeys::new("same", "same").is_err());
    }

    #[test]
    fn test_range_scope_does_not_match_point_keys() {
        let keys = UserCacheKeys::default();
        let pattern = KeyPattern::new(keys.range_scope(RangeDimension::Age).pattern()).unwrap();

        assert!(pattern.matches(&keys.range_key(RangeDimension::Age, 20, 30)));
        assert!(!pattern.matches(&keys.point_key(id(1))));
    }

    #[test]
    fn test_key_pattern_glob() {
        let pattern = KeyPattern::new("user:*:profile").unwrap();
        assert!(pattern.matches("user:1:profile"));
        assert!(pattern.matches("user::profile"));
        assert!(!pattern.matches("user:1:profile:extra"));
        assert!(!pattern.matches("xuser:1:profile"));

        let single = KeyPattern::new("user:?").unwrap();
        assert!(single.matches("user:1"));
        assert!(!single.matches("user:12"));
    }

    #[test]
    fn test_key_pattern_escapes_regex_metacharacters() {
        let pattern = KeyPattern::new("a.b+*").unwrap();
        assert!(pattern.matches("a.b+c"));
        assert!(!pattern.matches("axb+c"));
    }
}
