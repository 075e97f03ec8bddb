//! Invalidation scopes and the write-trigger registry

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::key::UserCacheKeys;
use crate::domain::user::{RangeDimension, UserChanges, UserField};

/// A family of derived-query cache entries that are dropped together
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvalidationScope {
    pattern: String,
}

impl InvalidationScope {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Glob pattern in cache-store scan syntax
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Display for InvalidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Maps writes to the scopes they must drop. Built once from the key scheme.
///
/// Invalidation is scope-granular: any write that can change a range result
/// drops every cached range on that dimension. This over-invalidates but never
/// leaves a stale range entry behind.
#[derive(Debug, Clone)]
pub struct InvalidationRegistry {
    on_create: Vec<InvalidationScope>,
    by_field: BTreeMap<UserField, Vec<InvalidationScope>>,
}

impl InvalidationRegistry {
    pub fn new(keys: &UserCacheKeys) -> Self {
        let mut on_create = Vec::new();
        let mut by_field: BTreeMap<UserField, Vec<InvalidationScope>> = BTreeMap::new();

        for dimension in RangeDimension::ALL {
            let scope = keys.range_scope(dimension);
            on_create.push(scope.clone());
            by_field.entry(dimension.field()).or_default().push(scope);
        }

        Self {
            on_create,
            by_field,
        }
    }

    /// A new row may fall into any cached range
    pub fn scopes_for_create(&self) -> &[InvalidationScope] {
        &self.on_create
    }

    /// Scopes whose results can change when these fields change. Empty when
    /// no changed field is a range dimension.
    pub fn scopes_for_update(&self, changes: &UserChanges) -> Vec<InvalidationScope> {
        let mut scopes: Vec<InvalidationScope> = changes
            .changed_fields()
            .into_iter()
            .filter_map(|field| self.by_field.get(&field))
            .flatten()
            .cloned()
            .collect();

        scopes.sort();
        scopes.dedup();
        scopes
    }
}

/// The write committed but some cache entries could not be dropped. They may
/// serve stale data until their TTL runs out.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Cache invalidation incomplete for {targets:?}: {message}")]
pub struct InvalidationIncomplete {
    /// Keys or scope patterns that may still hold stale entries
    pub targets: Vec<String>,
    pub message: String,
}

impl InvalidationIncomplete {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            targets: vec![target.into()],
            message: message.into(),
        }
    }

    /// Fold another failure into this one
    pub fn merge(mut self, other: InvalidationIncomplete) -> Self {
        self.targets.extend(other.targets);
        self.message = format!("{}; {}", self.message, other.message);
        self
    }
}
