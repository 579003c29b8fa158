//! Resource and tester identifiers
//!
//! Provides [`ResourceId`], the opaque id carried by every persisted entity,
//! and [`TesterId`] for the humans executing a checklist.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

/// Prefix reserved for ids that were minted locally and never persisted.
///
/// Server-assigned ids never start with this prefix.
pub const LOCAL_PREFIX: &str = "local-";

/// Opaque identifier of a resource
///
/// Two flavours exist:
/// - server ids, assigned by the resource store on create
/// - local-only ids (`local-<ulid>`), minted by a draft for resources that
///   exist only in the working copy
///
/// # Examples
/// - `srv-12` → server id
/// - `local-01HZX3J8Q6...` → local-only id
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap a server-assigned id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh local-only id
    ///
    /// ULIDs are timestamp-prefixed with 80 random bits, so two ids minted in
    /// the same session never collide.
    #[inline]
    #[must_use]
    pub fn local() -> Self {
        Self(format!("{LOCAL_PREFIX}{}", Ulid::new()))
    }

    /// Whether this id was minted locally and has no server counterpart
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        if trimmed.len() != s.len() {
            return Err(IdError::Whitespace(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a tester assigned to a project
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TesterId(String);

impl TesterId {
    /// Create tester id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TesterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TesterId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Id parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Empty id
    #[error("id must not be empty")]
    Empty,

    /// Leading or trailing whitespace
    #[error("id has surrounding whitespace: '{0}'")]
    Whitespace(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_marked() {
        let id = ResourceId::local();
        assert!(id.is_local());
        assert!(id.as_str().starts_with(LOCAL_PREFIX));
    }

    #[test]
    fn server_ids_are_not_local() {
        assert!(!ResourceId::new("srv-1").is_local());
        assert!(!ResourceId::new("42").is_local());
    }

    #[test]
    fn local_ids_do_not_collide() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| ResourceId::local()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn parse_rejects_empty_and_padded() {
        assert_eq!(ResourceId::from_str(""), Err(IdError::Empty));
        assert!(matches!(
            ResourceId::from_str(" srv-1"),
            Err(IdError::Whitespace(_))
        ));
        assert_eq!(ResourceId::from_str("srv-1").unwrap().as_str(), "srv-1");
    }

    #[test]
    fn serde_is_transparent() {
        let id = ResourceId::new("srv-7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"srv-7\"");
    }
}
