// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Process addressing
//!
//! The `path` module provides the `ProcessId` and `ProcessName` types.
//! A `ProcessId` is the hierarchical address of a process in the runtime,
//! a `ProcessName` is one validated segment of such an address.
//!

use crate::Error;

use serde::{Deserialize, Serialize};

use std::cmp::Ordering;
use std::fmt::{self, Formatter};
use std::str::FromStr;

/// Path separator in the canonical string form.
const SEPARATOR: char = '/';

/// Reserved head segment of role identifiers.
const ROLE_HEAD: &str = "role";

/// A single validated path segment.
///
/// Segment values are normalized to ASCII lowercase on construction and are
/// restricted to `[a-z0-9._-]`. The separator, whitespace and any other
/// punctuation are rejected, so a `ProcessName` can always be embedded in a
/// canonical path string without escaping. Equality, ordering and hashing
/// use the normalized value.
#[derive(
    Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessName(String);

impl ProcessName {
    /// Parses and validates a single path segment.
    ///
    /// # Arguments
    ///
    /// * `segment` - The raw segment. Surrounding whitespace is trimmed and
    ///   the remainder is lowercased before validation.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSegment` if the segment is empty after
    /// trimming or contains a character outside `[a-z0-9._-]`.
    ///
    pub fn parse(segment: &str) -> Result<Self, Error> {
        let normalized = segment.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(Error::InvalidSegment(segment.to_owned()));
        }
        let valid = normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(Error::InvalidSegment(segment.to_owned()));
        }
        Ok(ProcessName(normalized))
    }

    /// Returns the normalized segment value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ProcessName {
    type Error = Error;

    fn try_from(segment: &str) -> Result<Self, Self::Error> {
        ProcessName::parse(segment)
    }
}

impl TryFrom<String> for ProcessName {
    type Error = Error;

    fn try_from(segment: String) -> Result<Self, Self::Error> {
        ProcessName::parse(&segment)
    }
}

impl FromStr for ProcessName {
    type Err = Error;

    fn from_str(segment: &str) -> Result<Self, Self::Err> {
        ProcessName::parse(segment)
    }
}

impl From<ProcessName> for String {
    fn from(name: ProcessName) -> Self {
        name.0
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ProcessName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node identities are path segments: a worker on node `n` lives at
/// `/<n>/<leaf>`.
pub type NodeId = ProcessName;

/// Hierarchical process identifier.
///
/// A `ProcessId` is an immutable, ordered sequence of validated segments
/// beneath the runtime's well-known root. The root itself is implicit and
/// elided from the canonical string form, so `/a/b` addresses the process
/// `b` supervised by the top-level process `a`.
///
/// All derivation methods (`append`, `skip`, `parent`, the `/` operator)
/// produce new values and never mutate in place. Identifiers are freely
/// comparable, hashable and serializable through their canonical string
/// form, which round-trips: `parse(format(p)) == p`.
///
/// The reserved two-segment form `/role/<role-name>` addresses a *role*, a
/// logical pool of equivalent workers distributed across the cluster. A
/// resolver intercepts such identifiers and yields a role router instead of
/// a single process dispatcher; see [`as_role`](ProcessId::as_role).
#[derive(
    Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessId(Vec<ProcessName>);

impl ProcessId {
    /// The empty identifier, parent of all top-level processes.
    pub fn empty() -> Self {
        ProcessId(Vec::new())
    }

    /// Builds an identifier from already validated segments.
    pub fn from_segments(segments: Vec<ProcessName>) -> Self {
        ProcessId(segments)
    }

    /// Parses an identifier from its canonical string form.
    ///
    /// Segments are separated by `/`. A leading separator is optional and
    /// consecutive separators collapse, so `/a/b`, `a/b` and `/a//b/` all
    /// parse to the same identifier. Each surviving segment is validated as
    /// a [`ProcessName`].
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSegment` for the first segment that fails
    /// validation.
    ///
    pub fn parse(path: &str) -> Result<Self, Error> {
        let mut segments = Vec::new();
        for token in path.split(SEPARATOR) {
            if token.trim().is_empty() {
                continue;
            }
            segments.push(ProcessName::parse(token)?);
        }
        Ok(ProcessId(segments))
    }

    /// Builds the reserved role identifier `/role/<name>`.
    pub fn role(name: &str) -> Result<Self, Error> {
        Ok(Self::role_id(&ProcessName::parse(name)?))
    }

    /// Builds the reserved role identifier from an already validated name.
    pub fn role_id(name: &ProcessName) -> Self {
        ProcessId(vec![ProcessName(ROLE_HEAD.to_owned()), name.clone()])
    }

    /// Returns the role name if this identifier is the reserved role form,
    /// `None` for ordinary process identifiers.
    pub fn as_role(&self) -> Option<&ProcessName> {
        if self.0.len() == 2 && self.0[0].as_str() == ROLE_HEAD {
            Some(&self.0[1])
        } else {
            None
        }
    }

    /// Returns the first segment, or `None` for the empty identifier.
    pub fn head(&self) -> Option<&ProcessName> {
        self.0.first()
    }

    /// Returns a new identifier with the first `n` segments removed.
    /// Skipping past the end yields the empty identifier.
    pub fn skip(&self, n: usize) -> Self {
        ProcessId(self.0.iter().skip(n).cloned().collect())
    }

    /// Returns a new identifier with `other`'s segments appended.
    pub fn append(&self, other: &ProcessId) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        ProcessId(segments)
    }

    /// Returns the parent identifier, removing the last segment. The parent
    /// of a top-level or empty identifier is the empty identifier.
    pub fn parent(&self) -> Self {
        if self.0.len() > 1 {
            let mut segments = self.0.clone();
            segments.truncate(segments.len() - 1);
            ProcessId(segments)
        } else {
            ProcessId(Vec::new())
        }
    }

    /// Returns the last segment as the process's own name, or `None` for
    /// the empty identifier.
    pub fn key(&self) -> Option<&ProcessName> {
        self.0.last()
    }

    /// Returns the number of segments.
    pub fn level(&self) -> usize {
        self.0.len()
    }

    /// True if this identifier has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if this identifier has exactly one segment.
    pub fn is_top_level(&self) -> bool {
        self.0.len() == 1
    }

    /// True if this identifier is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &ProcessId) -> bool {
        self.0.len() < other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// True if this identifier is a proper descendant of `other`.
    pub fn is_descendant_of(&self, other: &ProcessId) -> bool {
        other.is_ancestor_of(self)
    }

    /// True if this identifier is the direct parent of `other`.
    pub fn is_parent_of(&self, other: &ProcessId) -> bool {
        !other.is_empty() && *self == other.parent()
    }

    /// True if this identifier is a direct child of `other`.
    pub fn is_child_of(&self, other: &ProcessId) -> bool {
        other.is_parent_of(self)
    }

    /// Returns the validated segments in order.
    pub fn segments(&self) -> &[ProcessName] {
        &self.0
    }
}

impl From<ProcessName> for ProcessId {
    fn from(name: ProcessName) -> Self {
        ProcessId(vec![name])
    }
}

impl TryFrom<&str> for ProcessId {
    type Error = Error;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        ProcessId::parse(path)
    }
}

impl TryFrom<String> for ProcessId {
    type Error = Error;

    fn try_from(path: String) -> Result<Self, Self::Error> {
        ProcessId::parse(&path)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        ProcessId::parse(path)
    }
}

impl From<ProcessId> for String {
    fn from(id: ProcessId) -> Self {
        id.to_string()
    }
}

/// Extends an identifier with one more segment, mirroring filesystem path
/// syntax: `pid / name` addresses a child of `pid`.
impl std::ops::Div<ProcessName> for ProcessId {
    type Output = ProcessId;

    fn div(self, rhs: ProcessName) -> Self::Output {
        let mut segments = self.0;
        segments.push(rhs);
        ProcessId(segments)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.level().cmp(&1) {
            Ordering::Less => write!(f, "{}", SEPARATOR),
            _ => {
                for segment in &self.0 {
                    write!(f, "{}{}", SEPARATOR, segment)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn parse_empty_string() {
        let id = ProcessId::parse("").unwrap();
        assert!(id.is_empty());
        assert_eq!(id.to_string(), "/");
    }

    #[test]
    fn parse_single_root() {
        let id = ProcessId::parse("/acme").unwrap();
        assert_eq!(id.level(), 1);
        assert!(id.is_top_level());
    }

    #[test]
    fn parse_normalizes_case_and_separators() {
        let id = ProcessId::parse("/Acme//Building/").unwrap();
        assert_eq!(id.to_string(), "/acme/building");
    }

    #[test]
    fn parse_rejects_invalid_characters() {
        assert!(ProcessId::parse("/acme/bad segment").is_err());
        assert!(ProcessId::parse("/acme/worker:1").is_err());
        assert!(ProcessName::parse("").is_err());
        assert!(ProcessName::parse("a/b").is_err());
    }

    #[test]
    fn parse_accepts_restricted_punctuation() {
        let name = ProcessName::parse("worker-1_a.b").unwrap();
        assert_eq!(name.as_str(), "worker-1_a.b");
    }

    #[test]
    fn display_round_trip() {
        for raw in ["/", "/acme", "/acme/building/room/sensor"] {
            let id = ProcessId::parse(raw).unwrap();
            let reparsed = ProcessId::parse(&id.to_string()).unwrap();
            assert_eq!(id, reparsed);
        }
    }

    #[test]
    fn test_head_skip_append() {
        let id = ProcessId::parse("/acme/building/room").unwrap();
        assert_eq!(id.head().unwrap().as_str(), "acme");
        assert_eq!(id.skip(1).to_string(), "/building/room");
        assert_eq!(id.skip(5), ProcessId::empty());

        let leaf = ProcessId::parse("/workers/1").unwrap();
        let node = ProcessId::from(ProcessName::parse("node-a").unwrap());
        assert_eq!(node.append(&leaf).to_string(), "/node-a/workers/1");
    }

    #[test]
    fn test_parent_and_key() {
        let id = ProcessId::parse("/acme/building/room").unwrap();
        assert_eq!(id.parent().to_string(), "/acme/building");
        assert_eq!(id.key().unwrap().as_str(), "room");
        assert!(ProcessId::parse("/acme").unwrap().parent().is_empty());
        assert!(ProcessId::empty().key().is_none());
    }

    #[test]
    fn test_relationships() {
        let parent = ProcessId::parse("/acme/building").unwrap();
        let child = ProcessId::parse("/acme/building/room").unwrap();
        let grandchild =
            ProcessId::parse("/acme/building/room/sensor").unwrap();
        let sibling = ProcessId::parse("/acme/warehouse").unwrap();

        assert!(parent.is_parent_of(&child));
        assert!(child.is_child_of(&parent));
        assert!(!parent.is_parent_of(&grandchild));
        assert!(parent.is_ancestor_of(&grandchild));
        assert!(grandchild.is_descendant_of(&parent));
        assert!(!sibling.is_descendant_of(&parent));
        assert!(!parent.is_ancestor_of(&parent));
    }

    #[test]
    fn prefix_segments_do_not_alias() {
        let a = ProcessId::parse("/user").unwrap();
        let b = ProcessId::parse("/user2/worker").unwrap();
        assert!(!a.is_ancestor_of(&b));
    }

    #[test]
    fn test_div_operator() {
        let id = ProcessId::parse("/acme").unwrap();
        let child = id.clone() / ProcessName::parse("child").unwrap();
        assert!(id.is_parent_of(&child));
        assert_eq!(child.to_string(), "/acme/child");
    }

    #[test]
    fn test_role_identifier() {
        let role = ProcessId::role("workers").unwrap();
        assert_eq!(role.to_string(), "/role/workers");
        assert_eq!(role.as_role().unwrap().as_str(), "workers");

        let ordinary = ProcessId::parse("/node/workers").unwrap();
        assert!(ordinary.as_role().is_none());
        let deep = ProcessId::parse("/role/workers/extra").unwrap();
        assert!(deep.as_role().is_none());
    }

    #[test]
    fn test_canonical_string_conversion() {
        // Serde goes through the same String conversions and re-validates.
        let id = ProcessId::parse("/acme/building").unwrap();
        let canonical = String::from(id.clone());
        assert_eq!(canonical, "/acme/building");
        assert_eq!(ProcessId::try_from(canonical).unwrap(), id);
    }
}
