#![forbid(unsafe_code)]

mod parse;

use crate::instant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use time::OffsetDateTime;

pub const ID_PREFIX: &str = "info:fedora";
pub const FCR_VERSIONS: &str = "fcr:versions";
pub const FCR_METADATA: &str = "fcr:metadata";
pub const FCR_ACL: &str = "fcr:acl";
pub const FCR_TOMBSTONE: &str = "fcr:tombstone";

/// Identifier of a repository resource.
///
/// The full id keeps every extension (`fcr:versions/<label>`, `fcr:acl`, ...);
/// the base id strips them and names the canonical resource that containment
/// is tracked against.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    full_id: String,
    base_id: String,
    hash_uri: Option<String>,
    kind: IdKind,
    memento_instant: Option<OffsetDateTime>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct IdKind {
    pub(crate) root: bool,
    pub(crate) memento: bool,
    pub(crate) timemap: bool,
    pub(crate) acl: bool,
    pub(crate) description: bool,
    pub(crate) tombstone: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceIdError {
    EmptySegment,
    MultipleHash,
    InvalidPath,
    MultipleVersions,
    InvalidMemento,
    ForbiddenName(String),
}

impl ResourceIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmptySegment => "path contains an empty element",
            Self::MultipleHash => "path may not contain more than one '#'",
            Self::InvalidPath => "path combines extensions that cannot be combined",
            Self::MultipleVersions => "path may not contain multiple fcr:versions parts",
            Self::InvalidMemento => "memento label must be 14 digits (yyyyMMddHHmmss)",
            Self::ForbiddenName(_) => "identifier uses a reserved name",
        }
    }
}

impl fmt::Display for ResourceIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForbiddenName(name) => write!(f, "{} ({name})", self.message()),
            other => f.write_str(other.message()),
        }
    }
}

impl std::error::Error for ResourceIdError {}

impl ResourceId {
    /// Parses `info:fedora/...`, `/a/b` or `a/b` forms; trailing slashes are ignored.
    pub fn parse(value: &str) -> Result<Self, ResourceIdError> {
        parse::parse(value)
    }

    pub fn root() -> Self {
        Self {
            full_id: ID_PREFIX.to_string(),
            base_id: ID_PREFIX.to_string(),
            hash_uri: None,
            kind: IdKind {
                root: true,
                ..IdKind::default()
            },
            memento_instant: None,
        }
    }

    pub(crate) fn from_parts(
        full_id: String,
        base_id: String,
        hash_uri: Option<String>,
        kind: IdKind,
        memento_instant: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            full_id,
            base_id,
            hash_uri,
            kind,
            memento_instant,
        }
    }

    pub fn full_id(&self) -> &str {
        &self.full_id
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    /// Full id without the `info:fedora` prefix, e.g. `/a/b/fcr:versions/20200101000000`.
    pub fn full_path(&self) -> &str {
        &self.full_id[ID_PREFIX.len()..]
    }

    pub fn is_repository_root(&self) -> bool {
        self.kind.root
    }

    pub fn is_memento(&self) -> bool {
        self.kind.memento
    }

    pub fn is_timemap(&self) -> bool {
        self.kind.timemap
    }

    pub fn is_acl(&self) -> bool {
        self.kind.acl
    }

    pub fn is_description(&self) -> bool {
        self.kind.description
    }

    pub fn is_tombstone(&self) -> bool {
        self.kind.tombstone
    }

    pub fn hash_uri(&self) -> Option<&str> {
        self.hash_uri.as_deref()
    }

    pub fn memento_instant(&self) -> Option<OffsetDateTime> {
        self.memento_instant
    }

    pub fn as_base(&self) -> Self {
        if self.base_id == self.full_id {
            return self.clone();
        }
        // The base id was produced by a successful parse, so it re-parses.
        parse::parse(&self.base_id).unwrap_or_else(|_| Self::root())
    }

    /// Joins `child` onto the base id, dropping any extensions of `self`.
    pub fn resolve(&self, child: &str) -> Result<Self, ResourceIdError> {
        let child = child.trim_matches('/');
        if child.trim().is_empty() {
            return Err(ResourceIdError::EmptySegment);
        }
        parse::parse(&format!("{}/{child}", self.base_id))
    }

    pub fn as_memento(&self, at: OffsetDateTime) -> Result<Self, ResourceIdError> {
        if self.is_memento() {
            return Ok(self.clone());
        }
        let label = instant::memento_label(at).ok_or(ResourceIdError::InvalidMemento)?;
        parse::parse(&format!("{}/{FCR_VERSIONS}/{label}", self.base_id))
    }

    /// Base id with its last path segment removed; `None` for the root.
    pub fn parent_path(&self) -> Option<Self> {
        if self.is_repository_root() {
            return None;
        }
        let cut = self.base_id.rfind('/')?;
        let parent = &self.base_id[..cut];
        if parent.len() <= ID_PREFIX.len() {
            return Some(Self::root());
        }
        parse::parse(parent).ok()
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.full_id == other.full_id
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_id.hash(state);
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_id)
    }
}

impl FromStr for ResourceId {
    type Err = ResourceIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ResourceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.full_id
    }
}

#[cfg(test)]
mod tests;
