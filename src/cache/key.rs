// Cache key derivation.
// Maps a resource descriptor onto a kind-namespaced cache key.

use std::fmt;

use crate::descriptor::{ResourceDescriptor, ResourceKind};

/// Prefix shared by every key this crate writes.
const KEY_PREFIX: &str = "blocks_for_github";

/// Key under which a resource's payload is cached.
///
/// Keys are namespaced by kind, so a profile and a repository list for the
/// same login never collide. GitHub treats logins and repository names
/// case-insensitively, so the identifier is folded to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ResourceKind,
    identifier: String,
}

impl CacheKey {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Normalized identifier (lowercase login or `owner/repo` slug).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl From<&ResourceDescriptor> for CacheKey {
    fn from(descriptor: &ResourceDescriptor) -> Self {
        Self {
            kind: descriptor.kind(),
            identifier: descriptor.identifier().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", KEY_PREFIX, self.kind, self.identifier)
    }
}
