// Resource descriptors.
// Identifies a GitHub resource to fetch and validates its identifier up front.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length GitHub allows for a user or organization login.
const MAX_LOGIN_LEN: usize = 39;

/// Maximum length GitHub allows for a repository name.
const MAX_REPO_NAME_LEN: usize = 100;

/// Prefixes stripped from repository references pasted as URLs.
const GITHUB_URL_PREFIXES: &[&str] = &[
    "https://github.com/",
    "http://github.com/",
    "https://www.github.com/",
    "github.com/",
];

/// The kind of resource a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A user or organization profile, identified by login.
    Profile,
    /// A single repository, identified by an `owner/repo` slug.
    Repository,
    /// The top repositories owned by a login.
    ProfileRepositoryList,
}

impl ResourceKind {
    /// Stable name used for cache namespacing and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Profile => "profile",
            ResourceKind::Repository => "repository",
            ResourceKind::ProfileRepositoryList => "profile_repositories",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("identifier for {0} must not be empty")]
    Empty(ResourceKind),

    #[error("'{0}' is not a valid GitHub username")]
    InvalidUsername(String),

    #[error("'{0}' is not a valid owner/repo reference")]
    InvalidRepository(String),
}

/// A validated request for one GitHub resource.
///
/// Construction goes through [`ResourceDescriptor::new`], so a descriptor
/// in hand always carries a non-empty identifier that is well formed for
/// its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    kind: ResourceKind,
    identifier: String,
}

impl ResourceDescriptor {
    /// Validate `identifier` for `kind` and build a descriptor.
    pub fn new(kind: ResourceKind, identifier: impl Into<String>) -> Result<Self, DescriptorError> {
        let identifier = identifier.into().trim().to_string();
        if identifier.is_empty() {
            return Err(DescriptorError::Empty(kind));
        }

        match kind {
            ResourceKind::Profile | ResourceKind::ProfileRepositoryList => {
                if !is_valid_login(&identifier) {
                    return Err(DescriptorError::InvalidUsername(identifier));
                }
            }
            ResourceKind::Repository => {
                if !is_valid_slug(&identifier) {
                    return Err(DescriptorError::InvalidRepository(identifier));
                }
            }
        }

        Ok(Self { kind, identifier })
    }

    /// Descriptor for a user profile.
    pub fn profile(login: impl Into<String>) -> Result<Self, DescriptorError> {
        Self::new(ResourceKind::Profile, login)
    }

    /// Descriptor for a profile's top repositories.
    pub fn profile_repositories(login: impl Into<String>) -> Result<Self, DescriptorError> {
        Self::new(ResourceKind::ProfileRepositoryList, login)
    }

    /// Descriptor for a repository.
    ///
    /// Accepts a bare `owner/repo` slug or a pasted `https://github.com/owner/repo`
    /// URL, with or without a trailing slash or `.git` suffix.
    pub fn repository(reference: &str) -> Result<Self, DescriptorError> {
        Self::new(ResourceKind::Repository, normalize_repo_reference(reference))
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.identifier)
    }
}

/// Strip URL decoration from a repository reference.
fn normalize_repo_reference(reference: &str) -> String {
    let mut slug = reference.trim();
    for prefix in GITHUB_URL_PREFIXES {
        if let Some(rest) = slug.strip_prefix(prefix) {
            slug = rest;
            break;
        }
    }
    let slug = slug.trim_end_matches('/');
    slug.strip_suffix(".git").unwrap_or(slug).to_string()
}

/// GitHub logins: ASCII alphanumerics and hyphens, no leading or trailing hyphen.
fn is_valid_login(login: &str) -> bool {
    login.len() <= MAX_LOGIN_LEN
        && !login.starts_with('-')
        && !login.ends_with('-')
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_repo_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_REPO_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn is_valid_slug(slug: &str) -> bool {
    match slug.split_once('/') {
        Some((owner, name)) => {
            !owner.is_empty() && is_valid_login(owner) && is_valid_repo_name(name)
        }
        None => false,
    }
}
