// GitHub API response types.
// Typed views over cached payloads, used when shaping block view models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner type discriminator (user or organization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OwnerType {
    #[default]
    User,
    Organization,
    Bot,
    #[serde(other)]
    Unknown,
}

/// GitHub user or organization, as embedded in repository payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: u64,
    pub login: String,
    #[serde(rename = "type", default)]
    pub owner_type: OwnerType,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

/// Full user profile from `GET /users/{username}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub login: String,
    #[serde(rename = "type", default)]
    pub owner_type: OwnerType,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Website, which GitHub calls `blog`.
    pub blog: Option<String>,
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub public_repos: u64,
}

/// GitHub repository from `GET /repos/{owner}/{repo}` or a search result item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    /// Present only when the repository belongs to an organization.
    pub organization: Option<Owner>,
    pub html_url: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks: u64,
    #[serde(default)]
    pub open_issues: u64,
    /// Only returned by the single-repository endpoint.
    pub subscribers_count: Option<u64>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// Login to credit in a byline: the organization if any, else the owner.
    pub fn byline(&self) -> &str {
        self.organization
            .as_ref()
            .map(|org| org.login.as_str())
            .unwrap_or(self.owner.login.as_str())
    }
}

/// Response from `GET /search/repositories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<Repository>,
}

/// Error body GitHub attaches to 4xx/5xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: Option<String>,
    pub documentation_url: Option<String>,
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

impl RateLimit {
    /// Reset time rendered for log lines.
    pub fn reset_at(&self) -> String {
        DateTime::from_timestamp(self.reset as i64, 0)
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
