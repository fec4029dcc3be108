// GitHub API module.
// Provides the HTTP client, endpoint mapping and response types for the GitHub REST API.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{GitHubClient, RawResponse, TransportError, Upstream};
pub use endpoints::{TOP_REPOSITORIES_PER_PAGE, endpoint_path, endpoint_url};
pub use types::*;
