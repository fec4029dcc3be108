// GitHub API endpoint construction.
// Maps each resource kind onto its REST endpoint and checks access tokens.

use tracing::{info, warn};

use crate::descriptor::{ResourceDescriptor, ResourceKind};
use crate::error::{BlocksError, Result};

use super::client::{GitHubClient, Upstream};
use super::types::UserProfile;

/// Page size for a profile's "top repositories" list.
pub const TOP_REPOSITORIES_PER_PAGE: u32 = 5;

/// Path and query for a descriptor, relative to the API base.
///
/// Repository lists use the search API scoped to the owner and keep GitHub's
/// relevance ordering.
pub fn endpoint_path(descriptor: &ResourceDescriptor) -> String {
    let identifier = descriptor.identifier();
    match descriptor.kind() {
        ResourceKind::Profile => format!("/users/{}", identifier),
        ResourceKind::Repository => format!("/repos/{}", identifier),
        ResourceKind::ProfileRepositoryList => format!(
            "/search/repositories?q=user:{}&per_page={}",
            identifier, TOP_REPOSITORIES_PER_PAGE
        ),
    }
}

/// Absolute URL for a descriptor.
pub fn endpoint_url(api_base: &str, descriptor: &ResourceDescriptor) -> String {
    format!(
        "{}{}",
        api_base.trim_end_matches('/'),
        endpoint_path(descriptor)
    )
}

impl GitHubClient {
    /// Check the configured token by fetching the authenticated user.
    pub async fn verify_token(&self) -> Result<UserProfile> {
        if !self.is_authenticated() {
            return Err(BlocksError::Unauthorized);
        }

        let response = self.get(&format!("{}/user", self.api_base())).await?;
        match response.status {
            200..=299 => {
                let user: UserProfile = serde_json::from_slice(&response.body)?;
                info!(login = %user.login, "connected to the GitHub API");
                Ok(user)
            }
            401 => {
                warn!("GitHub rejected the access token");
                Err(BlocksError::Unauthorized)
            }
            status => Err(BlocksError::Upstream {
                status,
                message: response.error_message(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_endpoint_paths() {
        let profile = ResourceDescriptor::profile("octocat").unwrap();
        let repo = ResourceDescriptor::repository("octocat/Hello-World").unwrap();
        let repos = ResourceDescriptor::profile_repositories("octocat").unwrap();

        assert_eq!(endpoint_path(&profile), "/users/octocat");
        assert_eq!(endpoint_path(&repo), "/repos/octocat/Hello-World");
        assert_eq!(
            endpoint_path(&repos),
            "/search/repositories?q=user:octocat&per_page=5"
        );
    }

    #[test]
    fn test_endpoint_url_joins_base() {
        let profile = ResourceDescriptor::profile("octocat").unwrap();
        assert_eq!(
            endpoint_url("https://api.github.com/", &profile),
            "https://api.github.com/users/octocat"
        );
    }

    #[tokio::test]
    async fn test_search_query_reaches_server() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", "user:octocat"))
            .and(query_param("per_page", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"items":[]}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = Config {
            api_base_url: mock_server.uri(),
            ..Config::default()
        };
        let client = GitHubClient::new(&config).unwrap();
        let descriptor = ResourceDescriptor::profile_repositories("octocat").unwrap();
        let response = client
            .get(&endpoint_url(client.api_base(), &descriptor))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_verify_token_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "token ghp_good"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 1, "login": "octocat"})),
            )
            .mount(&mock_server)
            .await;

        let config = Config {
            access_token: Some("ghp_good".to_string()),
            api_base_url: mock_server.uri(),
            ..Config::default()
        };
        let client = GitHubClient::new(&config).unwrap();

        let user = client.verify_token().await.unwrap();
        assert_eq!(user.login, "octocat");
    }

    #[tokio::test]
    async fn test_verify_token_bad_credentials() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"message": "Bad credentials"})),
            )
            .mount(&mock_server)
            .await;

        let config = Config {
            access_token: Some("ghp_bad".to_string()),
            api_base_url: mock_server.uri(),
            ..Config::default()
        };
        let client = GitHubClient::new(&config).unwrap();

        assert!(matches!(
            client.verify_token().await,
            Err(BlocksError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_verify_token_without_token() {
        let client = GitHubClient::new(&Config::default()).unwrap();
        assert!(matches!(
            client.verify_token().await,
            Err(BlocksError::Unauthorized)
        ));
    }
}
