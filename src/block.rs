// Block rendering pipeline.
// Maps block attributes to fetches and shapes results into a view model or a notice.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::descriptor::{DescriptorError, ResourceDescriptor};
use crate::error::Result as BlocksResult;
use crate::fetch::{FailureKind, FetchResult, Fetcher};
use crate::github::{Repository, SearchResults, UserProfile};

/// Which view a block displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    #[default]
    Profile,
    Repository,
}

/// Attributes saved with a block by the editor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockAttributes {
    pub block_type: BlockType,
    pub api_key: Option<String>,
    pub profile_name: String,
    /// `owner/repo`, or a pasted github.com URL.
    pub repo_url: String,
    pub media_url: Option<String>,
    pub show_bio: bool,
    pub show_location: bool,
    pub show_org: bool,
    pub show_website: bool,
    pub show_twitter: bool,
    pub show_tags: bool,
    pub show_forks: bool,
    pub show_subscribers: bool,
    pub show_open_issues: bool,
    pub show_last_update: bool,
}

impl BlockAttributes {
    /// Descriptors this block needs, in render order.
    pub fn descriptors(&self) -> Result<Vec<ResourceDescriptor>, DescriptorError> {
        match self.block_type {
            BlockType::Profile => Ok(vec![
                ResourceDescriptor::profile(self.profile_name.as_str())?,
                ResourceDescriptor::profile_repositories(self.profile_name.as_str())?,
            ]),
            BlockType::Repository => Ok(vec![ResourceDescriptor::repository(&self.repo_url)?]),
        }
    }

    /// Fill in the block's own token when the site config has none.
    pub fn apply_token(&self, mut config: Config) -> Config {
        if config.token().is_none() {
            config.access_token = self
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string);
        }
        config
    }
}

/// Compact repository entry in a profile's top list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositorySummary {
    pub name: String,
    pub html_url: Option<String>,
    pub description: Option<String>,
    pub archived: bool,
    pub forks: u64,
    pub stars: u64,
}

impl From<Repository> for RepositorySummary {
    fn from(repo: Repository) -> Self {
        Self {
            name: repo.name,
            html_url: repo.html_url,
            description: repo.description,
            archived: repo.archived,
            forks: repo.forks,
            stars: repo.stargazers_count,
        }
    }
}

/// Data for the profile template. Optional meta fields are only set when enabled and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
    pub followers: u64,
    pub header_image: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub top_repositories: Vec<RepositorySummary>,
}

/// Data for the repository template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryView {
    pub name: String,
    pub full_name: String,
    pub html_url: Option<String>,
    pub byline: String,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
    pub stars: u64,
    pub forks: Option<u64>,
    pub subscribers: Option<u64>,
    pub open_issues: Option<u64>,
    /// Last update as `MM-DD-YYYY`.
    pub last_update: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    InvalidSettings,
    BadCredentials,
    NotFound,
    Rejected,
    Unavailable,
    Connection,
    UnexpectedResponse,
}

/// Non-fatal message shown in place of block content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, title: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.to_string(),
            message: message.into(),
        }
    }

    /// Notice for a failed fetch, carrying GitHub's message where it has one.
    pub fn from_failure(kind: FailureKind, message: &str) -> Self {
        match kind {
            FailureKind::Client(401) => Self::new(
                NoticeKind::BadCredentials,
                "Bad Credentials",
                "Hmm, GitHub returned a bad credential error for the profile entered. \
                 Please make sure you entered the correct access token.",
            ),
            FailureKind::Client(404) => Self::new(
                NoticeKind::NotFound,
                "Not Found",
                format!("GitHub could not find what this block points at: {message}"),
            ),
            FailureKind::Client(_) => {
                Self::new(NoticeKind::Rejected, "Request Rejected", message)
            }
            FailureKind::Server(_) => Self::new(
                NoticeKind::Unavailable,
                "GitHub Unavailable",
                format!("GitHub is having trouble right now: {message}"),
            ),
            FailureKind::Transport => Self::new(
                NoticeKind::Connection,
                "Connection Problem",
                format!("Could not reach GitHub: {message}"),
            ),
            FailureKind::Decode => Self::new(
                NoticeKind::UnexpectedResponse,
                "Unexpected Response",
                message,
            ),
        }
    }

    pub fn invalid_settings(err: &dyn fmt::Display) -> Self {
        Self::new(
            NoticeKind::InvalidSettings,
            "Check Block Settings",
            err.to_string(),
        )
    }
}

/// Everything a template needs to draw a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum BlockView {
    Profile(ProfileView),
    Repository(RepositoryView),
    Notice(Notice),
}

/// Render entry point: attributes in, view model out, never an error.
pub struct BlockRenderer {
    fetcher: Fetcher,
}

impl BlockRenderer {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub async fn render(&self, attrs: &BlockAttributes) -> BlockView {
        let descriptors = match attrs.descriptors() {
            Ok(descriptors) => descriptors,
            Err(e) => return BlockView::Notice(Notice::invalid_settings(&e)),
        };

        let scoped = match self.block_fetcher(attrs) {
            Ok(scoped) => scoped,
            Err(e) => return BlockView::Notice(Notice::invalid_settings(&e)),
        };
        let fetcher = scoped.as_ref().unwrap_or(&self.fetcher);

        match (attrs.block_type, descriptors.as_slice()) {
            (BlockType::Profile, [profile, repositories]) => {
                self.render_profile(fetcher, attrs, profile, repositories).await
            }
            (BlockType::Repository, [repository]) => {
                self.render_repository(fetcher, attrs, repository).await
            }
            (block_type, other) => {
                warn!(?block_type, count = other.len(), "unexpected resources for block");
                BlockView::Notice(Notice::invalid_settings(&"unsupported block settings"))
            }
        }
    }

    /// Fetcher carrying the block's own token, needed only when the site config has none.
    fn block_fetcher(&self, attrs: &BlockAttributes) -> BlocksResult<Option<Fetcher>> {
        let site = self.fetcher.config();
        let config = attrs.apply_token(site.clone());
        if config.token() == site.token() {
            return Ok(None);
        }
        debug!("using the block's own access token");
        Fetcher::with_github(config, self.fetcher.store()).map(Some)
    }

    async fn render_profile(
        &self,
        fetcher: &Fetcher,
        attrs: &BlockAttributes,
        profile: &ResourceDescriptor,
        repositories: &ResourceDescriptor,
    ) -> BlockView {
        let (profile_result, repos_result) =
            tokio::join!(fetcher.fetch(profile), fetcher.fetch(repositories));

        let user: UserProfile = match decode(profile_result) {
            Ok(user) => user,
            Err(notice) => return BlockView::Notice(notice),
        };

        // A missing repository list should not hide the profile.
        let top_repositories = match decode::<SearchResults>(repos_result) {
            Ok(results) => results.items.into_iter().map(RepositorySummary::from).collect(),
            Err(notice) => {
                warn!(
                    login = %user.login,
                    title = %notice.title,
                    "rendering profile without repositories"
                );
                Vec::new()
            }
        };

        BlockView::Profile(ProfileView {
            id: user.id,
            login: user.login,
            name: user.name,
            avatar_url: user.avatar_url,
            html_url: user.html_url,
            followers: user.followers,
            header_image: non_empty(attrs.media_url.clone()),
            bio: shown(attrs.show_bio, user.bio),
            location: shown(attrs.show_location, user.location),
            company: shown(attrs.show_org, user.company),
            website: shown(attrs.show_website, user.blog),
            twitter: shown(attrs.show_twitter, user.twitter_username),
            top_repositories,
        })
    }

    async fn render_repository(
        &self,
        fetcher: &Fetcher,
        attrs: &BlockAttributes,
        descriptor: &ResourceDescriptor,
    ) -> BlockView {
        let repo: Repository = match decode(fetcher.fetch(descriptor).await) {
            Ok(repo) => repo,
            Err(notice) => return BlockView::Notice(notice),
        };

        BlockView::Repository(RepositoryView {
            byline: repo.byline().to_string(),
            avatar_url: repo.owner.avatar_url.clone(),
            stars: repo.stargazers_count,
            forks: attrs.show_forks.then_some(repo.forks),
            subscribers: if attrs.show_subscribers {
                repo.subscribers_count
            } else {
                None
            },
            open_issues: attrs.show_open_issues.then_some(repo.open_issues),
            last_update: if attrs.show_last_update {
                repo.updated_at.map(|at| at.format("%m-%d-%Y").to_string())
            } else {
                None
            },
            tags: if attrs.show_tags { repo.topics } else { Vec::new() },
            name: repo.name,
            full_name: repo.full_name,
            html_url: repo.html_url,
            description: repo.description,
        })
    }
}

/// Turn a fetch result into a typed payload, or the notice to show instead.
fn decode<T: serde::de::DeserializeOwned>(result: FetchResult) -> Result<T, Notice> {
    match result {
        FetchResult::Success(payload) => serde_json::from_value(payload).map_err(|e| {
            Notice::from_failure(
                FailureKind::Decode,
                &format!("GitHub response was missing expected fields: {e}"),
            )
        }),
        FetchResult::Failure { kind, message } => Err(Notice::from_failure(kind, &message)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn shown(enabled: bool, value: Option<String>) -> Option<String> {
    if enabled { non_empty(value) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::github::{RawResponse, TransportError, Upstream};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Upstream answering by exact URL; unknown URLs fail at the transport level.
    struct RoutedUpstream {
        routes: HashMap<String, RawResponse>,
    }

    #[async_trait]
    impl Upstream for RoutedUpstream {
        async fn get(&self, url: &str) -> std::result::Result<RawResponse, TransportError> {
            self.routes
                .get(url)
                .cloned()
                .ok_or_else(|| TransportError::new("connection refused"))
        }
    }

    fn renderer(routes: &[(&str, u16, serde_json::Value)]) -> BlockRenderer {
        let routes = routes
            .iter()
            .map(|(path, status, body)| {
                (
                    format!("https://api.github.com{path}"),
                    RawResponse::new(*status, body.to_string()),
                )
            })
            .collect();
        let fetcher = Fetcher::new(
            Config::default(),
            Arc::new(RoutedUpstream { routes }),
            Arc::new(MemoryStore::new()),
        );
        BlockRenderer::new(fetcher)
    }

    fn profile_attrs() -> BlockAttributes {
        serde_json::from_value(json!({
            "blockType": "profile",
            "profileName": "octocat",
            "showBio": true,
            "showLocation": true,
            "showTwitter": false,
            "mediaUrl": ""
        }))
        .unwrap()
    }

    fn octocat() -> serde_json::Value {
        json!({
            "id": 1,
            "login": "octocat",
            "name": "The Octocat",
            "bio": "  ",
            "location": "San Francisco",
            "twitter_username": "octocat",
            "followers": 5000
        })
    }

    const SEARCH_PATH: &str = "/search/repositories?q=user:octocat&per_page=5";

    #[test]
    fn test_attributes_deserialize_with_defaults() {
        let attrs: BlockAttributes = serde_json::from_value(json!({
            "blockType": "repository",
            "repoUrl": "https://github.com/impress-org/givewp"
        }))
        .unwrap();

        assert_eq!(attrs.block_type, BlockType::Repository);
        assert!(!attrs.show_forks);
        let descriptors = attrs.descriptors().unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].identifier(), "impress-org/givewp");
    }

    #[test]
    fn test_profile_block_needs_two_descriptors() {
        let descriptors = profile_attrs().descriptors().unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_ne!(descriptors[0].kind(), descriptors[1].kind());
    }

    #[test]
    fn test_apply_token_prefers_site_token() {
        let attrs = BlockAttributes {
            api_key: Some("ghp_block".to_string()),
            ..BlockAttributes::default()
        };

        let site = Config {
            access_token: Some("ghp_site".to_string()),
            ..Config::default()
        };
        assert_eq!(attrs.apply_token(site).token(), Some("ghp_site"));
        assert_eq!(attrs.apply_token(Config::default()).token(), Some("ghp_block"));
    }

    #[test]
    fn test_bad_credentials_notice() {
        let notice = Notice::from_failure(FailureKind::Client(401), "Bad credentials");
        assert_eq!(notice.kind, NoticeKind::BadCredentials);
        assert_eq!(notice.title, "Bad Credentials");
    }

    #[test]
    fn test_notice_keeps_upstream_message() {
        let notice = Notice::from_failure(FailureKind::Client(403), "API rate limit exceeded");
        assert_eq!(notice.kind, NoticeKind::Rejected);
        assert_eq!(notice.message, "API rate limit exceeded");
    }

    #[tokio::test]
    async fn test_render_profile() {
        let renderer = renderer(&[
            ("/users/octocat", 200, octocat()),
            (
                SEARCH_PATH,
                200,
                json!({"total_count": 1, "items": [{
                    "id": 1296269,
                    "name": "Hello-World",
                    "full_name": "octocat/Hello-World",
                    "owner": {"id": 1, "login": "octocat"},
                    "stargazers_count": 80,
                    "forks": 9,
                    "archived": true
                }]}),
            ),
        ]);

        let BlockView::Profile(view) = renderer.render(&profile_attrs()).await else {
            panic!("expected a profile view");
        };

        assert_eq!(view.login, "octocat");
        assert_eq!(view.followers, 5000);
        assert_eq!(view.location.as_deref(), Some("San Francisco"));
        assert!(view.bio.is_none());
        assert!(view.twitter.is_none());
        assert!(view.header_image.is_none());
        assert_eq!(
            view.top_repositories,
            vec![RepositorySummary {
                name: "Hello-World".to_string(),
                html_url: None,
                description: None,
                archived: true,
                forks: 9,
                stars: 80,
            }]
        );
    }

    #[tokio::test]
    async fn test_profile_survives_failed_repository_list() {
        let renderer = renderer(&[
            ("/users/octocat", 200, octocat()),
            (SEARCH_PATH, 422, json!({"message": "Validation Failed"})),
        ]);

        let BlockView::Profile(view) = renderer.render(&profile_attrs()).await else {
            panic!("expected a profile view");
        };
        assert!(view.top_repositories.is_empty());
    }

    #[tokio::test]
    async fn test_profile_failure_renders_notice() {
        let renderer = renderer(&[(
            "/users/octocat",
            401,
            json!({"message": "Bad credentials"}),
        )]);

        assert_eq!(
            renderer.render(&profile_attrs()).await,
            BlockView::Notice(Notice::from_failure(
                FailureKind::Client(401),
                "Bad credentials"
            ))
        );
    }

    #[tokio::test]
    async fn test_render_repository() {
        let renderer = renderer(&[(
            "/repos/impress-org/givewp",
            200,
            json!({
                "id": 2,
                "name": "givewp",
                "full_name": "impress-org/givewp",
                "owner": {
                    "id": 3,
                    "login": "impress-org",
                    "avatar_url": "https://example.com/a.png"
                },
                "organization": {"id": 3, "login": "impress-org"},
                "stargazers_count": 300,
                "forks": 190,
                "open_issues": 400,
                "subscribers_count": 40,
                "topics": ["wordpress", "donations"],
                "updated_at": "2024-03-05T10:00:00Z"
            }),
        )]);
        let attrs: BlockAttributes = serde_json::from_value(json!({
            "blockType": "repository",
            "repoUrl": "impress-org/givewp",
            "showForks": true,
            "showLastUpdate": true,
            "showTags": true
        }))
        .unwrap();

        let BlockView::Repository(view) = renderer.render(&attrs).await else {
            panic!("expected a repository view");
        };

        assert_eq!(view.byline, "impress-org");
        assert_eq!(view.stars, 300);
        assert_eq!(view.forks, Some(190));
        assert_eq!(view.subscribers, None);
        assert_eq!(view.open_issues, None);
        assert_eq!(view.last_update.as_deref(), Some("03-05-2024"));
        assert_eq!(view.tags, vec!["wordpress", "donations"]);
    }

    #[tokio::test]
    async fn test_repository_missing_fields_is_decode_notice() {
        let renderer = renderer(&[("/repos/octocat/broken", 200, json!({"id": 5}))]);
        let attrs = BlockAttributes {
            block_type: BlockType::Repository,
            repo_url: "octocat/broken".to_string(),
            ..BlockAttributes::default()
        };

        let BlockView::Notice(notice) = renderer.render(&attrs).await else {
            panic!("expected a notice");
        };
        assert_eq!(notice.kind, NoticeKind::UnexpectedResponse);
    }

    #[tokio::test]
    async fn test_invalid_settings_notice_without_fetching() {
        let renderer = renderer(&[]);
        let attrs = BlockAttributes {
            block_type: BlockType::Repository,
            repo_url: "not a repo".to_string(),
            ..BlockAttributes::default()
        };

        let BlockView::Notice(notice) = renderer.render(&attrs).await else {
            panic!("expected a notice");
        };
        assert_eq!(notice.kind, NoticeKind::InvalidSettings);
    }

    #[tokio::test]
    async fn test_unreachable_github_renders_connection_notice() {
        let renderer = renderer(&[]);
        let attrs = BlockAttributes {
            block_type: BlockType::Repository,
            repo_url: "octocat/Hello-World".to_string(),
            ..BlockAttributes::default()
        };

        let BlockView::Notice(notice) = renderer.render(&attrs).await else {
            panic!("expected a notice");
        };
        assert_eq!(notice.kind, NoticeKind::Connection);
    }

    async fn mount_hello_world(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path("/repos/octocat/Hello-World"))
            .and(header("authorization", format!("token {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1296269,
                "name": "Hello-World",
                "full_name": "octocat/Hello-World",
                "owner": {"id": 1, "login": "octocat"}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    fn hello_world_attrs(api_key: &str) -> BlockAttributes {
        BlockAttributes {
            block_type: BlockType::Repository,
            api_key: Some(api_key.to_string()),
            repo_url: "octocat/Hello-World".to_string(),
            ..BlockAttributes::default()
        }
    }

    fn github_renderer(server: &MockServer, site_token: Option<&str>) -> BlockRenderer {
        let config = Config {
            access_token: site_token.map(str::to_string),
            api_base_url: server.uri(),
            ..Config::default()
        };
        BlockRenderer::new(Fetcher::with_github(config, Arc::new(MemoryStore::new())).unwrap())
    }

    #[tokio::test]
    async fn test_block_token_sent_without_site_token() {
        let mock_server = MockServer::start().await;
        mount_hello_world(&mock_server, "ghp_block").await;

        let renderer = github_renderer(&mock_server, None);

        match renderer.render(&hello_world_attrs("ghp_block")).await {
            BlockView::Repository(view) => assert_eq!(view.full_name, "octocat/Hello-World"),
            other => panic!("expected a repository view, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_site_token_wins_over_block_token() {
        let mock_server = MockServer::start().await;
        mount_hello_world(&mock_server, "ghp_site").await;

        let renderer = github_renderer(&mock_server, Some("ghp_site"));
        let view = renderer.render(&hello_world_attrs("ghp_block")).await;

        assert!(matches!(view, BlockView::Repository(_)), "got {view:?}");
    }

    #[tokio::test]
    async fn test_unusable_block_token_is_settings_notice() {
        let renderer = renderer(&[]);

        let BlockView::Notice(notice) = renderer.render(&hello_world_attrs("ghp_\u{1}bad")).await
        else {
            panic!("expected a notice");
        };
        assert_eq!(notice.kind, NoticeKind::InvalidSettings);
    }

    #[test]
    fn test_view_serializes_with_tag() {
        let view = BlockView::Notice(Notice::from_failure(FailureKind::Transport, "timed out"));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["view"], "notice");
        assert_eq!(value["kind"], "connection");
    }
}
