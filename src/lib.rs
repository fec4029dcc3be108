//! Cached GitHub profile and repository data for embeddable content blocks.
//!
//! A [`Fetcher`] resolves a [`ResourceDescriptor`] through a [`CacheStore`]
//! and, on a miss, the GitHub REST API. Every outcome is a [`FetchResult`];
//! [`BlockRenderer`] turns those results into view models or notices.

pub mod block;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod github;

pub use block::{BlockAttributes, BlockRenderer, BlockType, BlockView, Notice, NoticeKind};
pub use cache::{CacheEntry, CacheKey, CacheStore, FileStore, MemoryStore};
pub use config::Config;
pub use descriptor::{DescriptorError, ResourceDescriptor, ResourceKind};
pub use error::{BlocksError, Result};
pub use fetch::{FailureKind, FetchResult, Fetcher};
pub use github::{GitHubClient, RawResponse, TransportError, Upstream};
