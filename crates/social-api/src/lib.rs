//! Typed endpoints of the Threadline services.
//!
//! Every call is a single request through the shared [`ApiClient`], so the
//! bearer token and 401 recovery come from whatever interceptor the client
//! has attached.

mod ai;
mod comments;
mod communities;
mod models;
mod notifications;
mod posts;
mod users;
mod votes;

pub use models::*;
pub use posts::DEFAULT_PAGE_SIZE;

use api_transport::ApiClient;
use client_config::ServicePaths;
use std::sync::Arc;

/// Entry point for the domain endpoints.
#[derive(Clone)]
pub struct SocialApi {
    client: Arc<ApiClient>,
    paths: ServicePaths,
}

impl SocialApi {
    pub fn new(client: Arc<ApiClient>, paths: ServicePaths) -> Self {
        Self { client, paths }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    fn users_url(&self, suffix: &str) -> String {
        join(&self.paths.users, suffix)
    }

    fn posts_url(&self, suffix: &str) -> String {
        join(&self.paths.posts, suffix)
    }

    fn communities_url(&self, suffix: &str) -> String {
        join(&self.paths.communities, suffix)
    }

    fn notifications_url(&self, suffix: &str) -> String {
        join(&self.paths.notifications, suffix)
    }

    fn ai_url(&self, suffix: &str) -> String {
        join(&self.paths.ai, suffix)
    }
}

fn join(prefix: &str, suffix: &str) -> String {
    format!("{}{}", prefix.trim_end_matches('/'), suffix)
}
