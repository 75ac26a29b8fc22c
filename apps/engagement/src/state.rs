use std::sync::Arc;

use crate::config::Config;
use crate::remote::SkillService;
use crate::social::coordinator::Coordinator;
use crate::social::feed::FeedAssembler;
use crate::social::repository::Repository;
use crate::storage::KeyValueStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// All mutations go through here.
    pub coordinator: Arc<Coordinator>,
    /// Read-only views.
    pub feed: Arc<FeedAssembler>,
    /// Read by the health endpoint.
    pub config: Config,
}

impl AppState {
    /// Wires one repository over `store` into both the coordinator and the feed.
    pub fn new(store: Arc<dyn KeyValueStore>, remote: Arc<dyn SkillService>, config: Config) -> Self {
        let repo = Arc::new(Repository::new(store));
        Self {
            coordinator: Arc::new(Coordinator::new(repo.clone(), remote)),
            feed: Arc::new(FeedAssembler::new(
                repo,
                config.feed_page_size,
                config.feed_max_page_size,
            )),
            config,
        }
    }
}
