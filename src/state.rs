use std::sync::Arc;

use crate::store::Store;
use crate::utils::project_cache::ProjectCache;

/// Shared by every worker; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub projects: ProjectCache,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, project_cache_ttl_secs: u64) -> Self {
        Self {
            store,
            projects: ProjectCache::new(project_cache_ttl_secs),
        }
    }
}
