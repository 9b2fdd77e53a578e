use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, info};

use crate::error::AppError;
use crate::model::page::PageRequest;
use crate::model::project::ProjectStatus;
use crate::store::{ProjectStore, Store, StoreError};

/// Project id -> lifecycle status. Consulted before every attendance write
/// so archived projects stay frozen without a query per request.
#[derive(Clone)]
pub struct ProjectCache {
    statuses: Cache<u64, ProjectStatus>,
}

impl ProjectCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            statuses: Cache::builder()
                .max_capacity(50_000) // tune based on memory
                .time_to_live(Duration::from_secs(ttl_secs))
                .build(),
        }
    }

    /// Status of a project, `None` when it does not exist.
    pub async fn status(
        &self,
        store: &dyn Store,
        project_id: u64,
    ) -> Result<Option<ProjectStatus>, StoreError> {
        if let Some(status) = self.statuses.get(&project_id).await {
            return Ok(Some(status));
        }

        let status = store.get_project(project_id).await?.map(|p| p.status);
        if let Some(status) = status {
            self.statuses.insert(project_id, status).await;
        }
        Ok(status)
    }

    /// Errors unless the project exists and is not archived.
    pub async fn ensure_writable(&self, store: &dyn Store, project_id: u64) -> Result<(), AppError> {
        match self.status(store, project_id).await? {
            None => Err(AppError::BadRequest(format!(
                "project_id: project {project_id} does not exist"
            ))),
            Some(status) if status.is_archived() => Err(AppError::ProjectArchived(project_id)),
            Some(_) => Ok(()),
        }
    }

    pub async fn put(&self, project_id: u64, status: ProjectStatus) {
        self.statuses.insert(project_id, status).await;
    }

    /// Load every project status in batches. Entries already cached are kept.
    pub async fn warmup(&self, store: &dyn Store, batch_size: u64) -> Result<(), StoreError> {
        let mut page = PageRequest::new(Some(1), Some(batch_size));
        let mut total_count = 0usize;

        loop {
            let batch = store.list_projects(None, page).await?;
            if batch.items.is_empty() {
                break;
            }
            total_count += batch.items.len();
            for project in batch.items {
                // a status written by a request since the page was read wins
                self.statuses
                    .entry(project.id)
                    .or_insert(project.status)
                    .await;
            }
            debug!(page = page.page, "Project cache batch loaded");
            page.page += 1;
        }

        info!("Project cache warmup complete: {} projects", total_count);
        Ok(())
    }
}
