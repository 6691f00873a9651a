//! Plain inventory queries: batches of entities, each paged to completion.

use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AggregatedResults, Batch, Config, Entity, InventoryQuery, InventoryRow,
};
use crate::domain::ports::InventoryApi;
use crate::services::batch_dispatcher::BatchDispatcher;

/// Walks every page of one inventory query.
pub struct InventoryPager {
    api: Arc<dyn InventoryApi>,
    page_size: usize,
    max_pages: u32,
}

impl InventoryPager {
    pub fn new(api: Arc<dyn InventoryApi>, page_size: usize, max_pages: u32) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch page 1, then keep going while the API reports more pages.
    ///
    /// Needing more than `max_pages` pages is
    /// [`DomainError::PaginationRunaway`]; rows are never silently truncated.
    pub async fn fetch_all(&self, query: &InventoryQuery) -> DomainResult<Vec<Value>> {
        let first = self.api.fetch_page(query, 1, self.page_size).await?;
        let mut paging = first.paging;
        let mut rows = first.rows;
        let mut fetched = 1u32;

        while paging.current_page < paging.last_page {
            if fetched >= self.max_pages {
                warn!(
                    fetched,
                    last_page = paging.last_page,
                    "Inventory pagination did not finish"
                );
                return Err(DomainError::PaginationRunaway { pages: fetched });
            }
            let next = paging.current_page + 1;
            let page = self.api.fetch_page(query, next, self.page_size).await?;
            debug!(page = next, rows = page.rows.len(), last_page = page.paging.last_page, "Fetched page");
            paging = page.paging;
            rows.extend(page.rows);
            fetched += 1;
        }
        Ok(rows)
    }
}

/// Keys inventory rows by entity, one batch of entities per worker.
pub struct InventoryService {
    pager: Arc<InventoryPager>,
    dispatcher: BatchDispatcher,
    batch_size: usize,
}

impl InventoryService {
    pub fn new(pager: InventoryPager, dispatcher: BatchDispatcher, batch_size: usize) -> Self {
        Self {
            pager: Arc::new(pager),
            dispatcher,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(api: Arc<dyn InventoryApi>, config: &Config) -> Self {
        let pager = InventoryPager::new(api, config.inventory.page_size, config.inventory.max_pages);
        Self::new(
            pager,
            BatchDispatcher::from_config(&config.dispatch),
            config.dispatch.batch_size,
        )
    }

    /// Run `template` for `entities`.
    ///
    /// With no entities the template's own filters are run once, unbatched.
    #[instrument(skip(self, entities, template), fields(object_type = %template.object_type, entities = entities.len()))]
    pub async fn query(
        &self,
        entities: &[Entity],
        template: &InventoryQuery,
    ) -> DomainResult<AggregatedResults<InventoryRow>> {
        if entities.is_empty() {
            let rows = self.pager.fetch_all(template).await?;
            return Ok(AggregatedResults::new(
                key_rows(rows, &template.key_field),
                Vec::new(),
            ));
        }

        let batches = BatchDispatcher::partition(entities, self.batch_size);
        let pager = Arc::clone(&self.pager);
        let template = template.clone();

        self.dispatcher
            .dispatch(batches, move |batch: Batch| {
                let pager = Arc::clone(&pager);
                let query = template.for_entities(&batch.members);
                async move {
                    let rows = pager.fetch_all(&query).await?;
                    Ok::<_, DomainError>(key_rows(rows, &query.key_field))
                }
                .boxed()
            })
            .await
    }
}

/// Index rows by their key field; rows without one are dropped.
fn key_rows(rows: Vec<Value>, key_field: &str) -> BTreeMap<Entity, InventoryRow> {
    let mut keyed = BTreeMap::new();
    for row in rows {
        let Value::Object(map) = row else {
            warn!("Skipping inventory row that is not an object");
            continue;
        };
        match map.get(key_field).and_then(Value::as_str) {
            Some(key) => {
                keyed.entry(Entity::from(key)).or_insert(map);
            }
            None => warn!(key_field, "Skipping inventory row without key field"),
        }
    }
    keyed
}
