use async_trait::async_trait;

use crate::domain::errors::RemoteError;
use crate::domain::models::{InventoryPage, InventoryQuery};

/// Port for the paginated inventory search API.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Fetch one page (1-based) of results.
    async fn fetch_page(
        &self,
        query: &InventoryQuery,
        page: u32,
        page_size: usize,
    ) -> Result<InventoryPage, RemoteError>;
}
