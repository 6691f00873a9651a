/// Request and response bodies of the inventory search API
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::models::{InventoryPage, PagingInfo};

/// Search body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest<'a> {
    pub fields: &'a [String],

    /// `field IN (...)` clauses joined with `AND`
    pub predicate: String,

    /// 1-based page number
    pub page: u32,

    pub page_size: usize,
}

/// Search response envelope
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub data: SearchData,
}

#[derive(Debug, Deserialize)]
pub struct SearchData {
    #[serde(default)]
    pub results: Vec<Value>,

    pub paging_info: PagingInfo,
}

impl From<SearchResponse> for InventoryPage {
    fn from(response: SearchResponse) -> Self {
        Self {
            rows: response.data.results,
            paging: response.data.paging_info,
        }
    }
}
