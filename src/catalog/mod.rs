//! Remote repository catalog -- paginated listing of the items to process.
//!
//! - [`Catalog`] - the paginated query contract consumed by the item source
//! - [`github`] - GitHub GraphQL search implementation

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::Item;

pub mod github;

pub use github::GitHubCatalog;

/// What to list: the repositories of one owner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchScope {
    /// User or organization login
    pub owner: String,
    /// Whether archived repositories are listed too
    pub include_archived: bool,
}

impl SearchScope {
    /// Scope covering the non-archived repositories of `owner`
    pub fn owner(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            include_archived: false,
        }
    }

    /// Search filter string for this scope
    pub fn query(&self) -> String {
        if self.include_archived {
            format!("owner:{}", self.owner)
        } else {
            format!("owner:{} archived:false", self.owner)
        }
    }
}

/// One page request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// Search filter (see [`SearchScope::query`])
    pub query: String,
    /// Maximum number of items on the page
    pub page_size: u32,
    /// Continuation cursor from the previous page, `None` for the first page
    pub cursor: Option<String>,
}

/// One page of results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogPage {
    /// Exact number of items matching the query, across all pages
    pub total: u64,
    /// Items on this page, in catalog order
    pub items: Vec<Item>,
    /// Whether another page follows
    pub has_more: bool,
    /// Cursor to pass to fetch the next page
    pub cursor: Option<String>,
}

/// Paginated, resumable catalog query
///
/// The reported total is assumed stable across the pages of one query.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch one page
    async fn fetch_page(&self, request: &PageRequest) -> Result<CatalogPage, FetchError>;

    /// Short name of the implementation, for logs
    fn name(&self) -> &'static str;
}
