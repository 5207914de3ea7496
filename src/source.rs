//! Item source -- walks the catalog page by page and feeds the dispatch queue.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::catalog::{Catalog, PageRequest, SearchScope};
use crate::error::{Error, FetchError, Result};
use crate::lifetime::RunLifetime;
use crate::progress::ProgressHandle;
use crate::types::Item;

/// Counts reported by a finished source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Pages fetched
    pub pages: u64,
    /// Items handed to the dispatch queue
    pub items: u64,
}

/// Streams the items of one scope from a catalog into the dispatch queue
pub struct ItemSource<C: Catalog + ?Sized> {
    catalog: Arc<C>,
    scope: SearchScope,
    page_size: u32,
}

impl<C: Catalog + ?Sized> ItemSource<C> {
    /// Create a source over `scope`
    pub fn new(catalog: Arc<C>, scope: SearchScope, page_size: u32) -> Self {
        Self {
            catalog,
            scope,
            page_size,
        }
    }

    /// Fetch every page and send each item, in catalog order
    ///
    /// Blocks on a full queue until a worker takes the slot. The queue closes
    /// when this returns (the sender is consumed). A fetch failure is returned
    /// as [`Error::Fetch`]; cancellation, observed while fetching or sending,
    /// is returned as [`Error::Cancelled`] with the lifetime's cause.
    pub async fn run(
        self,
        tx: mpsc::Sender<Item>,
        progress: ProgressHandle,
        lifetime: RunLifetime,
    ) -> Result<SourceStats> {
        let query = self.scope.query();
        let mut stats = SourceStats::default();
        let mut cursor: Option<String> = None;

        loop {
            let request = PageRequest {
                query: query.clone(),
                page_size: self.page_size,
                cursor: cursor.take(),
            };

            let page = tokio::select! {
                biased;
                _ = lifetime.cancelled() => {
                    return Err(Error::Cancelled(lifetime.observed_cause()));
                }
                page = self.catalog.fetch_page(&request) => page?,
            };
            stats.pages += 1;

            tracing::debug!(
                catalog = self.catalog.name(),
                page = stats.pages,
                total = page.total,
                items = page.items.len(),
                has_more = page.has_more,
                "fetched catalog page"
            );

            progress.set_total(page.total);

            for item in page.items {
                tokio::select! {
                    biased;
                    _ = lifetime.cancelled() => {
                        return Err(Error::Cancelled(lifetime.observed_cause()));
                    }
                    sent = tx.send(item) => {
                        if sent.is_err() {
                            // Every worker is gone; they only exit early on cancellation.
                            return Err(Error::Cancelled(lifetime.observed_cause()));
                        }
                        stats.items += 1;
                    }
                }
            }

            if !page.has_more {
                break;
            }

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => {
                    return Err(FetchError::Malformed(
                        "page reports more results but carries no cursor".to_string(),
                    )
                    .into());
                }
            }
        }

        tracing::debug!(pages = stats.pages, items = stats.items, "catalog exhausted");
        Ok(stats)
    }
}
