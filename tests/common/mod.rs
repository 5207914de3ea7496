//! Common test utilities for bulk-clone integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bulk_clone::{
    Catalog, CatalogPage, Config, FetchError, Item, ItemProcessor, PageRequest, ProcessError,
    ProcessRequest,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Catalog serving a fixed list of items in pages, chained by numeric cursor
pub struct FakeCatalog {
    items: Vec<Item>,
    page_size: usize,
    reported_total: Option<u64>,
    fail_on_page: Option<usize>,
    pub requests: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(items: Vec<Item>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
            reported_total: None,
            fail_on_page: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Report `total` instead of the real item count
    pub fn reporting_total(mut self, total: u64) -> Self {
        self.reported_total = Some(total);
        self
    }

    /// Fail with a query error when page `index` (0-based) is requested
    pub fn failing_on_page(mut self, index: usize) -> Self {
        self.fail_on_page = Some(index);
        self
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn fetch_page(&self, request: &PageRequest) -> Result<CatalogPage, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let index = match &request.cursor {
            None => 0,
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|e| FetchError::Malformed(e.to_string()))?,
        };
        if self.fail_on_page == Some(index) {
            return Err(FetchError::Query("API rate limit exceeded".to_string()));
        }

        let start = (index * self.page_size).min(self.items.len());
        let end = (start + self.page_size).min(self.items.len());
        let has_more = end < self.items.len();

        Ok(CatalogPage {
            total: self
                .reported_total
                .unwrap_or(self.items.len() as u64),
            items: self.items[start..end].to_vec(),
            has_more,
            cursor: has_more.then(|| (index + 1).to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Processor that sleeps, then fails the configured items
pub struct ScriptedProcessor {
    failing: HashSet<String>,
    delay: Duration,
    pub finished: Arc<AtomicUsize>,
    pub seen: Mutex<Vec<ProcessRequest>>,
}

impl ScriptedProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            failing: HashSet::new(),
            delay,
            finished: Arc::new(AtomicUsize::new(0)),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, items: &[&str]) -> Self {
        self.failing = items.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn seen_items(&self) -> Vec<String> {
        self.seen
            .lock()
            .map(|seen| seen.iter().map(|r| r.item.to_string()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ItemProcessor for ScriptedProcessor {
    async fn process(
        &self,
        request: &ProcessRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(ProcessError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }
        self.finished.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(request.item.as_str()) {
            return Err(ProcessError::Failed(format!(
                "clone failed: {}: exit status: 128:\nfatal: repository not found",
                request.item
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// `count` items named `octo/repo-<n>`
pub fn items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|n| Item::new(format!("octo/repo-{:03}", n)))
        .collect()
}

/// Configuration tuned for fast tests, checkouts below `directory`
pub fn test_config(directory: &Path, workers: usize) -> Config {
    let mut config = Config {
        owner: "octo".to_string(),
        timeout: Duration::from_secs(30),
        grace_period: Duration::from_secs(2),
        ..Default::default()
    };
    config.clone.directory = directory.to_path_buf();
    config.clone.workers = workers;
    config.progress.tick_interval = Duration::from_millis(10);
    config.progress.settle_delay = Duration::from_millis(20);
    config
}
