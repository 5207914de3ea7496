//! Tests against the real GitHub GraphQL API
//!
//! Require a token in `GH_TOKEN`/`GITHUB_TOKEN` or a logged-in `gh`.
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --features live-tests --test live_github
//! ```

#![cfg(feature = "live-tests")]

use bulk_clone::{Catalog, CatalogConfig, GitHubCatalog, PageRequest, SearchScope};

async fn live_catalog() -> GitHubCatalog {
    let gh = which::which("gh").ok();
    GitHubCatalog::from_config(&CatalogConfig::default(), gh.as_deref())
        .await
        .expect("no GitHub credentials available")
}

#[tokio::test]
async fn lists_public_repositories_of_an_organization() {
    let catalog = live_catalog().await;
    let scope = SearchScope::owner("rust-lang");

    let page = catalog
        .fetch_page(&PageRequest {
            query: scope.query(),
            page_size: 5,
            cursor: None,
        })
        .await
        .unwrap();

    assert!(page.total > 5, "rust-lang has more than five repositories");
    assert_eq!(page.items.len(), 5);
    assert!(page.has_more);
    assert!(page.cursor.is_some());
    for item in &page.items {
        let (owner, _) = item.owner_and_name().unwrap();
        assert!(owner.eq_ignore_ascii_case("rust-lang"), "unexpected item {}", item);
    }
}

#[tokio::test]
async fn cursor_advances_to_the_next_page() {
    let catalog = live_catalog().await;
    let query = SearchScope::owner("rust-lang").query();

    let first = catalog
        .fetch_page(&PageRequest {
            query: query.clone(),
            page_size: 3,
            cursor: None,
        })
        .await
        .unwrap();
    let second = catalog
        .fetch_page(&PageRequest {
            query,
            page_size: 3,
            cursor: first.cursor.clone(),
        })
        .await
        .unwrap();

    assert_eq!(first.total, second.total, "total is stable across pages");
    assert!(
        second.items.iter().all(|item| !first.items.contains(item)),
        "pages do not overlap"
    );
}
