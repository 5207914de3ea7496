//! GitHub GraphQL repository search.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

use crate::config::CatalogConfig;
use crate::error::FetchError;
use crate::types::Item;

use super::{Catalog, CatalogPage, PageRequest};

const SEARCH_QUERY: &str = r#"query GetRepositories($query: String!, $first: Int!, $after: String) {
  search(type: REPOSITORY, query: $query, first: $first, after: $after) {
    repositoryCount
    pageInfo {
      hasNextPage
      endCursor
    }
    nodes {
      ... on Repository {
        nameWithOwner
      }
    }
  }
}"#;

const USER_AGENT: &str = concat!("bulk-clone/", env!("CARGO_PKG_VERSION"));

/// Environment variables consulted for a token, in order
const TOKEN_ENV_VARS: [&str; 2] = ["GH_TOKEN", "GITHUB_TOKEN"];

/// Repository catalog backed by the GitHub GraphQL search API
pub struct GitHubCatalog {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GitHubCatalog {
    /// Create a catalog for `endpoint` authenticating with `token`
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    /// Create a catalog from configuration, resolving the token
    ///
    /// `gh` is used as a last resort to obtain a token (`gh auth token`).
    pub async fn from_config(config: &CatalogConfig, gh: Option<&Path>) -> Result<Self, FetchError> {
        let token = resolve_token(config.token.as_deref(), gh).await?;
        Ok(Self::new(config.api_url.clone(), token))
    }
}

#[async_trait]
impl Catalog for GitHubCatalog {
    async fn fetch_page(&self, request: &PageRequest) -> Result<CatalogPage, FetchError> {
        let body = serde_json::json!({
            "query": SEARCH_QUERY,
            "variables": {
                "query": request.query,
                "first": request.page_size,
                "after": request.cursor,
            },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let response: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        response.into_page()
    }

    fn name(&self) -> &'static str {
        "github-graphql"
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<SearchData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    search: Search,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Search {
    repository_count: u64,
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<SearchNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNode {
    name_with_owner: Option<String>,
}

impl GraphQlResponse {
    fn into_page(self) -> Result<CatalogPage, FetchError> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::Query(messages.join("; ")));
        }

        let search = self
            .data
            .ok_or_else(|| FetchError::Malformed("response carries no data".to_string()))?
            .search;

        let items = search
            .nodes
            .into_iter()
            .flatten()
            .filter_map(|node| node.name_with_owner)
            .map(Item::from)
            .collect();

        Ok(CatalogPage {
            total: search.repository_count,
            items,
            has_more: search.page_info.has_next_page,
            cursor: search.page_info.end_cursor,
        })
    }
}

/// Find an API token: explicit value, then environment, then `gh auth token`
pub(crate) async fn resolve_token(
    configured: Option<&str>,
    gh: Option<&Path>,
) -> Result<String, FetchError> {
    if let Some(token) = configured.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    if let Some(token) = token_from_env() {
        return Ok(token);
    }

    let Some(gh) = gh else {
        return Err(FetchError::Auth(format!(
            "set {} or install gh and run `gh auth login`",
            TOKEN_ENV_VARS.join(" or ")
        )));
    };

    token_from_gh(gh).await
}

fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS.iter().find_map(|var| {
        std::env::var(var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

async fn token_from_gh(gh: &Path) -> Result<String, FetchError> {
    let output = Command::new(gh)
        .args(["auth", "token"])
        .output()
        .await
        .map_err(|e| FetchError::Auth(format!("failed to execute {}: {}", gh.display(), e)))?;

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || token.is_empty() {
        return Err(FetchError::Auth(format!(
            "`gh auth token` failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    tracing::debug!("using token from gh auth");
    Ok(token)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_body(total: u64, names: &[&str], has_next: bool, cursor: Option<&str>) -> serde_json::Value {
        let nodes: Vec<_> = names
            .iter()
            .map(|name| json!({ "nameWithOwner": name }))
            .collect();
        json!({
            "data": {
                "search": {
                    "repositoryCount": total,
                    "pageInfo": { "hasNextPage": has_next, "endCursor": cursor },
                    "nodes": nodes,
                }
            }
        })
    }

    fn first_page_request() -> PageRequest {
        PageRequest {
            query: "owner:octo archived:false".to_string(),
            page_size: 2,
            cursor: None,
        }
    }

    #[tokio::test]
    async fn fetch_page_sends_query_and_parses_results() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "Bearer t0k"))
            .and(body_partial_json(json!({
                "variables": { "query": "owner:octo archived:false", "first": 2 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(
                3,
                &["octo/a", "octo/b"],
                true,
                Some("c1"),
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let catalog = GitHubCatalog::new(format!("{}/graphql", mock_server.uri()), "t0k");
        let page = catalog.fetch_page(&first_page_request()).await.unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items, vec![Item::new("octo/a"), Item::new("octo/b")]);
        assert!(page.has_more);
        assert_eq!(page.cursor.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn fetch_page_passes_cursor() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "after": "c1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body(
                3,
                &["octo/c"],
                false,
                None,
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let catalog = GitHubCatalog::new(mock_server.uri(), "t0k");
        let request = PageRequest {
            cursor: Some("c1".to_string()),
            ..first_page_request()
        };
        let page = catalog.fetch_page(&request).await.unwrap();

        assert_eq!(page.items, vec![Item::new("octo/c")]);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn non_repository_nodes_are_skipped() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "search": {
                        "repositoryCount": 1,
                        "pageInfo": { "hasNextPage": false, "endCursor": null },
                        "nodes": [ {}, null, { "nameWithOwner": "octo/a" } ],
                    }
                }
            })))
            .mount(&mock_server)
            .await;

        let catalog = GitHubCatalog::new(mock_server.uri(), "t0k");
        let page = catalog.fetch_page(&first_page_request()).await.unwrap();
        assert_eq!(page.items, vec![Item::new("octo/a")]);
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&mock_server)
            .await;

        let catalog = GitHubCatalog::new(mock_server.uri(), "bad");
        match catalog.fetch_page(&first_page_request()).await {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Bad credentials");
            }
            other => panic!("expected Status error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn graphql_errors_are_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [ { "message": "rate limited" }, { "message": "try later" } ],
            })))
            .mount(&mock_server)
            .await;

        let catalog = GitHubCatalog::new(mock_server.uri(), "t0k");
        match catalog.fetch_page(&first_page_request()).await {
            Err(FetchError::Query(message)) => assert_eq!(message, "rate limited; try later"),
            other => panic!("expected Query error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let catalog = GitHubCatalog::new(mock_server.uri(), "t0k");
        assert!(matches!(
            catalog.fetch_page(&first_page_request()).await,
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn configured_token_wins_over_environment() {
        // SAFETY: serialized with the other environment-mutating tests
        unsafe { std::env::set_var("GH_TOKEN", "from-env") };
        let token = resolve_token(Some(" explicit "), None).await.unwrap();
        unsafe { std::env::remove_var("GH_TOKEN") };

        assert_eq!(token, "explicit");
    }

    #[tokio::test]
    #[serial]
    async fn environment_token_is_used_when_not_configured() {
        // SAFETY: serialized with the other environment-mutating tests
        unsafe {
            std::env::remove_var("GH_TOKEN");
            std::env::set_var("GITHUB_TOKEN", "from-github-token");
        }
        let token = resolve_token(None, None).await.unwrap();
        unsafe { std::env::remove_var("GITHUB_TOKEN") };

        assert_eq!(token, "from-github-token");
    }

    #[tokio::test]
    #[serial]
    async fn missing_token_without_gh_is_auth_error() {
        // SAFETY: serialized with the other environment-mutating tests
        unsafe {
            std::env::remove_var("GH_TOKEN");
            std::env::remove_var("GITHUB_TOKEN");
        }
        assert!(matches!(
            resolve_token(None, None).await,
            Err(FetchError::Auth(_))
        ));
    }
}
