//! HTTP client for the OSF v2 JSON API.

use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::Environment;
use crate::error::ExportError;
use crate::models::{
    Component, Contributor, ContributorResource, Document, FileResource, NodeResource, Page,
    ProjectMetadata, WikiResource,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared client for all OSF requests in one export run. The token is
/// carried here and attached per request, never stored globally.
pub struct OsfClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl OsfClient {
    pub fn new(environment: Environment, token: Option<String>) -> Result<Self, ExportError> {
        Self::with_base_url(environment.api_base().to_string(), token)
    }

    /// Points the client at a different API root. Tests use this to talk
    /// to a local double.
    pub fn with_base_url(base_url: String, token: Option<String>) -> Result<Self, ExportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.get(url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Sends a GET and returns the response body as text, mapping
    /// non-success statuses onto `ExportError`.
    async fn get_body(&self, url: &str) -> Result<String, ExportError> {
        debug!(url = %url, "[API] GET");
        let response = self.request(url).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<failed to decode response body>"));
        if !status.is_success() {
            if (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN)
                && self.token.is_none()
            {
                warn!(status = %status, url = %url, "[API] Access denied and no token supplied");
                return Err(ExportError::AuthRequired(format!(
                    "OSF returned {status} for {url}; a personal access token is required"
                )));
            }
            error!(status = %status, url = %url, "[API] OSF returned error. Response body: {body}");
            return Err(ExportError::Remote {
                status,
                url: url.to_string(),
                body,
            });
        }
        Ok(body)
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, ExportError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.get_body(url).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!(error = ?e, url = %url, "[API] Failed to parse response JSON");
            ExportError::Remote {
                status: StatusCode::OK,
                url: url.to_string(),
                body: format!("unparseable response: {e}"),
            }
        })
    }

    /// Collects every page of a list endpoint by following `links.next`
    /// until it is absent.
    async fn get_all_pages<T>(&self, first_url: &str) -> Result<Vec<T>, ExportError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut resources = Vec::new();
        let mut next = Some(first_url.to_string());
        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            resources.extend(page.data);
            next = page.links.next;
        }
        Ok(resources)
    }

    pub async fn fetch_project(&self, project_id: &str) -> Result<ProjectMetadata, ExportError> {
        let url = format!(
            "{}/nodes/{}/?embed=affiliated_institutions",
            self.base_url, project_id
        );
        let document: Document<NodeResource> = self.get_json(&url).await?;
        Ok(document.data.into_metadata())
    }

    pub async fn fetch_contributors(
        &self,
        project_id: &str,
    ) -> Result<Vec<Contributor>, ExportError> {
        let url = format!(
            "{}/nodes/{}/contributors/?embed=users",
            self.base_url, project_id
        );
        let resources: Vec<ContributorResource> = self.get_all_pages(&url).await?;
        Ok(resources.into_iter().map(|r| r.into_contributor()).collect())
    }

    pub async fn fetch_components(&self, project_id: &str) -> Result<Vec<Component>, ExportError> {
        let url = format!("{}/nodes/{}/children/", self.base_url, project_id);
        let resources: Vec<NodeResource> = self.get_all_pages(&url).await?;
        Ok(resources.into_iter().map(|r| r.into_component()).collect())
    }

    /// First listing URL of a node's storage provider. The walker follows
    /// folder and pagination links from here.
    pub fn storage_root_url(&self, node_id: &str, provider: &str) -> String {
        format!("{}/nodes/{}/files/{}/", self.base_url, node_id, provider)
    }

    /// Every entry of one folder listing, all pages included.
    pub async fn list_folder(&self, url: &str) -> Result<Vec<FileResource>, ExportError> {
        self.get_all_pages(url).await
    }

    pub async fn fetch_wiki_index(&self, project_id: &str) -> Result<Vec<WikiResource>, ExportError> {
        let url = format!("{}/nodes/{}/wikis/", self.base_url, project_id);
        self.get_all_pages(&url).await
    }

    /// Wiki bodies come back as raw markdown text, not JSON.
    pub async fn fetch_wiki_content(&self, wiki_id: &str) -> Result<String, ExportError> {
        let url = format!("{}/wikis/{}/content/", self.base_url, wiki_id);
        self.get_body(&url).await
    }

    /// Every node the token's owner contributes to. Requires a token.
    pub async fn fetch_contributed_projects(&self) -> Result<Vec<Component>, ExportError> {
        if self.token.is_none() {
            return Err(ExportError::AuthRequired(String::from(
                "listing your projects requires a personal access token",
            )));
        }
        let url = format!("{}/users/me/nodes/", self.base_url);
        let resources: Vec<NodeResource> = self.get_all_pages(&url).await?;
        Ok(resources.into_iter().map(|r| r.into_component()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn follows_pagination_links_until_exhausted() {
        let mut server = Server::new_async().await;
        let second_url = format!("{}/contributors-page-2", server.url());
        let first = server
            .mock("GET", "/nodes/abc12/contributors/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"data": [{{"attributes": {{"bibliographic": true}}}}],
                    "links": {{"next": "{second_url}"}}}}"#
            ))
            .create_async()
            .await;
        let second = server
            .mock("GET", "/contributors-page-2")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data": [{"attributes": {"bibliographic": false}}],
                    "links": {"next": null}}"#,
            )
            .create_async()
            .await;

        let client = OsfClient::with_base_url(server.url(), None).unwrap();
        let contributors = client.fetch_contributors("abc12").await.unwrap();

        assert_eq!(contributors.len(), 2);
        assert_eq!(contributors[0].bibliographic, Some(true));
        assert_eq!(contributors[1].bibliographic, Some(false));
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn sends_bearer_token_when_present() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/nodes/abc12/")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer secret-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"id": "abc12", "attributes": {"title": "T"}}}"#)
            .create_async()
            .await;

        let client =
            OsfClient::with_base_url(server.url(), Some("secret-token".into())).unwrap();
        let metadata = client.fetch_project("abc12").await.unwrap();

        assert_eq!(metadata.title, "T");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_without_token_is_auth_required() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/nodes/priv1/")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"errors": [{"detail": "Authentication credentials were not provided."}]}"#)
            .create_async()
            .await;

        let client = OsfClient::with_base_url(server.url(), None).unwrap();
        let err = client.fetch_project("priv1").await.unwrap_err();

        assert!(matches!(err, ExportError::AuthRequired(_)));
    }

    #[tokio::test]
    async fn forbidden_with_token_is_remote_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/nodes/priv1/")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"errors": [{"detail": "You do not have permission."}]}"#)
            .create_async()
            .await;

        let client = OsfClient::with_base_url(server.url(), Some("tok".into())).unwrap();
        let err = client.fetch_project("priv1").await.unwrap_err();

        match err {
            ExportError::Remote { status, body, .. } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(body.contains("permission"));
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wiki_content_is_returned_as_raw_text() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/wikis/w1/content/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("# Home\n\nWelcome to the project wiki.")
            .create_async()
            .await;

        let client = OsfClient::with_base_url(server.url(), None).unwrap();
        let content = client.fetch_wiki_content("w1").await.unwrap();

        assert_eq!(content, "# Home\n\nWelcome to the project wiki.");
    }

    #[tokio::test]
    async fn listing_own_projects_without_token_fails_before_any_request() {
        let client =
            OsfClient::with_base_url("http://127.0.0.1:1".to_string(), None).unwrap();
        let err = client.fetch_contributed_projects().await.unwrap_err();
        assert!(matches!(err, ExportError::AuthRequired(_)));
    }
}
