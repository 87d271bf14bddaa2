use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{PipelensError, Result};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECONDS: u64 = 2;
pub(super) const API_VERSION: &str = "7.1";

pub struct AzureDevOpsClient {
    pub(super) client: Client,
    pub(super) org_url: Url,
    pub(super) project_url: Url,
    pub(super) organization: String,
    pub(super) project: String,
    token: Option<Token>,
    retry_delay: Duration,
}

impl AzureDevOpsClient {
    /// Creates a client scoped to one organization and project.
    ///
    /// `base_url` is the service root, normally `https://dev.azure.com`.
    pub fn new(
        base_url: &str,
        organization: &str,
        project: &str,
        token: Option<Token>,
    ) -> Result<Self> {
        if organization.trim().is_empty() || project.trim().is_empty() {
            return Err(PipelensError::Config(
                "organization and project are required".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("pipelens/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base = Url::parse(&base)
            .map_err(|e| PipelensError::Config(format!("Invalid base URL: {e}")))?;

        let org_url = base
            .join(&format!("{}/", urlencoding::encode(organization.trim())))
            .map_err(|e| PipelensError::Config(format!("Invalid organization URL: {e}")))?;

        let project_url = org_url
            .join(&format!("{}/", urlencoding::encode(project.trim())))
            .map_err(|e| PipelensError::Config(format!("Invalid project URL: {e}")))?;

        Ok(Self {
            client,
            org_url,
            project_url,
            organization: organization.trim().to_string(),
            project: project.trim().to_string(),
            token,
            retry_delay: Duration::from_secs(RETRY_DELAY_SECONDS),
        })
    }

    /// Overrides the pause between retries of throttled requests.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.basic_auth("", Some(token.as_str()))
        } else {
            request
        }
    }

    /// Project-scoped `_apis` URL with the api-version and extra query pairs.
    pub(super) fn api_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        Self::with_query(&self.project_url, &format!("_apis/{path}"), query)
    }

    /// Organization-scoped `_apis` URL.
    pub(super) fn org_api_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        Self::with_query(&self.org_url, &format!("_apis/{path}"), query)
    }

    fn with_query(root: &Url, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = root
            .join(path)
            .map_err(|e| PipelensError::Config(format!("Invalid API URL: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("api-version", API_VERSION);
        }
        Ok(url)
    }

    /// GET a JSON resource, retrying on throttling and server errors.
    pub(super) async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.get_json_optional(url).await?.ok_or(PipelensError::ApiError {
            status: StatusCode::NOT_FOUND.as_u16(),
            message: "resource not found".to_string(),
        })
    }

    /// Like [`get_json`](Self::get_json) but maps 404 to `None`.
    pub(super) async fn get_json_optional<T>(&self, url: Url) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut retry_count = 0;
        loop {
            debug!("GET {url}");
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({}), retrying in {:?} ({}/{})...",
                        e,
                        self.retry_delay,
                        retry_count + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(PipelensError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_RETRIES,
                    });
                }

                warn!(
                    "Azure DevOps API error (status {status}). Waiting {:?} before retry {}/{}...",
                    self.retry_delay,
                    retry_count + 1,
                    MAX_RETRIES
                );

                tokio::time::sleep(self.retry_delay).await;
                retry_count += 1;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(PipelensError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            return Ok(Some(response.json().await?));
        }
    }
}
