mod builds;
mod core;
mod repos;

use std::sync::Arc;

use async_trait::async_trait;

pub use self::core::AzureDevOpsClient;

use crate::config::ConnectionSettings;
use crate::error::Result;
use crate::providers::api::{ClientFactory, DevOpsApi};
use crate::providers::types::{
    Build, BuildId, DefinitionId, PipelineDefinition, PipelineDefinitionRef, Project,
    TimelineRecord, VariableGroup,
};

#[async_trait]
impl DevOpsApi for AzureDevOpsClient {
    fn organization(&self) -> &str {
        &self.organization
    }

    async fn project(&self) -> Result<Project> {
        self.fetch_project().await
    }

    async fn definitions(&self) -> Result<Vec<PipelineDefinitionRef>> {
        self.fetch_definitions().await
    }

    async fn definition(&self, id: DefinitionId) -> Result<PipelineDefinition> {
        self.fetch_definition(id).await
    }

    async fn latest_build(&self, definition_id: DefinitionId) -> Result<Option<Build>> {
        Ok(self.fetch_builds(definition_id, 1).await?.into_iter().next())
    }

    async fn builds(&self, definition_id: DefinitionId, top: usize) -> Result<Vec<Build>> {
        self.fetch_builds(definition_id, top).await
    }

    async fn build(&self, build_id: BuildId) -> Result<Build> {
        self.fetch_build(build_id).await
    }

    async fn timeline(&self, build_id: BuildId) -> Result<Vec<TimelineRecord>> {
        self.fetch_timeline(build_id).await
    }

    async fn log_lines(&self, build_id: BuildId, log_id: u32) -> Result<Vec<String>> {
        self.fetch_log_lines(build_id, log_id).await
    }

    async fn variable_groups(&self) -> Result<Vec<VariableGroup>> {
        self.fetch_variable_groups().await
    }

    async fn file_content(
        &self,
        repository_id: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>> {
        self.fetch_file_content(repository_id, path, branch).await
    }
}

/// Creates [`AzureDevOpsClient`]s against a fixed service root.
pub struct AzureClientFactory {
    base_url: String,
}

impl AzureClientFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl ClientFactory for AzureClientFactory {
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DevOpsApi>> {
        let client = AzureDevOpsClient::new(
            &self.base_url,
            &settings.organization,
            &settings.project,
            Some(settings.token.clone()),
        )?;
        Ok(Arc::new(client))
    }
}
