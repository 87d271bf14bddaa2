use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConnectionSettings;
use crate::error::Result;

use super::types::{
    Build, BuildId, DefinitionId, PipelineDefinition, PipelineDefinitionRef, Project,
    TimelineRecord, VariableGroup,
};

/// Read-only surface of the DevOps platform used by the monitor and dashboard.
///
/// Every call is scoped to the organization and project the implementation
/// was created for.
#[async_trait]
pub trait DevOpsApi: Send + Sync {
    fn organization(&self) -> &str;

    async fn project(&self) -> Result<Project>;

    async fn definitions(&self) -> Result<Vec<PipelineDefinitionRef>>;

    async fn definition(&self, id: DefinitionId) -> Result<PipelineDefinition>;

    /// Most recently queued build, so a run that has not finished yet still
    /// sorts first.
    async fn latest_build(&self, definition_id: DefinitionId) -> Result<Option<Build>>;

    async fn builds(&self, definition_id: DefinitionId, top: usize) -> Result<Vec<Build>>;

    async fn build(&self, build_id: BuildId) -> Result<Build>;

    async fn timeline(&self, build_id: BuildId) -> Result<Vec<TimelineRecord>>;

    async fn log_lines(&self, build_id: BuildId, log_id: u32) -> Result<Vec<String>>;

    async fn variable_groups(&self) -> Result<Vec<VariableGroup>>;

    /// Text content of a file at the tip of `branch`, `None` when empty.
    async fn file_content(
        &self,
        repository_id: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>>;
}

/// Builds an API handle from connection settings loaded at poll time.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DevOpsApi>>;
}
