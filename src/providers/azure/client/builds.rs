use serde::Deserialize;

use super::core::AzureDevOpsClient;
use crate::error::{PipelensError, Result};
use crate::providers::types::{
    Build, BuildId, DefinitionId, ListResponse, PipelineDefinition, PipelineDefinitionRef,
    Timeline, TimelineRecord,
};

#[derive(Debug, Deserialize)]
struct LogLines {
    #[serde(default)]
    value: Vec<String>,
}

impl AzureDevOpsClient {
    pub async fn fetch_definitions(&self) -> Result<Vec<PipelineDefinitionRef>> {
        let url = self.api_url("build/definitions", &[])?;
        let response: ListResponse<PipelineDefinitionRef> = self.get_json(url).await?;
        Ok(response.value)
    }

    pub async fn fetch_definition(&self, id: DefinitionId) -> Result<PipelineDefinition> {
        let url = self.api_url(&format!("build/definitions/{id}"), &[])?;
        self.get_json_optional(url)
            .await?
            .ok_or(PipelensError::DefinitionNotFound(id))
    }

    /// Builds for one definition, newest queue time first.
    ///
    /// Queue-time ordering keeps a running build (no finish time yet) ahead of
    /// completed ones.
    pub async fn fetch_builds(&self, definition_id: DefinitionId, top: usize) -> Result<Vec<Build>> {
        let url = self.api_url(
            "build/builds",
            &[
                ("definitions", definition_id.to_string()),
                ("$top", top.to_string()),
                ("queryOrder", "queueTimeDescending".to_string()),
            ],
        )?;
        let response: ListResponse<Build> = self.get_json(url).await?;
        Ok(response.value)
    }

    pub async fn fetch_build(&self, build_id: BuildId) -> Result<Build> {
        let url = self.api_url(&format!("build/builds/{build_id}"), &[])?;
        self.get_json_optional(url)
            .await?
            .ok_or(PipelensError::BuildNotFound(build_id))
    }

    pub async fn fetch_timeline(&self, build_id: BuildId) -> Result<Vec<TimelineRecord>> {
        let url = self.api_url(&format!("build/builds/{build_id}/timeline"), &[])?;
        // A queued build has no timeline yet; the endpoint answers 204/404.
        let timeline: Option<Timeline> = self.get_json_optional(url).await.or_else(|e| match e {
            PipelensError::Network(err) if err.is_decode() => Ok(None),
            other => Err(other),
        })?;
        Ok(timeline.map(|t| t.records).unwrap_or_default())
    }

    pub async fn fetch_log_lines(&self, build_id: BuildId, log_id: u32) -> Result<Vec<String>> {
        let url = self.api_url(&format!("build/builds/{build_id}/logs/{log_id}"), &[])?;
        let lines: LogLines = self.get_json(url).await?;
        Ok(lines.value)
    }
}
