use chrono::{DateTime, Utc};
use serde::Serialize;

use super::trigger::TriggerInfo;
use crate::error::Result;
use crate::providers::types::{Build, BuildId, BuildResult, BuildStatus, DefinitionId};
use crate::providers::DevOpsApi;

/// One row of a pipeline's run history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunInfo {
    pub run_id: BuildId,
    pub build_number: Option<String>,
    pub status: BuildStatus,
    pub result: Option<BuildResult>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub resource_url: Option<String>,
    pub source_branch: Option<String>,
    pub source_version: Option<String>,
    #[serde(flatten)]
    pub trigger: TriggerInfo,
}

impl From<Build> for PipelineRunInfo {
    fn from(build: Build) -> Self {
        let trigger = TriggerInfo::classify(&build);
        Self {
            run_id: build.id,
            build_number: build.build_number,
            status: build.status,
            result: build.result,
            start_time: build.start_time,
            finish_time: build.finish_time,
            resource_url: build.web_url,
            source_branch: build.source_branch,
            source_version: build.source_version,
            trigger,
        }
    }
}

/// The `top` most recent runs of a pipeline, newest first.
pub async fn pipeline_runs(
    api: &dyn DevOpsApi,
    definition_id: DefinitionId,
    top: usize,
) -> Result<Vec<PipelineRunInfo>> {
    let builds = api.builds(definition_id, top).await?;
    Ok(builds.into_iter().map(PipelineRunInfo::from).collect())
}
