use chrono::{DateTime, Utc};
use serde::Serialize;

use super::trigger::{TriggerInfo, TriggerType};
use crate::monitor::StageBubble;
use crate::providers::types::{
    BuildId, BuildResult, BuildStatus, DefinitionId, PipelineDefinitionRef, VariableGroup,
};
use crate::providers::DevOpsLinks;

/// Variable group associated with a dashboard row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineVariableGroupRef {
    pub name: String,
    pub environment: Option<String>,
    pub id: Option<u32>,
    pub variable_count: usize,
    pub resource_url: Option<String>,
}

/// One dashboard row.
///
/// Created as a cheap skeleton for every pipeline, then filled in by a single
/// enrichment pass. Read-only once published.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineListItem {
    pub id: DefinitionId,
    pub name: String,
    pub path: String,

    pub repository_name: Option<String>,
    pub default_branch: Option<String>,
    pub yaml_file_name: Option<String>,
    pub resource_url: Option<String>,

    pub last_run_status: Option<BuildStatus>,
    pub last_run_result: Option<BuildResult>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_run_build_id: Option<BuildId>,
    pub last_run_build_number: Option<String>,
    /// Wall time of the last run; only set when it both started and finished.
    pub duration_seconds: Option<i64>,
    pub last_commit_id: Option<String>,
    pub last_commit_id_full: Option<String>,

    pub trigger_branch: Option<String>,
    pub trigger_reason: Option<String>,
    pub trigger_type: Option<TriggerType>,
    pub trigger_display_text: Option<String>,
    pub is_automated_trigger: bool,
    pub triggered_by_user: Option<String>,
    pub triggered_by_avatar_url: Option<String>,
    pub triggered_by_pipeline: Option<String>,

    pub stages: Vec<StageBubble>,
    pub variable_groups: Vec<PipelineVariableGroupRef>,

    pub code_project_name: Option<String>,
    pub code_repo_name: Option<String>,
    pub code_branch: Option<String>,

    pub pipeline_runs_url: String,
    pub edit_wizard_url: String,
    pub repository_url: Option<String>,
    pub commit_url: Option<String>,
    pub last_run_results_url: Option<String>,
    pub last_run_logs_url: Option<String>,
    pub pipeline_config_url: Option<String>,
    pub code_repo_url: Option<String>,
    pub code_branch_url: Option<String>,
}

impl PipelineListItem {
    pub fn skeleton(definition: &PipelineDefinitionRef, links: &DevOpsLinks) -> Self {
        Self {
            id: definition.id,
            name: definition.name.clone(),
            path: definition.path.clone(),
            pipeline_runs_url: links.pipeline_runs(definition.id),
            edit_wizard_url: DevOpsLinks::edit_wizard(definition.id),
            ..Self::default()
        }
    }

    pub(crate) fn apply_trigger(&mut self, trigger: TriggerInfo) {
        self.trigger_reason = Some(trigger.trigger_reason);
        self.trigger_type = Some(trigger.trigger_type);
        self.trigger_display_text = Some(trigger.trigger_display_text);
        self.is_automated_trigger = trigger.is_automated_trigger;
        self.triggered_by_user = trigger.triggered_by_user;
        self.triggered_by_avatar_url = trigger.triggered_by_avatar_url;
        self.triggered_by_pipeline = trigger.triggered_by_pipeline;
    }
}

/// Result of a full dashboard load.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDashboardResponse {
    pub success: bool,
    pub error_message: Option<String>,
    pub pipelines: Vec<PipelineListItem>,
    pub available_variable_groups: Vec<VariableGroup>,
    pub total_count: usize,
}

impl PipelineDashboardResponse {
    pub fn failed(message: String) -> Self {
        Self {
            success: false,
            error_message: Some(message),
            ..Self::default()
        }
    }
}
