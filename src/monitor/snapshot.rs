use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::error::Result;
use crate::providers::types::{
    Build, BuildId, BuildResult, BuildStatus, DefinitionId, PipelineDefinitionRef, TaskResult,
    TimelineRecord, TimelineState,
};
use crate::providers::DevOpsApi;

/// One visible stage of a run, as drawn in the status bubbles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageBubble {
    pub name: String,
    pub state: TimelineState,
    pub result: Option<TaskResult>,
    pub order: i32,
}

impl StageBubble {
    /// Visible stages of a timeline, in their defined order.
    pub fn from_timeline(records: &[TimelineRecord]) -> Vec<Self> {
        let mut stages: Vec<&TimelineRecord> =
            records.iter().filter(|r| r.is_visible_stage()).collect();
        stages.sort_by_key(|r| r.order.unwrap_or_default());

        stages
            .into_iter()
            .map(|r| Self {
                name: r.name.clone().unwrap_or_default(),
                state: r.state.unwrap_or_default(),
                result: r.result,
                order: r.order.unwrap_or_default(),
            })
            .collect()
    }
}

/// Fingerprint used for change detection.
///
/// Field order is fixed: name, status, result, build id, then every stage's
/// name, state and result in stage order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeKey {
    name: String,
    status: Option<BuildStatus>,
    result: Option<BuildResult>,
    build_id: Option<BuildId>,
    stages: Vec<(String, TimelineState, Option<TaskResult>)>,
}

/// State of one pipeline at a poll instant. Built once per poll and never
/// mutated; the next poll supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusSnapshot {
    pub id: DefinitionId,
    pub name: String,
    pub last_run_status: Option<BuildStatus>,
    pub last_run_result: Option<BuildResult>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_run_build_id: Option<BuildId>,
    pub last_run_build_number: Option<String>,
    pub trigger_branch: Option<String>,
    pub trigger_reason: Option<String>,
    pub triggered_by_user: Option<String>,
    pub triggered_by_avatar_url: Option<String>,
    pub stages: Vec<StageBubble>,
}

impl PipelineStatusSnapshot {
    pub fn new(definition: &PipelineDefinitionRef, build: Option<&Build>, stages: Vec<StageBubble>) -> Self {
        let identity = build.and_then(Build::triggered_by);

        Self {
            id: definition.id,
            name: definition.name.clone(),
            last_run_status: build.map(|b| b.status),
            last_run_result: build.and_then(|b| b.result),
            last_run_time: build.and_then(Build::last_activity),
            last_run_build_id: build.map(|b| b.id),
            last_run_build_number: build.and_then(|b| b.build_number.clone()),
            trigger_branch: build.and_then(|b| b.source_branch.clone()),
            trigger_reason: build.map(|b| b.reason.clone()),
            triggered_by_user: identity.and_then(|i| i.display_name.clone()),
            triggered_by_avatar_url: identity.and_then(|i| i.image_url.clone()),
            stages,
        }
    }

    pub fn change_key(&self) -> ChangeKey {
        ChangeKey {
            name: self.name.clone(),
            status: self.last_run_status,
            result: self.last_run_result,
            build_id: self.last_run_build_id,
            stages: self
                .stages
                .iter()
                .map(|s| (s.name.clone(), s.state, s.result))
                .collect(),
        }
    }

    /// Queued or executing.
    pub fn is_running(&self) -> bool {
        self.last_run_status.is_some_and(BuildStatus::is_running)
    }
}

/// Fetches the latest run of one pipeline and reduces it to a snapshot.
///
/// A failed build lookup fails the whole capture. A failed timeline lookup
/// (the run may still be queued) only leaves the stage list empty.
pub async fn capture(api: &dyn DevOpsApi, definition: &PipelineDefinitionRef) -> Result<PipelineStatusSnapshot> {
    let build = api.latest_build(definition.id).await?;

    let stages = match &build {
        Some(build) => match api.timeline(build.id).await {
            Ok(records) => StageBubble::from_timeline(&records),
            Err(e) => {
                debug!("No timeline for build {} of {}: {e}", build.id, definition.name);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    Ok(PipelineStatusSnapshot::new(definition, build.as_ref(), stages))
}
