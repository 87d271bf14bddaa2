use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info};
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::providers::types::{Build, BuildResult, BuildStatus, DefinitionId, PipelineDefinitionRef};
use crate::providers::DevOpsApi;

const HEALTHY_RATE: u32 = 80;
const UNSTABLE_RATE: u32 = 50;

/// Outcome of one recent run as shown in a health sparkline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    InProgress,
    Succeeded,
    PartiallySucceeded,
    Failed,
    Canceled,
    None,
    Unknown,
}

impl RunOutcome {
    fn of_completed(build: &Build) -> Self {
        match build.result {
            Some(BuildResult::Succeeded) => Self::Succeeded,
            Some(BuildResult::PartiallySucceeded) => Self::PartiallySucceeded,
            Some(BuildResult::Failed) => Self::Failed,
            Some(BuildResult::Canceled) => Self::Canceled,
            Some(BuildResult::None) => Self::None,
            Some(BuildResult::Unknown) | None => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineHealthTrend {
    pub pipeline_id: DefinitionId,
    pub name: String,
    /// Running builds first, then completed ones newest first.
    pub recent_results: Vec<RunOutcome>,
    /// Percent of completed runs that succeeded, rounded.
    pub success_rate: u32,
    /// Positive for consecutive successes, negative for consecutive failures.
    pub streak: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgHealthSummary {
    pub total_pipelines: usize,
    pub healthy_pipelines: usize,
    pub unstable_pipelines: usize,
    pub failing_pipelines: usize,
    pub overall_health_percent: u32,
    pub total_builds_analyzed: usize,
    pub total_succeeded: usize,
    pub total_failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgHealth {
    pub pipelines: Vec<PipelineHealthTrend>,
    pub summary: OrgHealthSummary,
}

fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        (part as f64 * 100.0 / total as f64).round() as u32
    }
}

/// Reduces a pipeline's recent builds (newest first) to its health trend.
pub fn health_trend(definition: &PipelineDefinitionRef, builds: &[Build], limit: usize) -> PipelineHealthTrend {
    let (running, completed): (Vec<&Build>, Vec<&Build>) = builds
        .iter()
        .partition(|b| b.status == BuildStatus::InProgress);
    let results: Vec<RunOutcome> = completed.into_iter().map(RunOutcome::of_completed).collect();

    let succeeded = results.iter().filter(|r| **r == RunOutcome::Succeeded).count();

    let streak = match results.first() {
        Some(RunOutcome::Succeeded) => {
            results.iter().take_while(|r| **r == RunOutcome::Succeeded).count() as i32
        }
        Some(RunOutcome::Failed) => {
            -(results.iter().take_while(|r| **r == RunOutcome::Failed).count() as i32)
        }
        _ => 0,
    };

    let recent_results = std::iter::repeat(RunOutcome::InProgress)
        .take(running.len())
        .chain(results.iter().copied())
        .take(limit)
        .collect();

    PipelineHealthTrend {
        pipeline_id: definition.id,
        name: definition.name.clone(),
        recent_results,
        success_rate: percent(succeeded, results.len()),
        streak,
    }
}

/// Sorts trends worst first and aggregates the summary.
pub fn summarize(mut trends: Vec<PipelineHealthTrend>) -> OrgHealth {
    trends.sort_by(|a, b| a.success_rate.cmp(&b.success_rate).then_with(|| a.name.cmp(&b.name)));

    let mut summary = OrgHealthSummary {
        total_pipelines: trends.len(),
        ..OrgHealthSummary::default()
    };

    for trend in &trends {
        let rate = trend.success_rate;
        if rate >= HEALTHY_RATE {
            summary.healthy_pipelines += 1;
        } else if rate >= UNSTABLE_RATE {
            summary.unstable_pipelines += 1;
        } else if !trend.recent_results.is_empty() {
            summary.failing_pipelines += 1;
        }

        for outcome in trend.recent_results.iter().filter(|r| **r != RunOutcome::InProgress) {
            summary.total_builds_analyzed += 1;
            match outcome {
                RunOutcome::Succeeded => summary.total_succeeded += 1,
                RunOutcome::Failed => summary.total_failed += 1,
                _ => {}
            }
        }
    }
    summary.overall_health_percent = percent(summary.total_succeeded, summary.total_builds_analyzed);

    OrgHealth {
        pipelines: trends,
        summary,
    }
}

/// Health trends for every pipeline in the project.
///
/// Pipelines whose builds cannot be fetched are left out of the result.
pub async fn org_health(
    api: &dyn DevOpsApi,
    builds_per_pipeline: usize,
    max_concurrent: usize,
) -> Result<OrgHealth> {
    let definitions = api.definitions().await?;
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let futures = definitions.iter().map(|definition| {
        let semaphore = semaphore.clone();
        async move {
            let _permit = semaphore.acquire().await.ok()?;
            match api.builds(definition.id, builds_per_pipeline).await {
                Ok(builds) => Some(health_trend(definition, &builds, builds_per_pipeline)),
                Err(e) => {
                    debug!("Skipping health of {}: {e}", definition.name);
                    None
                }
            }
        }
    });

    let trends: Vec<PipelineHealthTrend> = join_all(futures).await.into_iter().flatten().collect();
    info!("Analyzed health of {} of {} pipelines", trends.len(), definitions.len());

    Ok(summarize(trends))
}
