use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::providers::types::{
    BuildId, BuildResult, BuildStatus, RecordType, TaskResult, TimelineRecord, TimelineState,
};
use crate::providers::DevOpsApi;

/// Stages starting within this many seconds of a column's first stage run in
/// parallel with it.
const PARALLEL_WINDOW_SECS: i64 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildJobInfo {
    pub id: String,
    pub name: String,
    pub order: i32,
    pub state: TimelineState,
    pub result: Option<TaskResult>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub task_count: usize,
    pub tasks_completed: usize,
    pub log_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStageInfo {
    pub id: String,
    pub name: String,
    pub order: i32,
    pub state: TimelineState,
    pub result: Option<TaskResult>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    /// Left-to-right position in the stage graph.
    pub column: usize,
    pub jobs: Vec<BuildJobInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTimeline {
    pub build_id: BuildId,
    pub build_number: Option<String>,
    pub status: BuildStatus,
    pub result: Option<BuildResult>,
    pub stages: Vec<BuildStageInfo>,
}

/// Expanded stage and job view of one build.
pub async fn build_timeline(api: &dyn DevOpsApi, build_id: BuildId) -> Result<BuildTimeline> {
    let build = api.build(build_id).await?;
    let records = api.timeline(build_id).await?;

    let mut stages = stages_from_records(&records);
    assign_stage_columns(&mut stages);

    Ok(BuildTimeline {
        build_id,
        build_number: build.build_number,
        status: build.status,
        result: build.result,
        stages,
    })
}

fn stages_from_records(records: &[TimelineRecord]) -> Vec<BuildStageInfo> {
    let mut stages: Vec<&TimelineRecord> = records.iter().filter(|r| r.is_visible_stage()).collect();
    stages.sort_by_key(|r| r.order.unwrap_or_default());

    stages
        .into_iter()
        .map(|stage| {
            let mut jobs: Vec<&TimelineRecord> = records
                .iter()
                .filter(|r| {
                    r.record_type == RecordType::Job && r.parent_id.as_deref() == Some(stage.id.as_str())
                })
                .collect();
            jobs.sort_by_key(|r| r.order.unwrap_or_default());

            BuildStageInfo {
                id: stage.id.clone(),
                name: stage.name.clone().unwrap_or_default(),
                order: stage.order.unwrap_or_default(),
                state: stage.state.unwrap_or_default(),
                result: stage.result,
                start_time: stage.start_time,
                finish_time: stage.finish_time,
                column: 0,
                jobs: jobs.into_iter().map(|job| job_info(job, records)).collect(),
            }
        })
        .collect()
}

fn job_info(job: &TimelineRecord, records: &[TimelineRecord]) -> BuildJobInfo {
    let tasks: Vec<&TimelineRecord> = records
        .iter()
        .filter(|r| {
            r.record_type == RecordType::Task && r.parent_id.as_deref() == Some(job.id.as_str())
        })
        .collect();

    BuildJobInfo {
        id: job.id.clone(),
        name: job.name.clone().unwrap_or_default(),
        order: job.order.unwrap_or_default(),
        state: job.state.unwrap_or_default(),
        result: job.result,
        start_time: job.start_time,
        finish_time: job.finish_time,
        task_count: tasks.len(),
        tasks_completed: tasks
            .iter()
            .filter(|t| t.state == Some(TimelineState::Completed))
            .count(),
        log_url: job.log.as_ref().and_then(|log| log.url.clone()),
    }
}

/// Groups stages into graph columns by start time.
///
/// Timed stages come first in start order; a stage shares the current column
/// while it started within [`PARALLEL_WINDOW_SECS`] of that column's first
/// stage. Stages that have not started get one column each, by order.
pub fn assign_stage_columns(stages: &mut [BuildStageInfo]) {
    let mut timed: Vec<(DateTime<Utc>, usize)> = stages
        .iter()
        .enumerate()
        .filter_map(|(i, stage)| stage.start_time.map(|start| (start, i)))
        .collect();
    timed.sort_by_key(|(start, _)| *start);

    let mut untimed: Vec<usize> = (0..stages.len())
        .filter(|&i| stages[i].start_time.is_none())
        .collect();
    untimed.sort_by_key(|&i| stages[i].order);

    let mut next_column = 0;
    if let Some(&(first_start, _)) = timed.first() {
        let mut column = 0;
        let mut column_start = first_start;
        for (start, i) in timed {
            if (start - column_start).num_milliseconds() > PARALLEL_WINDOW_SECS * 1000 {
                column += 1;
                column_start = start;
            }
            stages[i].column = column;
        }
        next_column = column + 1;
    }

    for i in untimed {
        stages[i].column = next_column;
        next_column += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, build, record, with_log, FakeApi};

    fn stage(name: &str, order: i32, start: Option<i64>) -> BuildStageInfo {
        BuildStageInfo {
            id: name.to_string(),
            name: name.to_string(),
            order,
            state: TimelineState::Pending,
            result: None,
            start_time: start.map(at),
            finish_time: None,
            column: 0,
            jobs: Vec::new(),
        }
    }

    fn columns(stages: &[BuildStageInfo]) -> Vec<(&str, usize)> {
        stages.iter().map(|s| (s.name.as_str(), s.column)).collect()
    }

    #[test]
    fn test_parallel_stages_share_a_column() {
        let mut stages = vec![
            stage("Build", 1, Some(0)),
            stage("Lint", 2, Some(2)),
            stage("Deploy", 3, Some(10)),
        ];
        assign_stage_columns(&mut stages);
        assert_eq!(columns(&stages), vec![("Build", 0), ("Lint", 0), ("Deploy", 1)]);
    }

    #[test]
    fn test_window_is_measured_from_column_start() {
        let mut stages = vec![
            stage("A", 1, Some(0)),
            stage("B", 2, Some(5)),
            stage("C", 3, Some(9)),
            stage("D", 4, Some(13)),
        ];
        assign_stage_columns(&mut stages);
        assert_eq!(columns(&stages), vec![("A", 0), ("B", 0), ("C", 1), ("D", 1)]);
    }

    #[test]
    fn test_fractional_gap_past_window_opens_column() {
        let mut stages = vec![
            stage("Build", 1, Some(0)),
            stage("Exact", 2, Some(5)),
            stage("Late", 3, Some(0)),
        ];
        stages[2].start_time = Some(at(5) + chrono::Duration::milliseconds(900));
        assign_stage_columns(&mut stages);
        assert_eq!(columns(&stages), vec![("Build", 0), ("Exact", 0), ("Late", 1)]);
    }

    #[test]
    fn test_untimed_stages_follow_in_order() {
        let mut stages = vec![
            stage("Prod", 4, None),
            stage("Build", 1, Some(30)),
            stage("Test", 2, Some(0)),
            stage("Staging", 3, None),
        ];
        assign_stage_columns(&mut stages);
        assert_eq!(
            columns(&stages),
            vec![("Prod", 3), ("Build", 1), ("Test", 0), ("Staging", 2)]
        );
    }

    #[test]
    fn test_only_untimed_stages() {
        let mut stages = vec![stage("B", 2, None), stage("A", 1, None)];
        assign_stage_columns(&mut stages);
        assert_eq!(columns(&stages), vec![("B", 1), ("A", 0)]);
    }

    #[tokio::test]
    async fn test_build_timeline_groups_jobs_and_tasks() {
        let api = FakeApi::new();
        let mut build_stage = record("Build", None, RecordType::Stage, 1, TimelineState::Completed);
        build_stage.start_time = Some(at(0));
        let mut test_stage = record("Test", None, RecordType::Stage, 2, TimelineState::InProgress);
        test_stage.start_time = Some(at(60));

        api.update(|s| {
            s.builds.insert(3, vec![build(90, BuildStatus::InProgress, None)]);
            s.timelines.insert(
                90,
                vec![
                    test_stage,
                    build_stage,
                    record("__checkpoint", None, RecordType::Stage, 0, TimelineState::Completed),
                    with_log(
                        record("Unit", Some("Test"), RecordType::Job, 1, TimelineState::InProgress),
                        7,
                    ),
                    record("Package", Some("Build"), RecordType::Job, 2, TimelineState::Completed),
                    record("Compile", Some("Build"), RecordType::Job, 1, TimelineState::Completed),
                    record("t1", Some("Unit"), RecordType::Task, 1, TimelineState::Completed),
                    record("t2", Some("Unit"), RecordType::Task, 2, TimelineState::InProgress),
                    record("t3", Some("Unit"), RecordType::Task, 3, TimelineState::Pending),
                ],
            );
        });

        let timeline = build_timeline(&api, 90).await.unwrap();

        assert_eq!(timeline.build_number.as_deref(), Some("2024.90"));
        assert_eq!(timeline.status, BuildStatus::InProgress);
        let names: Vec<_> = timeline.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Build", "Test"]);
        assert_eq!(
            timeline.stages.iter().map(|s| s.column).collect::<Vec<_>>(),
            vec![0, 1]
        );

        let build_jobs: Vec<_> = timeline.stages[0].jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(build_jobs, vec!["Compile", "Package"]);

        let unit = &timeline.stages[1].jobs[0];
        assert_eq!(unit.task_count, 3);
        assert_eq!(unit.tasks_completed, 1);
        assert_eq!(unit.log_url.as_deref(), Some("https://logs/7"));
    }

    #[tokio::test]
    async fn test_missing_build_is_an_error() {
        let api = FakeApi::new();
        assert!(build_timeline(&api, 404).await.is_err());

        api.update(|s| {
            s.builds
                .insert(1, vec![build(5, BuildStatus::Completed, Some(BuildResult::Succeeded))]);
        });
        let empty = build_timeline(&api, 5).await.unwrap();
        assert!(empty.stages.is_empty());
        assert_eq!(empty.result, Some(BuildResult::Succeeded));
    }
}
