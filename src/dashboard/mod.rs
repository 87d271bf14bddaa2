//! Pipeline dashboard: row enrichment, progressive loading and the
//! read-only detail views (timeline, job logs, run history, health).

mod enricher;
mod health;
mod loader;
mod logs;
mod runs;
mod timeline;
mod trigger;
mod types;
mod variable_groups;

pub use enricher::{DashboardContext, DashboardEnricher};
pub use health::{health_trend, org_health, summarize, OrgHealth, OrgHealthSummary, PipelineHealthTrend, RunOutcome};
pub use loader::DashboardLoader;
pub use logs::{classify_line, job_logs, BuildJobLog, BuildLogLine, LogSeverity};
pub use runs::{pipeline_runs, PipelineRunInfo};
pub use timeline::{assign_stage_columns, build_timeline, BuildJobInfo, BuildStageInfo, BuildTimeline};
pub use trigger::{TriggerInfo, TriggerType};
pub use types::{PipelineDashboardResponse, PipelineListItem, PipelineVariableGroupRef};
pub use variable_groups::VariableGroupIndex;
