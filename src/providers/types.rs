//! Typed view of the Azure DevOps REST resources the monitor and dashboard read.
//!
//! Loosely typed `_links` bags are resolved to a single optional web URL while
//! deserializing, so nothing downstream ever touches untyped link data.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type DefinitionId = u32;
pub type BuildId = u64;

/// Envelope used by list endpoints (`{"count": n, "value": [...]}`).
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ReferenceLinks {
    web: Option<Href>,
}

#[derive(Debug, Deserialize)]
struct Href {
    href: String,
}

fn web_href<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let links = Option::<ReferenceLinks>::deserialize(deserializer)?;
    Ok(links.and_then(|l| l.web).map(|w| w.href))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(rename = "_links", default, deserialize_with = "web_href")]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub default_branch: Option<String>,
}

/// Pipeline definition as returned by the definitions list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinitionRef {
    pub id: DefinitionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub repository: Option<RepositoryRef>,
    #[serde(rename = "_links", default, deserialize_with = "web_href")]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionProcess {
    /// Only present for YAML pipelines.
    pub yaml_filename: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionVariableGroup {
    #[serde(default)]
    pub id: u32,
    pub name: Option<String>,
}

/// Full pipeline definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    pub id: DefinitionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub repository: Option<RepositoryRef>,
    pub process: Option<DefinitionProcess>,
    #[serde(default)]
    pub variable_groups: Vec<DefinitionVariableGroup>,
    #[serde(rename = "_links", default, deserialize_with = "web_href")]
    pub web_url: Option<String>,
}

impl PipelineDefinition {
    pub fn yaml_filename(&self) -> Option<&str> {
        self.process
            .as_ref()
            .and_then(|p| p.yaml_filename.as_deref())
            .filter(|f| !f.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildStatus {
    #[default]
    None,
    NotStarted,
    InProgress,
    Cancelling,
    Postponed,
    Completed,
    #[serde(other)]
    Unknown,
}

impl BuildStatus {
    /// Queued or executing.
    pub fn is_running(self) -> bool {
        matches!(self, Self::InProgress | Self::NotStarted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::NotStarted => "NotStarted",
            Self::InProgress => "InProgress",
            Self::Cancelling => "Cancelling",
            Self::Postponed => "Postponed",
            Self::Completed => "Completed",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildResult {
    None,
    Succeeded,
    PartiallySucceeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl BuildResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Succeeded => "Succeeded",
            Self::PartiallySucceeded => "PartiallySucceeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub display_name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: BuildId,
    pub build_number: Option<String>,
    #[serde(default)]
    pub status: BuildStatus,
    pub result: Option<BuildResult>,
    pub queue_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub source_branch: Option<String>,
    pub source_version: Option<String>,
    /// Raw platform reason, e.g. `individualCI` or `manual`.
    #[serde(default)]
    pub reason: String,
    pub requested_for: Option<IdentityRef>,
    pub requested_by: Option<IdentityRef>,
    #[serde(default)]
    pub trigger_info: HashMap<String, String>,
    #[serde(rename = "_links", default, deserialize_with = "web_href")]
    pub web_url: Option<String>,
}

impl Build {
    /// Finish time, else start time, else queue time.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.finish_time.or(self.start_time).or(self.queue_time)
    }

    /// The identity that should be credited with the run: requested-for wins
    /// over requested-by.
    pub fn triggered_by(&self) -> Option<&IdentityRef> {
        self.requested_for.as_ref().or(self.requested_by.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RecordType {
    Stage,
    Phase,
    Job,
    Task,
    Checkpoint,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimelineState {
    #[default]
    Pending,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Canceled,
    Skipped,
    Abandoned,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogReference {
    pub id: Option<u32>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub id: String,
    pub parent_id: Option<String>,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: Option<String>,
    pub order: Option<i32>,
    pub state: Option<TimelineState>,
    pub result: Option<TaskResult>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub log: Option<LogReference>,
}

impl TimelineRecord {
    /// Stages whose names begin with `__` are platform-internal checkpoints.
    pub fn is_visible_stage(&self) -> bool {
        self.record_type == RecordType::Stage
            && !self.name.as_deref().is_some_and(|n| n.starts_with("__"))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Timeline {
    #[serde(default)]
    pub records: Vec<TimelineRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableValue {
    pub value: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub is_read_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableGroup {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, VariableValue>,
    /// Filled in by the dashboard once the project URL is known.
    #[serde(default)]
    pub resource_url: Option<String>,
}

impl VariableGroup {
    /// Replaces secret values with a mask so they never leave the client.
    pub fn mask_secrets(mut self) -> Self {
        for var in self.variables.values_mut() {
            if var.is_secret {
                var.value = Some("******".to_string());
            }
        }
        self
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitItem {
    pub content: Option<String>,
}
