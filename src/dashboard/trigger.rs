use serde::Serialize;

use crate::providers::types::Build;

const TRIGGERING_PIPELINE_KEY: &str = "triggeringBuild.definition.name";

/// Display taxonomy for why a run started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriggerType {
    Manual,
    CodePush,
    Scheduled,
    PullRequest,
    PipelineCompletion,
    ResourceTrigger,
    Other,
}

impl TriggerType {
    /// Maps the platform's raw build reason (`individualCI`, `manual`, ...).
    pub fn from_reason(reason: &str) -> Self {
        match reason.to_ascii_lowercase().as_str() {
            "manual" => Self::Manual,
            "individualci" | "batchedci" => Self::CodePush,
            "schedule" => Self::Scheduled,
            "pullrequest" | "validateshelveset" => Self::PullRequest,
            "buildcompletion" => Self::PipelineCompletion,
            "resourcetrigger" => Self::ResourceTrigger,
            _ => Self::Other,
        }
    }

    pub fn is_automated(self) -> bool {
        self != Self::Manual
    }
}

/// Trigger classification and attribution of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    pub trigger_type: TriggerType,
    pub trigger_reason: String,
    pub trigger_display_text: String,
    pub is_automated_trigger: bool,
    pub triggered_by_user: Option<String>,
    pub triggered_by_avatar_url: Option<String>,
    /// Only for pipeline-completion triggers.
    pub triggered_by_pipeline: Option<String>,
}

impl TriggerInfo {
    pub fn classify(build: &Build) -> Self {
        let trigger_type = TriggerType::from_reason(&build.reason);
        let identity = build.triggered_by();

        let trigger_display_text = match trigger_type {
            TriggerType::Manual => "Manual".to_string(),
            TriggerType::CodePush => "Code push".to_string(),
            TriggerType::Scheduled => "Scheduled".to_string(),
            TriggerType::PullRequest => "Pull request".to_string(),
            TriggerType::PipelineCompletion => "Pipeline completion".to_string(),
            TriggerType::ResourceTrigger => "Resource".to_string(),
            TriggerType::Other => capitalize(&build.reason),
        };

        let triggered_by_pipeline = match trigger_type {
            TriggerType::PipelineCompletion => build.trigger_info.get(TRIGGERING_PIPELINE_KEY).cloned(),
            _ => None,
        };

        Self {
            trigger_type,
            trigger_reason: build.reason.clone(),
            trigger_display_text,
            is_automated_trigger: trigger_type.is_automated(),
            triggered_by_user: identity.and_then(|i| i.display_name.clone()),
            triggered_by_avatar_url: identity.and_then(|i| i.image_url.clone()),
            triggered_by_pipeline,
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
