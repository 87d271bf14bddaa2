use serde::Serialize;

use crate::providers::types::DefinitionId;

/// How a parsed environment value was inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    /// Matched the exact `CI_{ENV}_VariableGroup` naming convention.
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEnvironmentSettings {
    pub environment_name: String,
    pub variable_group_name: Option<String>,
    pub iis_deployment_type: Option<String>,
    pub website_name: Option<String>,
    pub virtual_path: Option<String>,
    pub app_pool_name: Option<String>,
    pub binding_info: Option<String>,
    pub confidence: Confidence,
}

impl ParsedEnvironmentSettings {
    pub fn new(environment_name: &str) -> Self {
        Self {
            environment_name: environment_name.to_string(),
            ..Self::default()
        }
    }

    /// False for placeholder scaffolding with every field empty.
    pub fn has_settings(&self) -> bool {
        [
            &self.variable_group_name,
            &self.iis_deployment_type,
            &self.website_name,
            &self.virtual_path,
            &self.app_pool_name,
            &self.binding_info,
        ]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Deployment metadata recovered from a pipeline's YAML text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPipelineSettings {
    pub pipeline_id: Option<DefinitionId>,
    pub pipeline_name: Option<String>,

    /// Source repository linkage from the `BuildRepo` resource.
    pub code_project_name: Option<String>,
    pub code_repo_name: Option<String>,
    pub code_branch: Option<String>,

    /// Mirrors of the linkage used to pre-fill the pipeline wizard.
    pub project_name: Option<String>,
    pub repo_name: Option<String>,
    pub selected_branch: Option<String>,

    pub csproj_path: Option<String>,
    pub environments: Vec<ParsedEnvironmentSettings>,
    pub is_generated: bool,
}

impl ParsedPipelineSettings {
    pub fn empty(pipeline_id: Option<DefinitionId>, pipeline_name: Option<&str>) -> Self {
        Self {
            pipeline_id,
            pipeline_name: pipeline_name.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn environment(&self, name: &str) -> Option<&ParsedEnvironmentSettings> {
        self.environments
            .iter()
            .find(|env| env.environment_name.eq_ignore_ascii_case(name))
    }
}
