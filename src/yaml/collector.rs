use indexmap::IndexMap;

use super::types::{Confidence, ParsedEnvironmentSettings, ParsedPipelineSettings};
use crate::providers::types::DefinitionId;

/// Environment codes recognised in `CI_{ENV}_*` variable names.
pub const ENVIRONMENTS: [&str; 7] = ["DEV", "PROD", "CMS", "STAGING", "QA", "UAT", "TEST"];

const CSPROJ_PATH_VARIABLE: &str = "CI_BUILD_CsProjectPath";
const PROJECT_NAME_VARIABLE: &str = "CI_ProjectName";
const BUILD_REPO_ALIAS: &str = "BuildRepo";
const TEMPLATE_REPO_ALIAS: &str = "TemplateRepo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvironmentField {
    VariableGroup,
    IisDeploymentType,
    WebsiteName,
    VirtualPath,
    AppPoolName,
    BindingInfo,
}

impl EnvironmentField {
    fn from_suffix(suffix: &str) -> Option<Self> {
        let field = match suffix.to_ascii_lowercase().as_str() {
            "variablegroup" => Self::VariableGroup,
            "iisdeploymenttype" => Self::IisDeploymentType,
            "websitename" => Self::WebsiteName,
            "virtualpath" => Self::VirtualPath,
            "apppoolname" => Self::AppPoolName,
            "bindinginfo" => Self::BindingInfo,
            _ => return None,
        };
        Some(field)
    }
}

/// Splits `CI_{ENV}_{Field}` into its environment code and field.
fn environment_variable(name: &str) -> Option<(&'static str, EnvironmentField)> {
    let rest = strip_prefix_ignore_case(name, "CI_")?;
    ENVIRONMENTS.iter().find_map(|env| {
        let suffix = strip_prefix_ignore_case(rest, env)?.strip_prefix('_')?;
        EnvironmentField::from_suffix(suffix).map(|field| (*env, field))
    })
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

pub(crate) fn is_build_repo_alias(alias: &str) -> bool {
    contains_ignore_case(alias, BUILD_REPO_ALIAS)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Accumulates recognised repository and variable declarations into a
/// [`ParsedPipelineSettings`]. Both parsers feed the same rules through it.
pub(crate) struct SettingsCollector {
    settings: ParsedPipelineSettings,
    declared_project_name: Option<String>,
    environments: IndexMap<&'static str, ParsedEnvironmentSettings>,
}

impl SettingsCollector {
    pub fn new(pipeline_id: Option<DefinitionId>, pipeline_name: Option<&str>) -> Self {
        let environments = ENVIRONMENTS
            .iter()
            .map(|env| (*env, ParsedEnvironmentSettings::new(env)))
            .collect();

        Self {
            settings: ParsedPipelineSettings::empty(pipeline_id, pipeline_name),
            declared_project_name: None,
            environments,
        }
    }

    /// `name` of the build repository resource, as `project/repo` or `repo`.
    pub fn repository_name(&mut self, name: &str) {
        let mut parts = name.split('/');
        let first = parts.next().unwrap_or_default();
        match parts.next() {
            Some(repo) => {
                self.settings.code_project_name = Some(first.to_string());
                self.settings.code_repo_name = Some(repo.to_string());
            }
            None => {
                if let Some(repo) = non_blank(first) {
                    self.settings.code_repo_name = Some(repo);
                }
            }
        }
    }

    /// `ref` of the build repository resource.
    pub fn repository_ref(&mut self, git_ref: &str) {
        let branch = strip_prefix_ignore_case(git_ref, "refs/heads/").unwrap_or(git_ref);
        self.settings.code_branch = Some(branch.to_string());
    }

    /// One `name`/`value` declaration. Interpolated values are ignored.
    pub fn variable(&mut self, name: &str, value: &str) {
        if value.starts_with('$') {
            return;
        }
        let Some(value) = non_blank(value) else {
            return;
        };

        if name.eq_ignore_ascii_case(CSPROJ_PATH_VARIABLE) {
            self.settings.csproj_path =
                Some(value.trim_start_matches(['/', '\\']).to_string());
            return;
        }

        if name.eq_ignore_ascii_case(PROJECT_NAME_VARIABLE) {
            self.declared_project_name.get_or_insert(value);
            return;
        }

        let Some((env, field)) = environment_variable(name) else {
            return;
        };
        let Some(entry) = self.environments.get_mut(env) else {
            return;
        };

        match field {
            EnvironmentField::VariableGroup => {
                entry.variable_group_name = Some(value);
                entry.confidence = Confidence::High;
            }
            EnvironmentField::IisDeploymentType => entry.iis_deployment_type = Some(value),
            EnvironmentField::WebsiteName => entry.website_name = Some(value),
            EnvironmentField::VirtualPath => entry.virtual_path = Some(value),
            EnvironmentField::AppPoolName => entry.app_pool_name = Some(value),
            EnvironmentField::BindingInfo => entry.binding_info = Some(value),
        }
    }

    pub fn finish(self, text: &str) -> ParsedPipelineSettings {
        let mut settings = self.settings;

        let linked_project = settings
            .code_project_name
            .as_deref()
            .and_then(non_blank);
        settings.project_name = linked_project.or(self.declared_project_name);
        settings.repo_name = settings.code_repo_name.as_deref().and_then(non_blank);
        settings.selected_branch = settings.code_branch.as_deref().and_then(non_blank);

        settings.environments = self
            .environments
            .into_values()
            .filter(ParsedEnvironmentSettings::has_settings)
            .collect();

        settings.is_generated = contains_ignore_case(text, CSPROJ_PATH_VARIABLE)
            || contains_ignore_case(text, TEMPLATE_REPO_ALIAS);

        settings
    }
}
