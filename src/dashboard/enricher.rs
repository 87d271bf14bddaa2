use log::debug;

use super::trigger::TriggerInfo;
use super::types::{PipelineListItem, PipelineVariableGroupRef};
use super::variable_groups::VariableGroupIndex;
use crate::monitor::StageBubble;
use crate::providers::types::{Build, PipelineDefinition, Project};
use crate::providers::{short_branch, DevOpsApi, DevOpsLinks};
use crate::yaml::{ParsedPipelineSettings, PipelineSettingsParser};

const SHORT_COMMIT_LEN: usize = 7;

/// Project-wide data fetched once per dashboard load and shared by every
/// enrichment call.
pub struct DashboardContext {
    pub project: Project,
    pub links: DevOpsLinks,
    pub variable_groups: VariableGroupIndex,
}

/// Fills a skeleton [`PipelineListItem`] with build, repository, YAML and
/// variable-group details.
///
/// Each step is independent: a failed lookup is logged and leaves only its
/// own fields empty.
pub struct DashboardEnricher<'a> {
    api: &'a dyn DevOpsApi,
    parser: &'a dyn PipelineSettingsParser,
    context: &'a DashboardContext,
}

impl<'a> DashboardEnricher<'a> {
    pub fn new(
        api: &'a dyn DevOpsApi,
        parser: &'a dyn PipelineSettingsParser,
        context: &'a DashboardContext,
    ) -> Self {
        Self {
            api,
            parser,
            context,
        }
    }

    pub async fn enrich(&self, item: &mut PipelineListItem) {
        let definition = match self.api.definition(item.id).await {
            Ok(definition) => {
                apply_definition(item, &definition);
                Some(definition)
            }
            Err(e) => {
                debug!("Could not load definition of {}: {e}", item.name);
                None
            }
        };

        match self.api.latest_build(item.id).await {
            Ok(Some(build)) => {
                apply_build(item, &build);
                item.stages = match self.api.timeline(build.id).await {
                    Ok(records) => StageBubble::from_timeline(&records),
                    Err(e) => {
                        debug!("No timeline for build {}: {e}", build.id);
                        Vec::new()
                    }
                };
            }
            Ok(None) => {}
            Err(e) => debug!("Could not load latest build of {}: {e}", item.name),
        }

        self.apply_links(item);

        if let Some(definition) = &definition {
            if let Some(settings) = self.parse_yaml(definition).await {
                self.apply_code_repository(item, &settings);
                self.apply_environment_groups(item, &settings);
            }
            if item.variable_groups.is_empty() {
                self.apply_definition_groups(item, definition);
            }
        }
    }

    fn apply_links(&self, item: &mut PipelineListItem) {
        let links = &self.context.links;

        if let Some(repo) = item.repository_name.as_deref().filter(|r| !r.is_empty()) {
            item.repository_url = Some(links.repository(repo));
            if let Some(commit) = &item.last_commit_id_full {
                item.commit_url = Some(links.commit(repo, commit));
            }
        }

        if let Some(build_id) = item.last_run_build_id {
            item.last_run_results_url = Some(links.build_results(build_id));
            item.last_run_logs_url = Some(links.build_logs(build_id));
        }

        let config_branch = [&item.trigger_branch, &item.default_branch]
            .into_iter()
            .flatten()
            .map(|b| short_branch(b))
            .find(|b| !b.is_empty())
            .unwrap_or("main");
        item.pipeline_config_url = Some(links.pipeline_config(item.id, config_branch));
    }

    /// YAML of a YAML-based pipeline, read from its repository's default
    /// branch and parsed. `None` for classic pipelines or on any failure.
    async fn parse_yaml(&self, definition: &PipelineDefinition) -> Option<ParsedPipelineSettings> {
        let yaml_file = definition.yaml_filename()?;
        let repository = definition.repository.as_ref()?;
        let branch = repository
            .default_branch
            .as_deref()
            .map(short_branch)
            .filter(|b| !b.is_empty())
            .unwrap_or("main");

        let content = match self.api.file_content(&repository.id, yaml_file, branch).await {
            Ok(content) => content?,
            Err(e) => {
                debug!("Could not fetch {yaml_file} for {}: {e}", definition.name);
                return None;
            }
        };

        Some(self.parser.parse(&content, Some(definition.id), Some(definition.name.as_str())))
    }

    fn apply_code_repository(&self, item: &mut PipelineListItem, settings: &ParsedPipelineSettings) {
        let Some(repo) = settings.code_repo_name.as_deref().filter(|r| !r.trim().is_empty()) else {
            return;
        };

        item.code_project_name = settings.code_project_name.clone();
        item.code_repo_name = Some(repo.to_string());
        item.code_branch = settings.code_branch.clone();

        let links = &self.context.links;
        let project = settings
            .code_project_name
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.context.project.name);

        item.code_repo_url = Some(links.code_repo(project, repo));
        if let Some(branch) = settings.code_branch.as_deref().filter(|b| !b.trim().is_empty()) {
            item.code_branch_url = Some(links.code_branch(project, repo, branch));
        }
        if let Some(commit) = &item.last_commit_id_full {
            item.commit_url = Some(links.code_commit(project, repo, commit));
        }
    }

    fn apply_environment_groups(&self, item: &mut PipelineListItem, settings: &ParsedPipelineSettings) {
        for env in &settings.environments {
            let Some(name) = env.variable_group_name.as_deref().filter(|n| !n.trim().is_empty()) else {
                continue;
            };

            let mut group_ref = PipelineVariableGroupRef {
                name: name.to_string(),
                environment: Some(env.environment_name.clone()),
                ..PipelineVariableGroupRef::default()
            };

            match self.context.variable_groups.find(name) {
                Some(group) => {
                    group_ref.id = Some(group.id);
                    group_ref.variable_count = group.variables.len();
                    group_ref.resource_url = group.resource_url.clone();
                }
                None => group_ref.resource_url = Some(self.context.links.library()),
            }

            item.variable_groups.push(group_ref);
        }
    }

    /// Lower-fidelity association from the groups linked directly to the
    /// definition; no environment is known.
    fn apply_definition_groups(&self, item: &mut PipelineListItem, definition: &PipelineDefinition) {
        let links = &self.context.links;

        for linked in &definition.variable_groups {
            let name = linked.name.clone().unwrap_or_default();
            let mut group_ref = PipelineVariableGroupRef {
                name: name.clone(),
                id: Some(linked.id),
                ..PipelineVariableGroupRef::default()
            };

            match self.context.variable_groups.exact(&name).filter(|_| !name.trim().is_empty()) {
                Some(group) => {
                    group_ref.resource_url = group.resource_url.clone();
                    group_ref.variable_count = group.variables.len();
                }
                None if linked.id > 0 => group_ref.resource_url = Some(links.variable_group(linked.id)),
                None => group_ref.resource_url = Some(links.library()),
            }

            item.variable_groups.push(group_ref);
        }
    }
}

fn apply_definition(item: &mut PipelineListItem, definition: &PipelineDefinition) {
    if let Some(repository) = &definition.repository {
        item.repository_name = Some(repository.name.clone()).filter(|n| !n.is_empty());
        item.default_branch = repository.default_branch.clone();
    }
    item.resource_url = definition.web_url.clone();
    item.yaml_file_name = definition.yaml_filename().map(str::to_string);
}

fn apply_build(item: &mut PipelineListItem, build: &Build) {
    item.last_run_status = Some(build.status);
    item.last_run_result = build.result;
    item.last_run_time = build.last_activity();
    item.last_run_build_id = Some(build.id);
    item.last_run_build_number = build.build_number.clone();
    item.trigger_branch = build.source_branch.clone();

    item.duration_seconds = match (build.start_time, build.finish_time) {
        (Some(start), Some(finish)) => Some((finish - start).num_seconds()),
        _ => None,
    };

    if let Some(commit) = build.source_version.as_deref().filter(|c| !c.trim().is_empty()) {
        item.last_commit_id_full = Some(commit.to_string());
        item.last_commit_id = Some(commit.chars().take(SHORT_COMMIT_LEN).collect());
    }

    item.apply_trigger(TriggerInfo::classify(build));
}
