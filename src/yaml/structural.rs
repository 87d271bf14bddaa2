use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use super::collector::{is_build_repo_alias, SettingsCollector};
use super::scan::LineScanParser;
use super::types::ParsedPipelineSettings;
use super::PipelineSettingsParser;
use crate::providers::types::DefinitionId;

/// Parses the document with `serde_yaml` and walks it for variable lists and
/// repository resources, applying the same recognition rules as
/// [`LineScanParser`]. Falls back to the line scanner when the text is not
/// valid YAML.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralParser;

impl PipelineSettingsParser for StructuralParser {
    fn parse(
        &self,
        yaml: &str,
        pipeline_id: Option<DefinitionId>,
        pipeline_name: Option<&str>,
    ) -> ParsedPipelineSettings {
        if yaml.trim().is_empty() {
            return ParsedPipelineSettings::empty(pipeline_id, pipeline_name);
        }

        let document: Value = match serde_yaml::from_str(yaml) {
            Ok(document @ Value::Mapping(_)) => document,
            Ok(_) => {
                debug!("Pipeline YAML is not a mapping, using line scan");
                return LineScanParser.parse(yaml, pipeline_id, pipeline_name);
            }
            Err(e) => {
                warn!("Pipeline YAML did not parse ({e}), using line scan");
                return LineScanParser.parse(yaml, pipeline_id, pipeline_name);
            }
        };

        let mut collector = SettingsCollector::new(pipeline_id, pipeline_name);
        walk(&document, &mut collector);
        collector.finish(yaml)
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn get<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    mapping.get(key)
}

fn walk(value: &Value, collector: &mut SettingsCollector) {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                match key.as_str() {
                    Some("variables") => read_variables(child, collector),
                    Some("repositories") => read_repositories(child, collector),
                    _ => {}
                }
                walk(child, collector);
            }
        }
        Value::Sequence(items) => items.iter().for_each(|item| walk(item, collector)),
        Value::Tagged(tagged) => walk(&tagged.value, collector),
        _ => {}
    }
}

/// Accepts both the list form (`- name: X` / `value: Y`) and the map form
/// (`X: Y`) of a variables block. Group references in the list form carry
/// no `value` and are ignored.
fn read_variables(variables: &Value, collector: &mut SettingsCollector) {
    match variables {
        Value::Sequence(items) => {
            for item in items.iter().filter_map(Value::as_mapping) {
                let name = get(item, "name").and_then(scalar);
                let value = get(item, "value").and_then(scalar);
                if let (Some(name), Some(value)) = (name, value) {
                    collector.variable(&name, &value);
                }
            }
        }
        Value::Mapping(mapping) => {
            for (name, value) in mapping {
                if let (Some(name), Some(value)) = (name.as_str(), scalar(value)) {
                    collector.variable(name, &value);
                }
            }
        }
        _ => {}
    }
}

fn read_repositories(repositories: &Value, collector: &mut SettingsCollector) {
    let Some(items) = repositories.as_sequence() else {
        return;
    };

    for repo in items.iter().filter_map(Value::as_mapping) {
        let is_build_repo = get(repo, "repository")
            .and_then(Value::as_str)
            .is_some_and(is_build_repo_alias);
        if !is_build_repo {
            continue;
        }

        if let Some(name) = get(repo, "name").and_then(scalar).filter(|n| !n.is_empty()) {
            collector.repository_name(&name);
        }
        if let Some(git_ref) = get(repo, "ref").and_then(scalar).filter(|r| !r.is_empty()) {
            collector.repository_ref(&git_ref);
        }
    }
}
