use log::debug;

use super::collector::{is_build_repo_alias, SettingsCollector};
use super::types::ParsedPipelineSettings;
use super::PipelineSettingsParser;
use crate::providers::types::DefinitionId;

/// Line-oriented scanner for the platform's variable-declaration idiom.
///
/// Works on text that is not valid YAML at all: each line is inspected on its
/// own and nothing ever fails, so a malformed document yields whatever was
/// recognised before and after the damage.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineScanParser;

impl PipelineSettingsParser for LineScanParser {
    fn parse(
        &self,
        yaml: &str,
        pipeline_id: Option<DefinitionId>,
        pipeline_name: Option<&str>,
    ) -> ParsedPipelineSettings {
        if yaml.trim().is_empty() {
            return ParsedPipelineSettings::empty(pipeline_id, pipeline_name);
        }

        let lines: Vec<&str> = yaml.split('\n').collect();
        let mut collector = SettingsCollector::new(pipeline_id, pipeline_name);

        scan_build_repository(&lines, &mut collector);
        scan_variables(&lines, &mut collector);

        let settings = collector.finish(yaml);
        debug!(
            "Line scan found {} environment(s) for pipeline {:?}",
            settings.environments.len(),
            pipeline_name.unwrap_or("<unnamed>")
        );
        settings
    }
}

/// Text after the first colon with surrounding whitespace and quotes removed.
fn line_value(line: &str) -> &str {
    let trimmed = line.trim();
    match trimmed.find(':') {
        Some(colon) if colon > 0 && colon < trimmed.len() - 1 => trimmed[colon + 1..]
            .trim()
            .trim_matches(|c| c == '"' || c == '\''),
        _ => "",
    }
}

fn scan_build_repository(lines: &[&str], collector: &mut SettingsCollector) {
    let mut in_block = false;

    for line in lines {
        let trimmed = line.trim();

        if trimmed.starts_with("- repository:") && is_build_repo_alias(trimmed) {
            in_block = true;
            continue;
        }
        if !in_block {
            continue;
        }

        let dedented = line.chars().next().is_some_and(|c| !c.is_whitespace());
        if trimmed.starts_with("- repository:")
            || (!trimmed.is_empty() && dedented && !trimmed.starts_with('-'))
        {
            in_block = false;
            continue;
        }

        if trimmed.starts_with("name:") {
            let value = line_value(trimmed);
            if !value.is_empty() {
                collector.repository_name(value);
            }
        } else if trimmed.starts_with("ref:") {
            let value = line_value(trimmed);
            if !value.is_empty() {
                collector.repository_ref(value);
            }
        }
    }
}

fn scan_variables(lines: &[&str], collector: &mut SettingsCollector) {
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if !(trimmed.starts_with("- name:") || trimmed.starts_with("name:")) {
            continue;
        }

        let name = line_value(trimmed);
        let value = lines
            .get(i + 1)
            .map(|next| next.trim())
            .filter(|next| next.starts_with("value:"))
            .map(line_value)
            .unwrap_or_default();

        collector.variable(name, value);
    }
}
