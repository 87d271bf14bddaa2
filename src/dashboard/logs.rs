use log::debug;
use serde::Serialize;

use crate::error::{PipelensError, Result};
use crate::providers::types::{BuildId, RecordType, TimelineRecord};
use crate::providers::DevOpsApi;

const ERROR_MARKER: &str = "##[error]";
const WARNING_MARKER: &str = "##[warning]";
const SECTION_MARKER: &str = "##[section]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Section,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLogLine {
    pub line_number: usize,
    pub text: String,
    pub severity: LogSeverity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildJobLog {
    pub build_id: BuildId,
    pub job_name: String,
    pub lines: Vec<BuildLogLine>,
}

impl BuildJobLog {
    fn push(&mut self, text: String, severity: LogSeverity) {
        self.lines.push(BuildLogLine {
            line_number: self.lines.len() + 1,
            text,
            severity,
        });
    }
}

/// Classifies a raw log line by its logging-command marker and strips the
/// markers.
pub fn classify_line(line: &str) -> (LogSeverity, String) {
    let severity = if line.contains(ERROR_MARKER) {
        LogSeverity::Error
    } else if line.contains(WARNING_MARKER) {
        LogSeverity::Warning
    } else if line.contains(SECTION_MARKER) {
        LogSeverity::Section
    } else {
        LogSeverity::Info
    };

    let text = line
        .replace(ERROR_MARKER, "")
        .replace(WARNING_MARKER, "")
        .replace(SECTION_MARKER, "");
    (severity, text.trim_start().to_string())
}

/// Concatenated task logs of one job, each task under its own header line.
pub async fn job_logs(api: &dyn DevOpsApi, build_id: BuildId, job_id: &str) -> Result<BuildJobLog> {
    let records = api.timeline(build_id).await?;
    if records.is_empty() {
        return Err(PipelensError::TimelineUnavailable(build_id));
    }

    let job = records
        .iter()
        .find(|r| r.record_type == RecordType::Job && r.id == job_id)
        .ok_or_else(|| PipelensError::JobNotFound(job_id.to_string()))?;

    let mut tasks: Vec<&TimelineRecord> = records
        .iter()
        .filter(|r| r.parent_id.as_deref() == Some(job.id.as_str()))
        .filter(|r| r.log.as_ref().is_some_and(|log| log.id.is_some()))
        .collect();
    tasks.sort_by_key(|r| r.order.unwrap_or_default());

    let mut log = BuildJobLog {
        build_id,
        job_name: job.name.clone().unwrap_or_default(),
        lines: Vec::new(),
    };

    for task in tasks {
        let Some(log_id) = task.log.as_ref().and_then(|l| l.id) else {
            continue;
        };
        let task_name = task.name.as_deref().unwrap_or_default();

        match api.log_lines(build_id, log_id).await {
            Ok(lines) => {
                log.push(format!("══════ {task_name} ══════"), LogSeverity::Section);
                for line in lines {
                    let (severity, text) = classify_line(&line);
                    log.push(text, severity);
                }
            }
            Err(e) => {
                debug!("Log {log_id} of build {build_id} unavailable: {e}");
                log.push(
                    format!("(Could not load logs for {task_name})"),
                    LogSeverity::Warning,
                );
            }
        }
    }

    Ok(log)
}
