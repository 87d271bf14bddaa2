use console::style;
use pipelens::providers::types::{BuildResult, BuildStatus, TaskResult, TimelineState};

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// One-word run state: the result once completed, the status before that.
pub fn run_label(status: Option<BuildStatus>, result: Option<BuildResult>) -> String {
    match (status, result) {
        (Some(BuildStatus::Completed), Some(result)) => result.to_string(),
        (Some(status), _) => status.to_string(),
        (None, _) => "Never run".to_string(),
    }
}

pub fn stage_symbol(state: TimelineState, result: Option<TaskResult>) -> &'static str {
    match (state, result) {
        (TimelineState::InProgress, _) => "◐",
        (TimelineState::Completed, Some(TaskResult::Succeeded)) => "●",
        (TimelineState::Completed, Some(TaskResult::SucceededWithIssues)) => "◒",
        (TimelineState::Completed, Some(TaskResult::Failed)) => "✗",
        (TimelineState::Completed, Some(TaskResult::Skipped)) => "⊘",
        (TimelineState::Completed, _) => "■",
        _ => "○",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_label_prefers_result_when_completed() {
        assert_eq!(
            run_label(Some(BuildStatus::Completed), Some(BuildResult::Failed)),
            "Failed"
        );
        assert_eq!(run_label(Some(BuildStatus::InProgress), None), "InProgress");
        assert_eq!(run_label(None, None), "Never run");
    }

    #[test]
    fn test_stage_symbol() {
        assert_eq!(stage_symbol(TimelineState::Pending, None), "○");
        assert_eq!(
            stage_symbol(TimelineState::Completed, Some(TaskResult::Failed)),
            "✗"
        );
        assert_eq!(stage_symbol(TimelineState::InProgress, None), "◐");
    }
}
