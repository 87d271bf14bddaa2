use chrono::{DateTime, Utc};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};
use pipelens::dashboard::RunOutcome;
use pipelens::providers::types::{BuildResult, BuildStatus};

use super::styling::run_label;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn color_coded_success_cell(rate: u32) -> Cell {
    let text = format!("{rate}%");
    if rate >= 80 {
        Cell::new(text).fg(TableColor::Green)
    } else if rate >= 50 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn run_cell(status: Option<BuildStatus>, result: Option<BuildResult>) -> Cell {
    let color = match (status, result) {
        (Some(BuildStatus::Completed), Some(BuildResult::Succeeded)) => TableColor::Green,
        (Some(BuildStatus::Completed), Some(BuildResult::PartiallySucceeded)) => TableColor::Yellow,
        (Some(BuildStatus::Completed), Some(BuildResult::Failed)) => TableColor::Red,
        (Some(status), _) if status.is_running() => TableColor::Blue,
        _ => TableColor::DarkGrey,
    };
    Cell::new(run_label(status, result)).fg(color)
}

pub fn streak_cell(streak: i32) -> Cell {
    match streak {
        0 => Cell::new("-").fg(TableColor::DarkGrey),
        s if s > 0 => Cell::new(format!("+{s}")).fg(TableColor::Green),
        s => Cell::new(s).fg(TableColor::Red),
    }
}

pub fn duration_cell(seconds: Option<i64>) -> Cell {
    match seconds {
        Some(seconds) => {
            let text = if seconds >= 60 {
                format!("{}m {:02}s", seconds / 60, seconds % 60)
            } else {
                format!("{seconds}s")
            };
            Cell::new(text)
        }
        None => Cell::new("-").fg(TableColor::DarkGrey),
    }
}

pub fn time_cell(time: Option<DateTime<Utc>>) -> Cell {
    time.map_or_else(
        || Cell::new("-").fg(TableColor::DarkGrey),
        |t| Cell::new(t.format("%Y-%m-%d %H:%M")),
    )
}

pub fn outcome_sparkline(outcomes: &[RunOutcome]) -> String {
    outcomes
        .iter()
        .map(|outcome| match outcome {
            RunOutcome::Succeeded => '●',
            RunOutcome::Failed => '✗',
            RunOutcome::PartiallySucceeded => '◒',
            RunOutcome::InProgress => '◐',
            _ => '○',
        })
        .collect()
}
