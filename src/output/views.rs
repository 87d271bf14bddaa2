use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};
use pipelens::dashboard::{
    BuildJobLog, BuildTimeline, LogSeverity, OrgHealth, PipelineDashboardResponse,
    PipelineRunInfo,
};
use pipelens::monitor::{PipelineLiveUpdate, StageBubble};
use pipelens::providers::short_branch;
use pipelens::yaml::ParsedPipelineSettings;

use super::styling::{
    bright, bright_green, bright_red, bright_yellow, cyan, dim, run_label, stage_symbol,
};
use super::tables::{
    color_coded_success_cell, create_table, cyan_header, duration_cell, outcome_sparkline,
    run_cell, streak_cell, time_cell,
};

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn stage_strip(stages: &[StageBubble]) -> String {
    stages
        .iter()
        .map(|s| format!("{} {}", stage_symbol(s.state, s.result), s.name))
        .collect::<Vec<_>>()
        .join("  ")
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

pub fn print_dashboard(response: &PipelineDashboardResponse) {
    println!("{}", render_dashboard(response));
}

pub fn print_live_update(update: &PipelineLiveUpdate) {
    println!("{}", render_live_update(update));
}

pub fn print_timeline(timeline: &BuildTimeline) {
    println!("{}", render_timeline(timeline));
}

pub fn print_logs(log: &BuildJobLog) {
    println!("{}", render_logs(log));
}

pub fn print_runs(runs: &[PipelineRunInfo]) {
    println!("{}", render_runs(runs));
}

pub fn print_health(health: &OrgHealth) {
    println!("{}", render_health(health));
}

pub fn print_parsed_settings(settings: &ParsedPipelineSettings) {
    println!("{}", render_parsed_settings(settings));
}

#[allow(clippy::format_push_string)]
fn render_dashboard(response: &PipelineDashboardResponse) -> String {
    let mut output = String::new();

    if !response.success {
        output.push_str(&format!(
            "{}\n",
            bright_red(response.error_message.as_deref().unwrap_or("Dashboard load failed"))
        ));
        return output;
    }

    add_section_header(&mut output, "📊", "Overview");
    let running = response
        .pipelines
        .iter()
        .filter(|p| p.last_run_status.is_some_and(|s| s.is_running()))
        .count();
    output.push_str(&format!(
        "  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Pipelines:"),
        bright_yellow(response.total_count),
        dim("Running now:"),
        bright_yellow(running),
        dim("Variable groups:"),
        bright_yellow(response.available_variable_groups.len()),
    ));

    if response.pipelines.is_empty() {
        output.push_str(&format!("{}\n", bright_yellow("No pipelines found.")));
        return output;
    }

    add_section_header(&mut output, "🚀", "Pipelines");
    let mut table = create_table();
    table.set_header(cyan_header(&[
        "Pipeline",
        "Last Run",
        "Branch",
        "Trigger",
        "Duration",
        "Stages",
        "Variable Groups",
    ]));

    for item in &response.pipelines {
        let trigger = match (&item.trigger_display_text, &item.triggered_by_user) {
            (Some(text), Some(user)) => format!("{text}\n{user}"),
            (Some(text), None) => text.clone(),
            _ => "-".to_string(),
        };
        let groups = item
            .variable_groups
            .iter()
            .map(|g| match &g.environment {
                Some(env) => format!("{env}: {}", g.name),
                None => g.name.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n");

        table.add_row(vec![
            Cell::new(format!(
                "{}\n{}",
                item.name,
                or_dash(item.last_run_build_number.as_deref())
            )),
            run_cell(item.last_run_status, item.last_run_result),
            Cell::new(or_dash(item.trigger_branch.as_deref().map(short_branch))),
            Cell::new(trigger),
            duration_cell(item.duration_seconds),
            Cell::new(stage_strip(&item.stages)),
            Cell::new(if groups.is_empty() { "-".to_string() } else { groups }),
        ]);
    }

    output.push_str(&format!("{table}\n"));
    output
}

#[allow(clippy::format_push_string)]
fn render_live_update(update: &PipelineLiveUpdate) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} {} {}",
        dim(update.timestamp.format("%H:%M:%S")),
        if update.changed_pipelines.is_empty() {
            dim(&update.message)
        } else {
            bright_green(&update.message)
        },
        dim(format!("({} running)", update.running_count)),
    );

    if update.changed_pipelines.is_empty() {
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&["Pipeline", "Run", "Build", "Branch", "Triggered By", "Stages"]));
    for snapshot in &update.changed_pipelines {
        table.add_row(vec![
            Cell::new(&snapshot.name),
            run_cell(snapshot.last_run_status, snapshot.last_run_result),
            Cell::new(or_dash(snapshot.last_run_build_number.as_deref())),
            Cell::new(or_dash(snapshot.trigger_branch.as_deref().map(short_branch))),
            Cell::new(or_dash(snapshot.triggered_by_user.as_deref())),
            Cell::new(stage_strip(&snapshot.stages)),
        ]);
    }
    output.push_str(&format!("{table}\n"));
    output
}

#[allow(clippy::format_push_string)]
fn render_timeline(timeline: &BuildTimeline) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🧭", "Build Timeline");
    output.push_str(&format!(
        "  {} {}\n  {} {}\n\n",
        dim("Build:"),
        cyan(timeline.build_number.as_deref().unwrap_or("-")),
        dim("State:"),
        bright_yellow(run_label(Some(timeline.status), timeline.result)),
    ));

    if timeline.stages.is_empty() {
        output.push_str(&format!("{}\n", bright_yellow("No stages recorded.")));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&["Col", "Stage", "Job", "Tasks", "Started"]));
    let mut stages: Vec<_> = timeline.stages.iter().collect();
    stages.sort_by_key(|s| (s.column, s.order));

    for stage in stages {
        let stage_cell = format!("{} {}", stage_symbol(stage.state, stage.result), stage.name);
        if stage.jobs.is_empty() {
            table.add_row(vec![
                Cell::new(stage.column),
                Cell::new(stage_cell),
                Cell::new("-").fg(TableColor::DarkGrey),
                Cell::new("-").fg(TableColor::DarkGrey),
                time_cell(stage.start_time),
            ]);
            continue;
        }
        for (i, job) in stage.jobs.iter().enumerate() {
            let (column, name) = if i == 0 {
                (Cell::new(stage.column), Cell::new(&stage_cell))
            } else {
                (Cell::new(""), Cell::new(""))
            };
            table.add_row(vec![
                column,
                name,
                Cell::new(format!("{} {}", stage_symbol(job.state, job.result), job.name)),
                Cell::new(format!("{}/{}", job.tasks_completed, job.task_count)),
                time_cell(job.start_time),
            ]);
        }
    }

    output.push_str(&format!("{table}\n"));
    output
}

fn render_logs(log: &BuildJobLog) -> String {
    let mut output = String::new();
    add_section_header(&mut output, "📜", &format!("{} (build {})", log.job_name, log.build_id));

    let width = log.lines.len().to_string().len();
    for line in &log.lines {
        let number = dim(format!("{:>width$}", line.line_number));
        let text = match line.severity {
            LogSeverity::Error => bright_red(&line.text).to_string(),
            LogSeverity::Warning => bright_yellow(&line.text).to_string(),
            LogSeverity::Section => cyan(&line.text).to_string(),
            LogSeverity::Info => line.text.clone(),
        };
        let _ = writeln!(output, "{number} {text}");
    }
    output
}

#[allow(clippy::format_push_string)]
fn render_runs(runs: &[PipelineRunInfo]) -> String {
    let mut output = String::new();
    add_section_header(&mut output, "🕘", "Recent Runs");

    if runs.is_empty() {
        output.push_str(&format!("{}\n", bright_yellow("No runs found.")));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&[
        "Run", "Result", "Branch", "Trigger", "Started", "Duration", "Link",
    ]));
    for run in runs {
        let duration = match (run.start_time, run.finish_time) {
            (Some(start), Some(finish)) => Some((finish - start).num_seconds()),
            _ => None,
        };
        table.add_row(vec![
            Cell::new(format!(
                "{}\n{}",
                run.run_id,
                or_dash(run.build_number.as_deref())
            )),
            run_cell(Some(run.status), run.result),
            Cell::new(or_dash(run.source_branch.as_deref().map(short_branch))),
            Cell::new(&run.trigger.trigger_display_text),
            time_cell(run.start_time),
            duration_cell(duration),
            Cell::new(or_dash(run.resource_url.as_deref())),
        ]);
    }

    output.push_str(&format!("{table}\n"));
    output
}

#[allow(clippy::format_push_string)]
fn render_health(health: &OrgHealth) -> String {
    let mut output = String::new();
    let summary = &health.summary;

    add_section_header(&mut output, "🩺", "Project Health");
    let overall = summary.overall_health_percent;
    let overall_display = if overall >= 80 {
        bright_green(format!("{overall}%"))
    } else if overall >= 50 {
        bright_yellow(format!("{overall}%"))
    } else {
        bright_red(format!("{overall}%"))
    };
    output.push_str(&format!(
        "  {} {}\n  {} {} / {} / {}\n  {} {} ({} succeeded, {} failed)\n\n",
        dim("Overall health:"),
        overall_display,
        dim("Healthy / unstable / failing:"),
        bright_green(summary.healthy_pipelines),
        bright_yellow(summary.unstable_pipelines),
        bright_red(summary.failing_pipelines),
        dim("Builds analyzed:"),
        bright_yellow(summary.total_builds_analyzed),
        summary.total_succeeded,
        summary.total_failed,
    ));

    if health.pipelines.is_empty() {
        output.push_str(&format!("{}\n", bright_yellow("No pipelines found.")));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&["Pipeline", "Success", "Streak", "Recent"]));
    for trend in &health.pipelines {
        table.add_row(vec![
            Cell::new(&trend.name),
            color_coded_success_cell(trend.success_rate),
            streak_cell(trend.streak),
            Cell::new(outcome_sparkline(&trend.recent_results)),
        ]);
    }

    output.push_str(&format!("{table}\n"));
    output
}

#[allow(clippy::format_push_string)]
fn render_parsed_settings(settings: &ParsedPipelineSettings) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🧩", "Pipeline Settings");
    output.push_str(&format!(
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Code project:"),
        cyan(or_dash(settings.code_project_name.as_deref())),
        dim("Code repository:"),
        cyan(or_dash(settings.code_repo_name.as_deref())),
        dim("Code branch:"),
        cyan(or_dash(settings.code_branch.as_deref())),
        dim("Project file:"),
        cyan(or_dash(settings.csproj_path.as_deref())),
        dim("Generated:"),
        if settings.is_generated { bright_green("yes") } else { dim("no") },
    ));

    if settings.environments.is_empty() {
        output.push_str(&format!("{}\n", bright_yellow("No environment settings found.")));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&[
        "Environment",
        "Variable Group",
        "Website",
        "Virtual Path",
        "App Pool",
        "Deployment",
        "Confidence",
    ]));
    for env in &settings.environments {
        table.add_row(vec![
            Cell::new(&env.environment_name),
            Cell::new(or_dash(env.variable_group_name.as_deref())),
            Cell::new(or_dash(env.website_name.as_deref())),
            Cell::new(or_dash(env.virtual_path.as_deref())),
            Cell::new(or_dash(env.app_pool_name.as_deref())),
            Cell::new(or_dash(env.iis_deployment_type.as_deref())),
            Cell::new(format!("{:?}", env.confidence)),
        ]);
    }

    output.push_str(&format!("{table}\n"));
    output
}
