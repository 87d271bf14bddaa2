mod progress;
mod styling;
mod tables;
mod views;

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

pub use progress::LoadProgress;
use styling::{dim, magenta_bold};
pub use views::{
    print_dashboard, print_health, print_live_update, print_logs, print_parsed_settings,
    print_runs, print_timeline,
};

/// Prints the `pipelens` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔭 pipelens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Pipeline health for Azure DevOps")
    );
}

/// Serializes `value` as JSON to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, pretty: bool, path: Option<&Path>) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            info!("Output written to: {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
