use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use pipelens::hub::{HubUpdate, UpdateType};

use super::styling::{bright, bright_green, bright_yellow, dim};

/// Spinner that follows the events of a progressive dashboard load.
pub struct LoadProgress {
    pb: ProgressBar,
}

impl LoadProgress {
    pub fn start() -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Dashboard").underlined());
        let pb = create_spinner(bright_yellow("Starting").to_string());
        Self { pb }
    }

    pub fn update(&self, update: &HubUpdate) {
        match update.update_type {
            UpdateType::DashboardPipelineBatch => {
                let (progress, names) = split_batch_message(&update.message);
                self.pb.println(format!("  {} {}", bright_green("✓"), dim(names)));
                self.pb.set_message(bright_yellow(progress).to_string());
            }
            UpdateType::DashboardLoadComplete => {
                self.pb
                    .finish_with_message(bright_green(format!("{} ✓", update.message)).to_string());
            }
            _ => self.pb.set_message(bright_yellow(&update.message).to_string()),
        }
    }

    pub fn finish(self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
        eprintln!();
    }
}

/// Splits `"Loaded 3 of 9 pipelines|a, b, c"` into its two halves.
fn split_batch_message(message: &str) -> (&str, &str) {
    message.split_once('|').unwrap_or((message, ""))
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
