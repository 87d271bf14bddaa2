use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use pipelens::config::{
    Config, ConnectionProvider, ConnectionSettings, EnvConnection, OutputFormat, ParserKind,
    StaticConnection,
};
use pipelens::dashboard::{build_timeline, job_logs, org_health, pipeline_runs, DashboardLoader};
use pipelens::hub::{BroadcastHub, HubPayload, Subscription, UpdateType, MONITOR_GROUP};
use pipelens::monitor::{MemoryStatusCache, PipelineMonitor};
use pipelens::providers::{AzureClientFactory, ClientFactory, DevOpsApi};
use pipelens::yaml::parser_for;

use crate::output::{self, LoadProgress};

#[derive(Parser)]
#[command(name = "pipelens")]
#[command(author, version, about = "Pipeline health for Azure DevOps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./pipelens.toml and friends)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Personal access token
    #[arg(short, long, global = true, env = "AZURE_DEVOPS_PAT", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, global = true, env = "AZURE_DEVOPS_ORG")]
    org: Option<String>,

    #[arg(short = 'P', long, global = true, env = "AZURE_DEVOPS_PROJECT")]
    project: Option<String>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Write JSON to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream pipeline status changes until interrupted
    Watch {
        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,

        /// Seconds to wait before the first poll
        #[arg(long)]
        warmup: Option<u64>,
    },

    /// Load the enriched pipeline dashboard
    Dashboard {
        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(long, value_enum)]
        parser: Option<ParserKind>,
    },

    /// Stages and jobs of one build
    Timeline { build_id: u64 },

    /// Task logs of one job in a build
    Logs { build_id: u64, job_id: String },

    /// Recent runs of one pipeline
    Runs {
        pipeline_id: u32,

        #[arg(short = 'n', long)]
        top: Option<usize>,
    },

    /// Success rates and streaks across all pipelines
    Health {
        /// Builds to analyze per pipeline
        #[arg(long)]
        builds: Option<usize>,
    },

    /// Extract deployment settings from a pipeline YAML file
    ParseYaml {
        file: PathBuf,

        #[arg(long, value_enum)]
        parser: Option<ParserKind>,

        #[arg(long)]
        pipeline_id: Option<u32>,

        #[arg(long)]
        name: Option<String>,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        self.apply_overrides(&mut config);

        match &self.command {
            Commands::Watch { interval, warmup } => {
                if let Some(secs) = interval {
                    config.monitor.poll_interval_secs = *secs;
                }
                if let Some(secs) = warmup {
                    config.monitor.warmup_secs = *secs;
                }
                self.execute_watch(&config).await
            }
            Commands::Dashboard { batch_size, parser } => {
                if let Some(size) = batch_size {
                    config.dashboard.batch_size = *size;
                }
                if let Some(parser) = parser {
                    config.dashboard.parser = *parser;
                }
                self.execute_dashboard(&config).await
            }
            Commands::Timeline { build_id } => {
                let api = connect(&config)?;
                let timeline = build_timeline(api.as_ref(), *build_id)
                    .await
                    .context("Error loading build timeline")?;
                self.emit(&config, &timeline, output::print_timeline)
            }
            Commands::Logs { build_id, job_id } => {
                let api = connect(&config)?;
                let log = job_logs(api.as_ref(), *build_id, job_id)
                    .await
                    .context("Error loading build logs")?;
                self.emit(&config, &log, output::print_logs)
            }
            Commands::Runs { pipeline_id, top } => {
                let api = connect(&config)?;
                let runs = pipeline_runs(api.as_ref(), *pipeline_id, top.unwrap_or(config.dashboard.runs))
                    .await
                    .context("Error loading pipeline runs")?;
                self.emit(&config, &runs, |runs| output::print_runs(runs))
            }
            Commands::Health { builds } => {
                let api = connect(&config)?;
                let health = org_health(
                    api.as_ref(),
                    builds.unwrap_or(config.dashboard.health_builds),
                    config.monitor.max_concurrent_requests,
                )
                .await
                .context("Error loading org health")?;
                self.emit(&config, &health, output::print_health)
            }
            Commands::ParseYaml {
                file,
                parser,
                pipeline_id,
                name,
            } => {
                let text = std::fs::read_to_string(file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let parser = parser_for(parser.unwrap_or(config.dashboard.parser));
                let settings = parser.parse(&text, *pipeline_id, name.as_deref());
                self.emit(&config, &settings, output::print_parsed_settings)
            }
        }
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(token) = &self.token {
            config.devops.token = Some(token.clone());
        }
        if let Some(org) = &self.org {
            config.devops.organization = Some(org.clone());
        }
        if let Some(project) = &self.project {
            config.devops.project = Some(project.clone());
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.pretty {
            config.output.pretty = true;
        }
    }

    fn emit<T: Serialize>(&self, config: &Config, value: &T, print_table: impl FnOnce(&T)) -> Result<()> {
        if config.output.format == OutputFormat::Json || self.output.is_some() {
            output::write_json(value, config.output.pretty, self.output.as_deref())
        } else {
            print_table(value);
            Ok(())
        }
    }

    async fn execute_watch(&self, config: &Config) -> Result<()> {
        let configured = StaticConnection::from(&config.devops);
        let connection: Arc<dyn ConnectionProvider> = if configured.connection().is_some() {
            Arc::new(configured)
        } else {
            warn!("No Azure DevOps connection configured; waiting for AZURE_DEVOPS_* variables");
            Arc::new(EnvConnection)
        };

        let hub = Arc::new(BroadcastHub::default());
        let mut subscription = hub.subscribe(&[MONITOR_GROUP]);
        let monitor = PipelineMonitor::new(
            hub.clone(),
            connection,
            Arc::new(AzureClientFactory::new(config.devops.base_url.clone())),
            Arc::new(MemoryStatusCache::new()),
            config.monitor.clone(),
        );

        info!("Watching pipelines, press Ctrl-C to stop");
        let shutdown = CancellationToken::new();
        let ((), followed) = tokio::join!(
            monitor.run(shutdown.clone()),
            self.follow_monitor(config, &mut subscription, &shutdown)
        );
        followed
    }

    async fn follow_monitor(
        &self,
        config: &Config,
        subscription: &mut Subscription,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Stopping monitor");
                    shutdown.cancel();
                    return Ok(());
                }
                update = subscription.recv() => {
                    let Some(update) = update else {
                        shutdown.cancel();
                        return Ok(());
                    };
                    if let HubPayload::LiveStatus(live) = &update.payload {
                        if let Err(e) = self.emit(config, live, output::print_live_update) {
                            shutdown.cancel();
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn execute_dashboard(&self, config: &Config) -> Result<()> {
        let api = connect(config)?;
        let hub = Arc::new(BroadcastHub::default());
        let mut subscription = hub.subscribe(&[]);
        let connection_id = subscription.id().to_string();

        let loader = DashboardLoader::new(
            api,
            hub.clone(),
            parser_for(config.dashboard.parser),
            &config.devops.base_url,
            config.dashboard.batch_size,
        );

        let progress = LoadProgress::start();
        let loaded = CancellationToken::new();
        let load = async {
            let response = loader.load(Some(connection_id.as_str())).await;
            loaded.cancel();
            response
        };
        let follow = async {
            loop {
                tokio::select! {
                    biased;
                    update = subscription.recv() => match update {
                        Some(update) => {
                            progress.update(&update);
                            if update.update_type == UpdateType::DashboardLoadComplete {
                                break;
                            }
                        }
                        None => break,
                    },
                    () = loaded.cancelled() => break,
                }
            }
        };
        let (response, ()) = tokio::join!(load, follow);
        progress.finish();

        self.emit(config, &response, output::print_dashboard)
    }
}

fn connect(config: &Config) -> Result<Arc<dyn DevOpsApi>> {
    let settings = ConnectionSettings::from_parts(
        config.devops.token.as_deref(),
        config.devops.organization.as_deref(),
        config.devops.project.as_deref(),
    )
    .context(
        "Azure DevOps connection not configured: pass --token, --org and --project \
         or set AZURE_DEVOPS_PAT, AZURE_DEVOPS_ORG and AZURE_DEVOPS_PROJECT",
    )?;

    let api = AzureClientFactory::new(config.devops.base_url.clone()).connect(&settings)?;
    Ok(api)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_global_flags_override_config() {
        let cli = parse(&[
            "pipelens",
            "health",
            "--token",
            "pat",
            "--org",
            "contoso",
            "-P",
            "web",
            "--format",
            "json",
            "--pretty",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.devops.token.as_deref(), Some("pat"));
        assert_eq!(config.devops.organization.as_deref(), Some("contoso"));
        assert_eq!(config.devops.project.as_deref(), Some("web"));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
        assert!(connect(&config).is_ok());
    }

    #[test]
    fn test_subcommand_arguments() {
        let cli = parse(&["pipelens", "logs", "812", "job-1"]);
        assert!(matches!(
            cli.command,
            Commands::Logs { build_id: 812, ref job_id } if job_id == "job-1"
        ));

        let cli = parse(&["pipelens", "parse-yaml", "azure-pipelines.yml", "--parser", "structural"]);
        assert!(matches!(
            cli.command,
            Commands::ParseYaml {
                parser: Some(ParserKind::Structural),
                ..
            }
        ));

        let cli = parse(&["pipelens", "runs", "7", "-n", "3"]);
        assert!(matches!(
            cli.command,
            Commands::Runs {
                pipeline_id: 7,
                top: Some(3)
            }
        ));
    }

    #[test]
    fn test_connect_requires_all_settings() {
        let mut config = Config::default();
        config.devops.token = Some("pat".to_string());
        config.devops.organization = Some("contoso".to_string());
        assert!(connect(&config).is_err());
    }
}
