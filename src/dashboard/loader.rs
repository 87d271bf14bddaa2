use std::sync::Arc;

use log::{debug, info, warn};

use super::enricher::{DashboardContext, DashboardEnricher};
use super::types::{PipelineDashboardResponse, PipelineListItem};
use super::variable_groups::VariableGroupIndex;
use crate::error::Result;
use crate::hub::{HubPayload, HubUpdate, PushHub, Target, UpdateType};
use crate::providers::{DevOpsApi, DevOpsLinks};
use crate::yaml::PipelineSettingsParser;

/// Loads the pipeline dashboard progressively.
///
/// When a connection id is given, the caller sees a skeleton of every row
/// first, then batches of enriched rows, then a completion event.
pub struct DashboardLoader {
    api: Arc<dyn DevOpsApi>,
    hub: Arc<dyn PushHub>,
    parser: Box<dyn PipelineSettingsParser>,
    web_root: String,
    batch_size: usize,
}

impl DashboardLoader {
    pub fn new(
        api: Arc<dyn DevOpsApi>,
        hub: Arc<dyn PushHub>,
        parser: Box<dyn PipelineSettingsParser>,
        web_root: &str,
        batch_size: usize,
    ) -> Self {
        Self {
            api,
            hub,
            parser,
            web_root: web_root.to_string(),
            batch_size: batch_size.max(1),
        }
    }

    pub async fn load(&self, connection_id: Option<&str>) -> PipelineDashboardResponse {
        match self.try_load(connection_id).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Dashboard load failed: {e}");
                PipelineDashboardResponse::failed(format!("Error loading pipeline dashboard: {e}"))
            }
        }
    }

    async fn try_load(&self, connection_id: Option<&str>) -> Result<PipelineDashboardResponse> {
        self.notify(
            connection_id,
            HubUpdate::new(
                UpdateType::DashboardPipelinesSkeleton,
                "Connecting to Azure DevOps...",
                HubPayload::Pipelines(Vec::new()),
            ),
        )
        .await?;

        let project = self.api.project().await?;
        let links = DevOpsLinks::new(
            &self.web_root,
            self.api.organization(),
            &project.name,
            project.web_url.as_deref(),
        );

        self.notify(connection_id, HubUpdate::status("Fetching pipeline list..."))
            .await?;
        let definitions = self.api.definitions().await?;
        let mut rows: Vec<PipelineListItem> = definitions
            .iter()
            .map(|definition| PipelineListItem::skeleton(definition, &links))
            .collect();
        let total = rows.len();
        info!("Found {total} pipelines in {}", project.name);

        self.notify(
            connection_id,
            HubUpdate::new(
                UpdateType::DashboardPipelinesSkeleton,
                format!("Found {total} pipelines"),
                HubPayload::Pipelines(rows.clone()),
            ),
        )
        .await?;

        let variable_groups = match self.api.variable_groups().await {
            Ok(groups) => groups
                .into_iter()
                .map(|mut group| {
                    group.resource_url = Some(links.variable_group(group.id));
                    group
                })
                .collect(),
            Err(e) => {
                debug!("Continuing without variable groups: {e}");
                Vec::new()
            }
        };

        let context = DashboardContext {
            project,
            links,
            variable_groups: VariableGroupIndex::new(variable_groups.clone()),
        };
        let enricher = DashboardEnricher::new(self.api.as_ref(), self.parser.as_ref(), &context);

        let mut batch_start = 0;
        for index in 0..total {
            self.notify(
                connection_id,
                HubUpdate::status(format!("Loading {}...", rows[index].name)),
            )
            .await?;

            enricher.enrich(&mut rows[index]).await;

            let loaded = index + 1;
            if loaded - batch_start == self.batch_size || loaded == total {
                let batch = rows[batch_start..loaded].to_vec();
                let names: Vec<&str> = batch.iter().map(|row| row.name.as_str()).collect();
                let message = format!("Loaded {loaded} of {total} pipelines|{}", names.join(", "));
                self.notify(
                    connection_id,
                    HubUpdate::new(
                        UpdateType::DashboardPipelineBatch,
                        message,
                        HubPayload::Pipelines(batch),
                    ),
                )
                .await?;
                batch_start = loaded;
            }
        }

        self.notify(
            connection_id,
            HubUpdate::new(
                UpdateType::DashboardLoadComplete,
                format!("Loaded {total} pipelines"),
                HubPayload::Empty,
            ),
        )
        .await?;

        Ok(PipelineDashboardResponse {
            success: true,
            error_message: None,
            pipelines: rows,
            available_variable_groups: variable_groups,
            total_count: total,
        })
    }

    async fn notify(&self, connection_id: Option<&str>, update: HubUpdate) -> Result<()> {
        match connection_id {
            Some(id) => self.hub.send(Target::connection(id), update).await,
            None => Ok(()),
        }
    }
}
