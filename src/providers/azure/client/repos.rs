use super::core::AzureDevOpsClient;
use crate::error::{PipelensError, Result};
use crate::providers::types::{GitItem, ListResponse, Project, VariableGroup};

impl AzureDevOpsClient {
    pub async fn fetch_project(&self) -> Result<Project> {
        let url = self.org_api_url(
            &format!("projects/{}", urlencoding::encode(&self.project)),
            &[],
        )?;
        self.get_json_optional(url)
            .await?
            .ok_or_else(|| PipelensError::ProjectNotFound(self.project.clone()))
    }

    /// Variable groups of the project with secret values masked.
    pub async fn fetch_variable_groups(&self) -> Result<Vec<VariableGroup>> {
        let url = self.api_url("distributedtask/variablegroups", &[])?;
        let response: ListResponse<VariableGroup> = self.get_json(url).await?;
        Ok(response
            .value
            .into_iter()
            .map(VariableGroup::mask_secrets)
            .collect())
    }

    pub async fn fetch_file_content(
        &self,
        repository_id: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>> {
        let url = self.api_url(
            &format!(
                "git/repositories/{}/items",
                urlencoding::encode(repository_id)
            ),
            &[
                ("path", path.to_string()),
                ("includeContent", "true".to_string()),
                ("$format", "json".to_string()),
                ("versionDescriptor.version", branch.to_string()),
                ("versionDescriptor.versionType", "branch".to_string()),
            ],
        )?;
        let item: Option<GitItem> = self.get_json_optional(url).await?;
        Ok(item
            .and_then(|i| i.content)
            .filter(|content| !content.trim().is_empty()))
    }
}
