use urlencoding::encode;

/// Strips the `refs/heads/` prefix the platform puts on branch names.
pub fn short_branch(branch: &str) -> &str {
    branch.strip_prefix("refs/heads/").unwrap_or(branch)
}

/// Builds clickable web URLs for one organization and project.
///
/// `project_url` is the project's own web link when the API provided one;
/// variable-group library links hang off it.
#[derive(Debug, Clone)]
pub struct DevOpsLinks {
    org_root: String,
    base_url: String,
    project_url: String,
}

impl DevOpsLinks {
    /// # Arguments
    ///
    /// * `web_root` - Service root, e.g. <https://dev.azure.com>
    /// * `organization` - Organization name
    /// * `project_name` - Project display name
    /// * `project_web_url` - Web link reported by the project resource, if any
    pub fn new(
        web_root: &str,
        organization: &str,
        project_name: &str,
        project_web_url: Option<&str>,
    ) -> Self {
        let org_root = format!("{}/{}", web_root.trim_end_matches('/'), encode(organization));
        let base_url = format!("{org_root}/{}", encode(project_name));
        let project_url = project_web_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| base_url.clone());

        Self {
            org_root,
            base_url,
            project_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn project_url(&self) -> &str {
        &self.project_url
    }

    pub fn pipeline_runs(&self, definition_id: u32) -> String {
        format!("{}/_build?definitionId={definition_id}", self.base_url)
    }

    /// Relative link into the pipeline wizard's import flow.
    pub fn edit_wizard(definition_id: u32) -> String {
        format!("Wizard?import={definition_id}")
    }

    pub fn repository(&self, repo_name: &str) -> String {
        format!("{}/_git/{}", self.base_url, encode(repo_name))
    }

    pub fn commit(&self, repo_name: &str, commit_id: &str) -> String {
        format!("{}/commit/{commit_id}", self.repository(repo_name))
    }

    pub fn build_results(&self, build_id: u64) -> String {
        format!("{}/_build/results?buildId={build_id}&view=results", self.base_url)
    }

    pub fn build_logs(&self, build_id: u64) -> String {
        format!("{}/_build/results?buildId={build_id}&view=logs", self.base_url)
    }

    pub fn pipeline_config(&self, definition_id: u32, branch: &str) -> String {
        format!(
            "{}/_apps/hub/ms.vss-build-web.ci-designer-hub?pipelineId={definition_id}&branch={}",
            self.base_url,
            encode(branch)
        )
    }

    /// Repository in a possibly different project of the same organization.
    pub fn code_repo(&self, project_name: &str, repo_name: &str) -> String {
        format!(
            "{}/{}/_git/{}",
            self.org_root,
            encode(project_name),
            encode(repo_name)
        )
    }

    pub fn code_branch(&self, project_name: &str, repo_name: &str, branch: &str) -> String {
        format!(
            "{}?version=GB{}",
            self.code_repo(project_name, repo_name),
            encode(branch)
        )
    }

    pub fn code_commit(&self, project_name: &str, repo_name: &str, commit_id: &str) -> String {
        format!(
            "{}/commit/{commit_id}",
            self.code_repo(project_name, repo_name)
        )
    }

    pub fn variable_group(&self, group_id: u32) -> String {
        format!(
            "{}/_library?itemType=VariableGroups&view=VariableGroupView&variableGroupId={group_id}",
            self.project_url
        )
    }

    /// Library landing page, used when no specific group could be matched.
    pub fn library(&self) -> String {
        format!("{}/_library?itemType=VariableGroups", self.project_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> DevOpsLinks {
        DevOpsLinks::new("https://dev.azure.com/", "contoso", "Web Apps", None)
    }

    #[test]
    fn test_short_branch() {
        assert_eq!(short_branch("refs/heads/release/1.2"), "release/1.2");
        assert_eq!(short_branch("main"), "main");
    }

    #[test]
    fn test_base_url_escapes_project() {
        assert_eq!(links().base_url(), "https://dev.azure.com/contoso/Web%20Apps");
        assert_eq!(links().project_url(), links().base_url());
    }

    #[test]
    fn test_build_links() {
        let links = links();
        assert_eq!(
            links.build_results(42),
            "https://dev.azure.com/contoso/Web%20Apps/_build/results?buildId=42&view=results"
        );
        assert_eq!(
            links.build_logs(42),
            "https://dev.azure.com/contoso/Web%20Apps/_build/results?buildId=42&view=logs"
        );
        assert_eq!(
            links.pipeline_runs(7),
            "https://dev.azure.com/contoso/Web%20Apps/_build?definitionId=7"
        );
    }

    #[test]
    fn test_code_links_use_other_project() {
        let links = links();
        assert_eq!(
            links.code_branch("ProjA", "RepoB", "feature/x"),
            "https://dev.azure.com/contoso/ProjA/_git/RepoB?version=GBfeature%2Fx"
        );
        assert_eq!(
            links.code_commit("ProjA", "RepoB", "abcdef0123"),
            "https://dev.azure.com/contoso/ProjA/_git/RepoB/commit/abcdef0123"
        );
    }

    #[test]
    fn test_library_links_prefer_project_web_url() {
        let links = DevOpsLinks::new(
            "https://dev.azure.com",
            "contoso",
            "web",
            Some("https://contoso.visualstudio.com/web/"),
        );
        assert_eq!(
            links.library(),
            "https://contoso.visualstudio.com/web/_library?itemType=VariableGroups"
        );
        assert!(links.variable_group(9).ends_with("variableGroupId=9"));
    }
}
