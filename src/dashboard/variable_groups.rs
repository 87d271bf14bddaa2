use indexmap::IndexMap;

use crate::providers::types::VariableGroup;

/// Project variable groups keyed by name, case-insensitively.
///
/// A later group with the same name replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct VariableGroupIndex {
    groups: IndexMap<String, VariableGroup>,
}

impl VariableGroupIndex {
    pub fn new(groups: impl IntoIterator<Item = VariableGroup>) -> Self {
        let groups = groups
            .into_iter()
            .map(|group| (group.name.to_lowercase(), group))
            .collect();
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn exact(&self, name: &str) -> Option<&VariableGroup> {
        self.groups.get(&name.trim().to_lowercase())
    }

    /// Exact name first, then the first group whose name contains `name` or
    /// is contained in it (e.g. `Web` against `Web-PROD`).
    pub fn find(&self, name: &str) -> Option<&VariableGroup> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.exact(&needle).or_else(|| {
            self.groups
                .iter()
                .filter(|(key, _)| !key.is_empty())
                .find(|(key, _)| key.contains(&needle) || needle.contains(key.as_str()))
                .map(|(_, group)| group)
        })
    }
}
