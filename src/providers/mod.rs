mod api;
mod azure;
pub mod types;

pub use api::{ClientFactory, DevOpsApi};
pub use azure::{short_branch, AzureClientFactory, AzureDevOpsClient, DevOpsLinks};
