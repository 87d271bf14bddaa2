mod client;
mod links;

pub use client::{AzureClientFactory, AzureDevOpsClient};
pub use links::{short_branch, DevOpsLinks};
