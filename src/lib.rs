//! Live pipeline-health monitoring and dashboard enrichment for Azure DevOps.

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod hub;
pub mod monitor;
pub mod providers;
pub mod yaml;

#[cfg(test)]
mod testing;
