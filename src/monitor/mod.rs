//! Live pipeline status monitoring.

mod backoff;
mod cache;
mod poller;
mod snapshot;

pub use backoff::Backoff;
pub use cache::{MemoryStatusCache, StatusCache};
pub use poller::{CycleOutcome, PipelineLiveUpdate, PipelineMonitor};
pub use snapshot::{capture, ChangeKey, PipelineStatusSnapshot, StageBubble};
