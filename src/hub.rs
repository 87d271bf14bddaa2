//! Group-based push delivery to connected viewers.
//!
//! The monitor and dashboard loader only need two things from the transport:
//! who is connected (and to which groups) and a way to send an update to a
//! group or a single connection. [`BroadcastHub`] implements that in process
//! on top of a tokio broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::dashboard::PipelineListItem;
use crate::error::Result;
use crate::monitor::PipelineLiveUpdate;

/// Group joined by viewers of the live pipeline monitor.
pub const MONITOR_GROUP: &str = "PipelineMonitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateType {
    PipelineLiveStatusUpdate,
    DashboardPipelinesSkeleton,
    DashboardPipelineBatch,
    DashboardLoadComplete,
    LoadingStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum HubPayload {
    Empty,
    LiveStatus(PipelineLiveUpdate),
    Pipelines(Vec<PipelineListItem>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubUpdate {
    pub update_type: UpdateType,
    pub message: String,
    pub payload: HubPayload,
}

impl HubUpdate {
    pub fn new(update_type: UpdateType, message: impl Into<String>, payload: HubPayload) -> Self {
        Self {
            update_type,
            message: message.into(),
            payload,
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(UpdateType::LoadingStatus, message, HubPayload::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: String,
    pub groups: Vec<String>,
}

impl Connection {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Group(String),
    Connection(String),
}

impl Target {
    pub fn group(name: &str) -> Self {
        Self::Group(name.to_string())
    }

    pub fn connection(id: &str) -> Self {
        Self::Connection(id.to_string())
    }

    fn reaches(&self, connection_id: &str, groups: &[String]) -> bool {
        match self {
            Self::Group(group) => groups.iter().any(|g| g == group),
            Self::Connection(id) => id == connection_id,
        }
    }
}

#[async_trait]
pub trait PushHub: Send + Sync {
    /// Currently connected viewers with their group memberships.
    async fn active_connections(&self) -> Vec<Connection>;

    async fn send(&self, target: Target, update: HubUpdate) -> Result<()>;
}

/// Number of connections that joined `group`.
pub async fn subscriber_count(hub: &dyn PushHub, group: &str) -> usize {
    hub.active_connections()
        .await
        .iter()
        .filter(|c| c.in_group(group))
        .count()
}

#[derive(Debug)]
struct Delivery {
    target: Target,
    update: HubUpdate,
}

type Registry = Arc<Mutex<HashMap<String, Vec<String>>>>;

/// In-process hub. Each [`Subscription`] is one connection; dropping it
/// removes the connection and its group memberships.
pub struct BroadcastHub {
    sender: broadcast::Sender<Arc<Delivery>>,
    registry: Registry,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            registry: Arc::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, groups: &[&str]) -> Subscription {
        let id = format!("conn-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let groups: Vec<String> = groups.iter().map(|g| g.to_string()).collect();

        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), groups.clone());
        debug!("Connection {id} joined {groups:?}");

        Subscription {
            id,
            groups,
            receiver: self.sender.subscribe(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl PushHub for BroadcastHub {
    async fn active_connections(&self) -> Vec<Connection> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, groups)| Connection {
                id: id.clone(),
                groups: groups.clone(),
            })
            .collect()
    }

    async fn send(&self, target: Target, update: HubUpdate) -> Result<()> {
        if self.sender.send(Arc::new(Delivery { target, update })).is_err() {
            debug!("No connections listening, update dropped");
        }
        Ok(())
    }
}

pub struct Subscription {
    id: String,
    groups: Vec<String>,
    receiver: broadcast::Receiver<Arc<Delivery>>,
    registry: Registry,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next update addressed to this connection or one of its groups.
    /// `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<HubUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(delivery) if delivery.target.reaches(&self.id, &self.groups) => {
                    return Some(delivery.update.clone());
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!("Connection {} fell behind, {missed} update(s) skipped", self.id);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        debug!("Connection {} left", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_membership_follows_subscription_lifetime() {
        let hub = BroadcastHub::default();
        assert_eq!(subscriber_count(&hub, MONITOR_GROUP).await, 0);

        let watcher = hub.subscribe(&[MONITOR_GROUP]);
        let _other = hub.subscribe(&["Elsewhere"]);
        assert_eq!(subscriber_count(&hub, MONITOR_GROUP).await, 1);
        assert_eq!(hub.active_connections().await.len(), 2);

        drop(watcher);
        assert_eq!(subscriber_count(&hub, MONITOR_GROUP).await, 0);
        assert_eq!(hub.active_connections().await.len(), 1);
    }

    #[tokio::test]
    async fn test_updates_reach_only_their_target() {
        let hub = BroadcastHub::default();
        let mut watcher = hub.subscribe(&[MONITOR_GROUP]);
        let mut loader = hub.subscribe(&[]);

        hub.send(Target::connection(loader.id()), HubUpdate::status("for loader"))
            .await
            .unwrap();
        hub.send(Target::group(MONITOR_GROUP), HubUpdate::status("for group"))
            .await
            .unwrap();

        assert_eq!(loader.recv().await.unwrap().message, "for loader");
        assert_eq!(watcher.recv().await.unwrap().message, "for group");

        let mut next = tokio_test::task::spawn(loader.recv());
        tokio_test::assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn test_send_without_listeners_is_not_an_error() {
        let hub = BroadcastHub::new(4);
        hub.send(Target::group(MONITOR_GROUP), HubUpdate::status("nobody"))
            .await
            .unwrap();
    }

    #[test]
    fn test_update_serializes_type_name() {
        let update = HubUpdate::status("Fetching pipeline list...");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["updateType"], "LoadingStatus");
        assert_eq!(json["message"], "Fetching pipeline list...");
        assert!(json["payload"].is_null());
    }
}
