// ── Broadcast hub ──
//
// Fire-and-forget fan-out of fleet events to realtime subscribers. No
// acknowledgement and no replay: a subscriber that cannot take a message
// right now (full or closed) is dropped and has to subscribe again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::model::{Camera, CohnStatus, SessionState, Serial};

// ── Messages ────────────────────────────────────────────────────────

/// Every event a subscriber can receive, serialized as `{type, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HubMessage {
    FleetStatus(FleetSnapshot),
    CameraAdded { serial: Serial, name: String },
    CameraRemoved { serial: Serial },
    CameraConnection { serial: Serial, connected: bool },
    RecordingStarted(RecordingEvent),
    RecordingStopped(RecordingEvent),
    CohnStatus { serial: Serial, status: CohnStatus },
    ShootChanged(SessionState),
    DownloadProgress(DownloadProgress),
    DownloadComplete {
        serial: Serial,
        downloaded: usize,
        skipped: usize,
        failed: usize,
        bytes: u64,
    },
    DownloadError {
        serial: Serial,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        message: String,
    },
}

impl HubMessage {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Whole-fleet status as of one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub cameras: Vec<Camera>,
    pub session: SessionState,
    pub active_network: Option<String>,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingEvent {
    pub shoot_id: Option<Uuid>,
    pub take: Option<u32>,
    pub cameras: Vec<Serial>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub serial: Serial,
    pub filename: String,
    /// 1-based position of this file in the camera's job.
    pub index: usize,
    pub total: usize,
    pub bytes: u64,
}

// ── Subscribers ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// The sink refused a message; the hub drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Opaque delivery target. Must not block.
pub trait HubSink: Send + Sync {
    fn deliver(&self, message: &Arc<HubMessage>) -> Result<(), SinkClosed>;
}

struct ChannelSink(mpsc::Sender<Arc<HubMessage>>);

impl HubSink for ChannelSink {
    fn deliver(&self, message: &Arc<HubMessage>) -> Result<(), SinkClosed> {
        self.0.try_send(Arc::clone(message)).map_err(|_| SinkClosed)
    }
}

// ── Hub ─────────────────────────────────────────────────────────────

pub struct BroadcastHub {
    sinks: DashMap<SubscriberId, Arc<dyn HubSink>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl BroadcastHub {
    /// `capacity` bounds each channel subscriber's backlog.
    pub fn new(capacity: usize) -> Self {
        Self {
            sinks: DashMap::new(),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a channel subscriber.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Arc<HubMessage>>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.subscribe_sink(Arc::new(ChannelSink(tx)));
        (id, rx)
    }

    pub fn subscribe_sink(&self, sink: Arc<dyn HubSink>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sinks.insert(id, sink);
        debug!(subscriber = %id, "hub subscriber registered");
        id
    }

    /// Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.sinks.remove(&id).is_some() {
            debug!(subscriber = %id, "hub subscriber removed");
        }
    }

    /// Deliver to every current subscriber. Returns how many took it.
    pub fn publish(&self, message: HubMessage) -> usize {
        let message = Arc::new(message);
        trace!(kind = message.kind(), "publishing");

        // Collect first; removing while iterating would deadlock a shard.
        let targets: Vec<(SubscriberId, Arc<dyn HubSink>)> = self
            .sinks
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut delivered = 0;
        for (id, sink) in targets {
            if sink.deliver(&message).is_ok() {
                delivered += 1;
            } else {
                self.sinks.remove(&id);
                debug!(subscriber = %id, kind = message.kind(), "dropping subscriber");
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Broken;

    impl HubSink for Broken {
        fn deliver(&self, _: &Arc<HubMessage>) -> Result<(), SinkClosed> {
            Err(SinkClosed)
        }
    }

    fn removed(serial: &str) -> HubMessage {
        HubMessage::CameraRemoved {
            serial: Serial::from(serial),
        }
    }

    #[test]
    fn failing_subscriber_is_dropped_without_affecting_others() {
        let hub = BroadcastHub::new(8);
        let (_, mut rx) = hub.subscribe();
        hub.subscribe_sink(Arc::new(Broken));
        assert_eq!(hub.subscriber_count(), 2);

        assert_eq!(hub.publish(removed("1234")), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(*rx.try_recv().unwrap(), removed("1234"));
    }

    #[test]
    fn full_subscriber_is_dropped() {
        let hub = BroadcastHub::new(1);
        let (_, _rx) = hub.subscribe();
        assert_eq!(hub.publish(removed("1")), 1);
        assert_eq!(hub.publish(removed("2")), 0);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn closed_receiver_is_dropped() {
        let hub = BroadcastHub::new(4);
        let (_, rx) = hub.subscribe();
        drop(rx);
        hub.publish(removed("1"));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn messages_serialize_as_type_and_payload() {
        let msg = HubMessage::CameraConnection {
            serial: Serial::from("1234"),
            connected: true,
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "camera_connection");
        assert_eq!(json["payload"]["serial"], "1234");
        assert_eq!(msg.kind(), "camera_connection");
    }
}
