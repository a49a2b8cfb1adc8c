use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use db::models::{
    agent_status::AgentStatus,
    council_proposal::CouncilProposal,
    task::{Task, TaskWithProject},
};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc::{self, error::TrySendError};
use ts_rs::TS;

pub type SubscriberId = u64;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StatusUpdate,
    TaskUpdate,
    ProposalUpdate,
}

/// Frame pushed to every live subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn status_update(agent: &AgentStatus) -> Self {
        Self::new(EventKind::StatusUpdate, to_value(agent))
    }

    pub fn task_update(task: &TaskWithProject, action: &str, changes: Option<Value>) -> Self {
        let mut data = json!({
            "taskId": task.id,
            "action": action,
            "task": to_value(task),
        });
        if let Some(changes) = changes {
            data["changes"] = changes;
        }
        Self::new(EventKind::TaskUpdate, data)
    }

    pub fn task_deleted(task: &Task) -> Self {
        Self::new(
            EventKind::TaskUpdate,
            json!({ "taskId": task.id, "action": "deleted" }),
        )
    }

    pub fn proposal_update(proposal: &CouncilProposal, action: &str) -> Self {
        Self::new(
            EventKind::ProposalUpdate,
            json!({
                "proposalId": proposal.id,
                "action": action,
                "status": proposal.status,
            }),
        )
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!("Failed to serialize event payload: {}", e);
        Value::Null
    })
}

/// A live registration: the id to unsubscribe with and the receiving end of
/// the subscriber's bounded queue.
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<Arc<str>>,
}

/// In-process fan-out of live updates.
///
/// Each subscriber owns a bounded queue. `publish` never waits: a subscriber
/// whose queue is full (or whose receiver is gone) is removed on the spot,
/// so one slow socket cannot hold up the rest.
#[derive(Clone)]
pub struct EventBroker {
    subscribers: Arc<DashMap<SubscriberId, mpsc::Sender<Arc<str>>>>,
    next_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
    buffer: usize,
}

impl EventBroker {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            closed: Arc::new(AtomicBool::new(false)),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        if self.closed.load(Ordering::Acquire) {
            // sender dropped here, so the receiver reports closed immediately
            return Subscription { id, rx };
        }
        self.subscribers.insert(id, tx);
        // shutdown may have cleared the map between the check and the insert
        if self.closed.load(Ordering::Acquire) {
            self.subscribers.remove(&id);
            return Subscription { id, rx };
        }
        tracing::debug!(subscriber = id, "Subscriber connected");
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            tracing::debug!(subscriber = id, "Subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Serializes `event` once and offers it to every subscriber. Returns the
    /// number of queues that accepted the frame.
    pub fn publish(&self, event: &Event) -> usize {
        if self.subscribers.is_empty() {
            return 0;
        }

        let frame: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!("Failed to serialize {:?} event: {}", event.kind, e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut stale = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = *entry.key(), "Dropping slow subscriber");
                    stale.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => stale.push(*entry.key()),
            }
        }
        // removal has to wait until the shard read guards above are released
        for id in stale {
            self.subscribers.remove(&id);
        }

        delivered
    }

    /// Drops every subscriber and refuses new ones. Open receivers drain
    /// what is queued and then observe the channel closing.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let count = self.subscribers.len();
        self.subscribers.clear();
        tracing::info!("Event broker shut down ({} subscribers released)", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(n: u64) -> Event {
        Event::new(EventKind::StatusUpdate, json!({ "n": n }))
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let broker = EventBroker::new(8);
        assert_eq!(broker.publish(&ping(1)), 0);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn frames_carry_type_data_and_timestamp() {
        let broker = EventBroker::new(8);
        let mut sub = broker.subscribe();

        assert_eq!(broker.publish(&ping(7)), 1);

        let frame = sub.rx.recv().await.expect("frame");
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "status_update");
        assert_eq!(value["data"]["n"], 7);
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_while_others_receive() {
        let broker = EventBroker::new(2);
        let mut fast = broker.subscribe();
        let slow = broker.subscribe();

        for n in 0..3 {
            broker.publish(&ping(n));
            let frame = fast.rx.recv().await.expect("fast subscriber keeps up");
            assert!(frame.contains(&format!("\"n\":{n}")));
        }

        assert_eq!(broker.subscriber_count(), 1);
        drop(slow);
        assert_eq!(broker.publish(&ping(9)), 1);
    }

    #[tokio::test]
    async fn closed_receiver_is_removed_on_publish() {
        let broker = EventBroker::new(4);
        let sub = broker.subscribe();
        let _other = broker.subscribe();
        drop(sub.rx);

        assert_eq!(broker.publish(&ping(1)), 1);
        assert_eq!(broker.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let broker = EventBroker::new(4);
        let mut sub = broker.subscribe();
        broker.unsubscribe(sub.id);

        assert_eq!(broker.publish(&ping(1)), 0);
        assert!(sub.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn shutdown_closes_all_subscribers() {
        let broker = EventBroker::new(4);
        let mut a = broker.subscribe();
        broker.publish(&ping(1));
        broker.shutdown();

        // queued frame is still delivered, then the channel reports closed
        assert!(a.rx.recv().await.is_some());
        assert!(a.rx.recv().await.is_none());

        let mut late = broker.subscribe();
        assert!(late.rx.recv().await.is_none());
        assert_eq!(broker.subscriber_count(), 0);
        assert!(broker.is_closed());
    }

    #[tokio::test]
    async fn concurrent_subscribe_and_publish() {
        let broker = EventBroker::new(64);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let broker = broker.clone();
            handles.push(tokio::spawn(async move {
                let mut sub = broker.subscribe();
                broker.publish(&ping(0));
                let got = sub.rx.recv().await.is_some();
                broker.unsubscribe(sub.id);
                got
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn subscribe_racing_shutdown_never_outlives_it() {
        for _ in 0..50 {
            let broker = EventBroker::new(4);
            let mut handles = Vec::new();
            for _ in 0..8 {
                let broker = broker.clone();
                handles.push(tokio::spawn(async move { broker.subscribe() }));
            }
            broker.shutdown();

            for handle in handles {
                let mut sub = handle.await.unwrap();
                // every receiver ends once the broker is down
                while sub.rx.recv().await.is_some() {}
            }
            assert_eq!(broker.subscriber_count(), 0);
        }
    }
}
