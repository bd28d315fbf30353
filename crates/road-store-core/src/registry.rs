use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::IngestError;

pub type SubscriberId = Uuid;

/// How long a single subscriber may take to accept one message.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Send half of a live connection.
#[async_trait::async_trait]
pub trait Subscriber: Send + Sync {
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Inner {
    subs: HashMap<SubscriberId, Arc<dyn Subscriber>>,
    open: bool,
}

/// Open live connections. Created when the server starts and emptied by
/// [`SubscriptionRegistry::shutdown`]; after that new subscriptions are refused.
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
    send_timeout: Duration,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { subs: HashMap::new(), open: true }),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = limit;
        self
    }

    /// `None` once the registry has been shut down.
    pub fn subscribe(&self, sub: Arc<dyn Subscriber>) -> Option<SubscriberId> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return None;
        }
        let id = Uuid::new_v4();
        inner.subs.insert(id, sub);
        debug!(subscriber = %id, total = inner.subs.len(), "subscriber added");
        Some(id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.subs.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, total = inner.subs.len(), "subscriber removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes `payload` once and sends it to every subscriber concurrently.
    ///
    /// A failed or timed out send is logged and its subscriber dropped; the
    /// others still receive the payload.
    pub async fn broadcast<T: Serialize + ?Sized>(&self, payload: &T) -> Result<BroadcastReport, IngestError> {
        let text = serde_json::to_string(payload).map_err(anyhow::Error::from)?;
        let text = text.as_str();
        let limit = self.send_timeout;
        let targets: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self
            .inner
            .lock()
            .subs
            .iter()
            .map(|(id, s)| (*id, Arc::clone(s)))
            .collect();

        let results = join_all(
            targets
                .iter()
                .map(|(id, s)| async move {
                    let res = match timeout(limit, s.send_text(text)).await {
                        Ok(res) => res,
                        Err(_) => Err(anyhow::anyhow!("send timed out after {limit:?}")),
                    };
                    (*id, res)
                }),
        )
        .await;

        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();
        for (id, res) in results {
            match res {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(subscriber = %id, error = %e, "broadcast delivery failed");
                    report.failed += 1;
                    dead.push(id);
                }
            }
        }
        if !dead.is_empty() {
            let mut inner = self.inner.lock();
            for id in dead {
                inner.subs.remove(&id);
            }
        }
        Ok(report)
    }

    /// Drops every subscriber and refuses new ones. Returns how many were dropped.
    pub fn shutdown(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.open = false;
        let n = inner.subs.len();
        inner.subs.clear();
        info!(dropped = n, "subscription registry shut down");
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        got: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Subscriber for Recorder {
        async fn send_text(&self, text: &str) -> anyhow::Result<()> {
            self.got.lock().push(text.to_string());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl Subscriber for Broken {
        async fn send_text(&self, _text: &str) -> anyhow::Result<()> {
            anyhow::bail!("connection reset")
        }
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_block_others() {
        let reg = SubscriptionRegistry::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        reg.subscribe(a.clone()).unwrap();
        reg.subscribe(Arc::new(Broken)).unwrap();
        reg.subscribe(b.clone()).unwrap();

        let report = reg.broadcast(&json!({"road_state": "bad"})).await.unwrap();
        assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
        assert_eq!(a.got.lock().as_slice(), [r#"{"road_state":"bad"}"#]);
        assert_eq!(b.got.lock().len(), 1);
        // the broken one was evicted
        assert_eq!(reg.len(), 2);
    }

    struct Stalled;

    #[async_trait::async_trait]
    impl Subscriber for Stalled {
        async fn send_text(&self, _text: &str) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_subscriber_times_out_and_is_evicted() {
        let reg = SubscriptionRegistry::new().with_send_timeout(Duration::from_millis(50));
        let a = Arc::new(Recorder::default());
        reg.subscribe(a.clone()).unwrap();
        reg.subscribe(Arc::new(Stalled)).unwrap();

        let report = timeout(Duration::from_secs(2), reg.broadcast("x"))
            .await
            .expect("broadcast hung on a stalled subscriber")
            .unwrap();
        assert_eq!(report, BroadcastReport { delivered: 1, failed: 1 });
        assert_eq!(a.got.lock().as_slice(), [r#""x""#]);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_to_nobody() {
        let reg = SubscriptionRegistry::new();
        let report = reg.broadcast(&[1, 2, 3]).await.unwrap();
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_unsubscribed_receives_nothing() {
        let reg = SubscriptionRegistry::new();
        let a = Arc::new(Recorder::default());
        let id = reg.subscribe(a.clone()).unwrap();
        assert!(reg.unsubscribe(id));
        assert!(!reg.unsubscribe(id));
        reg.broadcast("hello").await.unwrap();
        assert!(a.got.lock().is_empty());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_shutdown_refuses_new_subscribers() {
        let reg = SubscriptionRegistry::new();
        reg.subscribe(Arc::new(Recorder::default())).unwrap();
        reg.subscribe(Arc::new(Recorder::default())).unwrap();
        assert_eq!(reg.shutdown(), 2);
        assert!(reg.is_empty());
        assert!(reg.subscribe(Arc::new(Recorder::default())).is_none());
    }
}
