use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::DeliveryError, model::Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        SubscriptionId(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Anything that wants every published snapshot.
///
/// `deliver` must not wait on the consumer; a slow observer reports
/// [`DeliveryError::Full`] and misses that snapshot.
pub trait Observer: Send + Sync {
    fn deliver(&self, snapshot: &Arc<Snapshot>) -> Result<(), DeliveryError>;
}

/// Observer backed by a bounded queue.
pub struct ChannelObserver {
    tx: mpsc::Sender<Arc<Snapshot>>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<Snapshot>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelObserver { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn deliver(&self, snapshot: &Arc<Snapshot>) -> Result<(), DeliveryError> {
        self.tx.try_send(snapshot.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// A channel subscription: its handle plus the receiving end.
pub struct Subscription {
    pub id: SubscriptionId,
    pub rx: mpsc::Receiver<Arc<Snapshot>>,
}

#[derive(Default)]
pub struct Broadcaster {
    observers: RwLock<HashMap<SubscriptionId, Arc<dyn Observer>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, observer: Arc<dyn Observer>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.observers.write().await.insert(id, observer);
        debug!("Observer {} subscribed", id);
        id
    }

    pub async fn subscribe_channel(&self, capacity: usize) -> Subscription {
        let (observer, rx) = ChannelObserver::new(capacity);
        let id = self.subscribe(Arc::new(observer)).await;
        Subscription { id, rx }
    }

    /// Returns whether the handle was still subscribed.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.observers.write().await.remove(&id).is_some();
        if removed {
            debug!("Observer {} unsubscribed", id);
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Hand `snapshot` to every observer and return how many accepted it.
    ///
    /// A failed delivery is logged and skipped. Observers whose consumer
    /// has gone away are dropped from the set.
    pub async fn publish(&self, snapshot: Arc<Snapshot>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let observers = self.observers.read().await;
            for (id, observer) in observers.iter() {
                match observer.deliver(&snapshot) {
                    Ok(()) => delivered += 1,
                    Err(DeliveryError::Closed) => closed.push(*id),
                    Err(e) => warn!("Dropping snapshot for observer {}: {}", id, e),
                }
            }
        }

        if !closed.is_empty() {
            let mut observers = self.observers.write().await;
            for id in closed {
                observers.remove(&id);
                debug!("Pruned disconnected observer {}", id);
            }
        }

        delivered
    }
}
