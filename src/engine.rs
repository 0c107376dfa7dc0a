use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    analytics,
    broadcast::{Broadcaster, Observer, Subscription, SubscriptionId},
    error::EngineError,
    model::{AnalyticsOverview, Hotspot, Signal, SignalColor, Snapshot, TimingUpdate, TrafficSample, Vehicle},
    signals::SignalStore,
    vehicles,
};

/// Source of snapshot timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// Everything a tick mutates. Only ever touched under `Engine::state`.
struct SimState {
    store: SignalStore,
    samples: Vec<TrafficSample>,
    vehicles: Vec<Vehicle>,
    rng: Box<dyn RngCore + Send>,
}

impl SimState {
    fn snapshot(&self, timestamp: DateTime<Utc>) -> Snapshot {
        Snapshot {
            signals: self.store.signals().to_vec(),
            vehicles: self.vehicles.clone(),
            traffic_data: self.samples.clone(),
            timestamp,
        }
    }
}

/// Owns the simulation state and its fanout.
///
/// All writes (ticks and targeted mutations) go through one mutex. Readers
/// only ever see the last published [`Snapshot`], which is swapped in whole.
pub struct Engine {
    state: Mutex<SimState>,
    current: RwLock<Arc<Snapshot>>,
    broadcaster: Broadcaster,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(store: SignalStore, rng: Box<dyn RngCore + Send>, clock: Arc<dyn Clock>) -> Self {
        let mut state = SimState {
            store,
            samples: Vec::new(),
            vehicles: Vec::new(),
            rng,
        };
        let now = clock.now();
        state.samples = analytics::initial_samples(state.store.signals(), now, &mut state.rng);
        let snapshot = state.snapshot(now);

        Engine {
            state: Mutex::new(state),
            current: RwLock::new(Arc::new(snapshot)),
            broadcaster: Broadcaster::new(),
            clock,
        }
    }

    /// Default signal set, wall clock, seeded or entropy-backed RNG.
    pub fn with_defaults(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Engine::new(
            SignalStore::with_default_signals(),
            Box::new(rng),
            Arc::new(SystemClock),
        )
    }

    /// Run one tick and fan the resulting snapshot out to every observer.
    ///
    /// Colors advance, densities move, samples and vehicles are rebuilt from
    /// scratch, then the new snapshot replaces the current one.
    pub async fn tick(&self) -> Arc<Snapshot> {
        let snapshot = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let now = self.clock.now();

            state.store.advance_colors(&mut state.rng);
            state.store.perturb_densities(&mut state.rng);
            state.samples = analytics::compute_samples(state.store.signals(), now, &mut state.rng);
            state.vehicles =
                vehicles::populate(state.store.signals(), &state.samples, now, &mut state.rng);

            let snapshot = Arc::new(state.snapshot(now));
            *self.current.write().await = snapshot.clone();
            snapshot
        };

        debug!(
            "Tick produced {} signals, {} vehicles",
            snapshot.signals.len(),
            snapshot.vehicles.len()
        );

        self.broadcaster.publish(snapshot.clone()).await;
        snapshot
    }

    pub async fn current_snapshot(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    pub async fn signal(&self, signal_id: &str) -> Option<Signal> {
        self.current_snapshot()
            .await
            .signals
            .iter()
            .find(|s| s.signal_id == signal_id)
            .cloned()
    }

    pub async fn set_signal_state(
        &self,
        signal_id: &str,
        color: SignalColor,
    ) -> Result<Signal, EngineError> {
        let signal = self
            .mutate(|store| store.set_state(signal_id, color))
            .await?;
        info!("Signal {} set to {}", signal_id, color);
        Ok(signal)
    }

    pub async fn set_signal_timing(
        &self,
        signal_id: &str,
        timing: TimingUpdate,
    ) -> Result<Signal, EngineError> {
        timing.validate()?;
        let signal = self
            .mutate(|store| store.set_timing(signal_id, timing))
            .await?;
        info!("Signal {} timing updated to {:?}", signal_id, signal.timing);
        Ok(signal)
    }

    // Apply a targeted change under the mutation lock and republish the
    // current snapshot so readers see it before the next tick.
    async fn mutate<F>(&self, f: F) -> Result<Signal, EngineError>
    where
        F: FnOnce(&mut SignalStore) -> Result<Signal, EngineError>,
    {
        let mut state = self.state.lock().await;
        let signal = f(&mut state.store)?;

        let mut current = self.current.write().await;
        let mut snapshot = Snapshot::clone(&current);
        snapshot.signals = state.store.signals().to_vec();
        *current = Arc::new(snapshot);

        Ok(signal)
    }

    pub async fn compute_overview(&self) -> AnalyticsOverview {
        let snapshot = self.current_snapshot().await;
        analytics::compute_overview(
            &snapshot.signals,
            &snapshot.traffic_data,
            snapshot.vehicles.len(),
        )
    }

    pub async fn compute_hotspots(&self) -> Vec<Hotspot> {
        let snapshot = self.current_snapshot().await;
        analytics::compute_hotspots(&snapshot.signals, &snapshot.traffic_data)
    }

    pub async fn subscribe(&self, observer: Arc<dyn Observer>) -> SubscriptionId {
        self.broadcaster.subscribe(observer).await
    }

    pub async fn subscribe_channel(&self, capacity: usize) -> Subscription {
        self.broadcaster.subscribe_channel(capacity).await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.broadcaster.unsubscribe(id).await
    }

    pub async fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count().await
    }
}
