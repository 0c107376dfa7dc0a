use chrono::{DateTime, Utc};
use rand::Rng;

use crate::model::{
    AnalyticsOverview, ColorCounts, CongestionCounts, CongestionLevel, Hotspot, Signal,
    SignalColor, SignalStatus, TrafficSample,
};

/// Derive one sample per signal from its current density.
///
/// vehicle count = floor(density / 2) + U[0, 20), average speed =
/// max(10, 50 - density / 2).
pub fn compute_samples<R: Rng + ?Sized>(
    signals: &[Signal],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<TrafficSample> {
    signals
        .iter()
        .map(|signal| {
            let density = signal.traffic_density;
            TrafficSample {
                signal_id: signal.signal_id.clone(),
                vehicle_count: (density / 2.0).floor() as u32 + rng.gen_range(0..20),
                average_speed: (50.0 - density / 2.0).max(10.0),
                traffic_density: density,
                congestion_level: CongestionLevel::from_density(density),
                timestamp: now,
            }
        })
        .collect()
}

/// Samples used before the first tick: counts and speeds are drawn
/// independently of density.
pub fn initial_samples<R: Rng + ?Sized>(
    signals: &[Signal],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<TrafficSample> {
    signals
        .iter()
        .map(|signal| TrafficSample {
            signal_id: signal.signal_id.clone(),
            vehicle_count: rng.gen_range(10..60),
            average_speed: f64::from(rng.gen_range(20u32..50)),
            traffic_density: signal.traffic_density,
            congestion_level: CongestionLevel::from_density(signal.traffic_density),
            timestamp: now,
        })
        .collect()
}

pub fn compute_overview(
    signals: &[Signal],
    samples: &[TrafficSample],
    total_vehicles: usize,
) -> AnalyticsOverview {
    let mut congestion_levels = CongestionCounts::default();
    for sample in samples {
        match sample.congestion_level {
            CongestionLevel::Low => congestion_levels.low += 1,
            CongestionLevel::Medium => congestion_levels.medium += 1,
            CongestionLevel::High => congestion_levels.high += 1,
            CongestionLevel::Severe => congestion_levels.severe += 1,
        }
    }

    let mut signals_by_state = ColorCounts::default();
    for signal in signals {
        match signal.current_state {
            SignalColor::Red => signals_by_state.red += 1,
            SignalColor::Yellow => signals_by_state.yellow += 1,
            SignalColor::Green => signals_by_state.green += 1,
        }
    }

    AnalyticsOverview {
        total_signals: signals.len(),
        active_signals: signals
            .iter()
            .filter(|s| s.status == SignalStatus::Active)
            .count(),
        total_vehicles,
        average_density: mean(samples.iter().map(|s| s.traffic_density)),
        average_speed: mean(samples.iter().map(|s| s.average_speed)),
        congestion_levels,
        signals_by_state,
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    Some(values.sum::<f64>() / n as f64)
}

/// Signals at high or severe congestion, densest first. Equal densities keep
/// signal order.
pub fn compute_hotspots(signals: &[Signal], samples: &[TrafficSample]) -> Vec<Hotspot> {
    let mut hotspots: Vec<Hotspot> = signals
        .iter()
        .filter_map(|signal| {
            let sample = samples.iter().find(|s| s.signal_id == signal.signal_id)?;
            sample.congestion_level.is_hotspot().then(|| Hotspot {
                signal_id: signal.signal_id.clone(),
                location: signal.location.clone(),
                traffic_density: signal.traffic_density,
                congestion_level: sample.congestion_level,
                vehicle_count: sample.vehicle_count,
            })
        })
        .collect();

    hotspots.sort_by(|a, b| b.traffic_density.total_cmp(&a.traffic_density));
    hotspots
}
