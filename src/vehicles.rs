use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};

use crate::model::{Position, Signal, TrafficSample, Vehicle, VehicleKind};

/// Vehicles generated per sampled vehicle count.
pub const VEHICLES_PER_COUNT: u32 = 5;
/// Width of the jitter box around a signal, in degrees on each axis.
pub const JITTER_DEGREES: f64 = 0.01;

/// Build a fresh vehicle list from the current signals and samples.
///
/// Nothing carries over from a previous call: identifiers are positional
/// (`V<signal>-<index>`) and every attribute is drawn again.
pub fn populate<R: Rng + ?Sized>(
    signals: &[Signal],
    samples: &[TrafficSample],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Vehicle> {
    let half = JITTER_DEGREES / 2.0;
    let mut vehicles = Vec::new();

    for signal in signals {
        let Some(sample) = samples.iter().find(|s| s.signal_id == signal.signal_id) else {
            continue;
        };

        let count = sample.vehicle_count / VEHICLES_PER_COUNT;
        for i in 0..count {
            let kind = *VehicleKind::ALL.choose(rng).unwrap_or(&VehicleKind::Car);

            vehicles.push(Vehicle {
                vehicle_id: format!("V{}-{}", signal.signal_id, i),
                kind,
                location: Position {
                    lat: signal.location.lat + rng.gen_range(-half..half),
                    lng: signal.location.lng + rng.gen_range(-half..half),
                },
                speed: rng.gen_range(20..60),
                direction: rng.gen_range(0..360),
                signal_id: signal.signal_id.clone(),
                timestamp: now,
            });
        }
    }

    vehicles
}
