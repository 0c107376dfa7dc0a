use rand::Rng;

use crate::{
    error::EngineError,
    model::{Location, Signal, SignalColor, SignalStatus, Timing, TimingUpdate},
};

/// Perturbation applied to each density per tick, in density points.
pub const DENSITY_STEP: f64 = 5.0;
/// Chance per tick that a signal advances to its next color.
pub const COLOR_ADVANCE_PROBABILITY: f64 = 0.3;

/// Fixed set of traffic signals with their live attributes.
///
/// The store does not validate colors or timings; callers check those at
/// their own boundary before mutating.
#[derive(Debug, Clone)]
pub struct SignalStore {
    signals: Vec<Signal>,
}

impl SignalStore {
    pub fn new(signals: Vec<Signal>) -> Self {
        SignalStore { signals }
    }

    /// The four intersections the dashboard ships with.
    pub fn with_default_signals() -> Self {
        let configs = [
            ("S001", 28.6139, 77.2090, "Main Street & 1st Avenue", SignalColor::Red, 45.0),
            ("S002", 28.6149, 77.2100, "Park Avenue & 2nd Street", SignalColor::Green, 65.0),
            ("S003", 28.6159, 77.2110, "Broadway & 3rd Avenue", SignalColor::Yellow, 30.0),
            ("S004", 28.6169, 77.2120, "Market Street & 4th Avenue", SignalColor::Red, 80.0),
        ];

        let signals = configs
            .into_iter()
            .map(|(signal_id, lat, lng, name, current_state, traffic_density)| Signal {
                signal_id: signal_id.to_string(),
                location: Location {
                    lat,
                    lng,
                    name: name.to_string(),
                },
                current_state,
                timing: Timing::default(),
                traffic_density,
                status: SignalStatus::Active,
            })
            .collect();

        SignalStore::new(signals)
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn get(&self, signal_id: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.signal_id == signal_id)
    }

    fn get_mut(&mut self, signal_id: &str) -> Result<&mut Signal, EngineError> {
        self.signals
            .iter_mut()
            .find(|s| s.signal_id == signal_id)
            .ok_or_else(|| EngineError::NotFound(signal_id.to_string()))
    }

    pub fn set_state(&mut self, signal_id: &str, color: SignalColor) -> Result<Signal, EngineError> {
        let signal = self.get_mut(signal_id)?;
        signal.current_state = color;
        Ok(signal.clone())
    }

    pub fn set_timing(&mut self, signal_id: &str, timing: TimingUpdate) -> Result<Signal, EngineError> {
        let signal = self.get_mut(signal_id)?;
        timing.apply_to(&mut signal.timing);
        Ok(signal.clone())
    }

    /// Each signal independently moves one step along red -> yellow -> green -> red
    /// with probability [`COLOR_ADVANCE_PROBABILITY`].
    pub fn advance_colors<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for signal in &mut self.signals {
            if rng.gen_bool(COLOR_ADVANCE_PROBABILITY) {
                signal.current_state = signal.current_state.next();
            }
        }
    }

    /// Shift every density by a uniform amount in [-5, +5], clamped to [0, 100].
    pub fn perturb_densities<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for signal in &mut self.signals {
            let change = rng.gen_range(-DENSITY_STEP..=DENSITY_STEP);
            signal.traffic_density = (signal.traffic_density + change).clamp(0.0, 100.0);
        }
    }
}
