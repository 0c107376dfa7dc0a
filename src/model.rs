use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ===== Signals =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalColor {
    Red,
    Yellow,
    Green,
}

impl SignalColor {
    /// Next color in the fixed red -> yellow -> green -> red cycle.
    pub fn next(self) -> Self {
        match self {
            SignalColor::Red => SignalColor::Yellow,
            SignalColor::Yellow => SignalColor::Green,
            SignalColor::Green => SignalColor::Red,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalColor::Red => "red",
            SignalColor::Yellow => "yellow",
            SignalColor::Green => "green",
        }
    }
}

impl fmt::Display for SignalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalColor {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(SignalColor::Red),
            "yellow" => Ok(SignalColor::Yellow),
            "green" => Ok(SignalColor::Green),
            _ => Err(EngineError::InvalidArgument(
                "Invalid state. Must be red, yellow, or green".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Active,
    Maintenance,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

/// Per-color durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub red: u32,
    pub yellow: u32,
    pub green: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            red: 30,
            yellow: 5,
            green: 25,
        }
    }
}

/// Partial timing change; colors left as `None` keep their current duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingUpdate {
    pub red: Option<u32>,
    pub yellow: Option<u32>,
    pub green: Option<u32>,
}

impl TimingUpdate {
    pub const RED_GREEN_BOUNDS: (u32, u32) = (10, 60);
    pub const YELLOW_BOUNDS: (u32, u32) = (3, 10);

    pub fn validate(&self) -> Result<(), EngineError> {
        check_bounds("red", self.red, Self::RED_GREEN_BOUNDS)?;
        check_bounds("yellow", self.yellow, Self::YELLOW_BOUNDS)?;
        check_bounds("green", self.green, Self::RED_GREEN_BOUNDS)
    }

    pub fn apply_to(&self, timing: &mut Timing) {
        if let Some(red) = self.red {
            timing.red = red;
        }
        if let Some(yellow) = self.yellow {
            timing.yellow = yellow;
        }
        if let Some(green) = self.green {
            timing.green = green;
        }
    }
}

fn check_bounds(color: &str, value: Option<u32>, (min, max): (u32, u32)) -> Result<(), EngineError> {
    match value {
        Some(v) if v < min || v > max => Err(EngineError::InvalidArgument(format!(
            "{color} duration must be between {min} and {max} seconds, got {v}"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub signal_id: String,
    pub location: Location,
    pub current_state: SignalColor,
    pub timing: Timing,
    /// Always within [0, 100].
    pub traffic_density: f64,
    pub status: SignalStatus,
}

// ===== Derived traffic data =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
    Severe,
}

impl CongestionLevel {
    pub fn from_density(density: f64) -> Self {
        if density < 30.0 {
            CongestionLevel::Low
        } else if density < 50.0 {
            CongestionLevel::Medium
        } else if density < 70.0 {
            CongestionLevel::High
        } else {
            CongestionLevel::Severe
        }
    }

    pub fn is_hotspot(self) -> bool {
        matches!(self, CongestionLevel::High | CongestionLevel::Severe)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSample {
    pub signal_id: String,
    pub vehicle_count: u32,
    pub average_speed: f64,
    pub traffic_density: f64,
    pub congestion_level: CongestionLevel,
    pub timestamp: DateTime<Utc>,
}

// ===== Vehicles =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleKind {
    Car,
    Truck,
    Bus,
    Motorcycle,
    Bicycle,
}

impl VehicleKind {
    pub const ALL: [VehicleKind; 5] = [
        VehicleKind::Car,
        VehicleKind::Truck,
        VehicleKind::Bus,
        VehicleKind::Motorcycle,
        VehicleKind::Bicycle,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub vehicle_id: String,
    #[serde(rename = "type")]
    pub kind: VehicleKind,
    pub location: Position,
    pub speed: u32,
    /// Heading in degrees, 0..360.
    pub direction: u32,
    pub signal_id: String,
    pub timestamp: DateTime<Utc>,
}

// ===== Snapshots and analytics =====

/// Internally consistent state bundle produced at the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub signals: Vec<Signal>,
    pub vehicles: Vec<Vehicle>,
    pub traffic_data: Vec<TrafficSample>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CongestionCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub severe: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCounts {
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub total_signals: usize,
    pub active_signals: usize,
    pub total_vehicles: usize,
    /// `None` when there are no samples to average over.
    pub average_density: Option<f64>,
    pub average_speed: Option<f64>,
    pub congestion_levels: CongestionCounts,
    pub signals_by_state: ColorCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub signal_id: String,
    pub location: Location,
    pub traffic_density: f64,
    pub congestion_level: CongestionLevel,
    pub vehicle_count: u32,
}
