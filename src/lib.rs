//! Simulated traffic signal monitor.
//!
//! An [`Engine`] owns a fixed set of traffic signals. A [`TickScheduler`]
//! drives it on a fixed period: every tick nudges signal colors and
//! densities, rebuilds per-signal samples and a synthetic vehicle list,
//! and pushes the resulting [`Snapshot`] to every subscribed observer.
//! The [`server`] module puts a REST and WebSocket surface in front of it.

pub mod analytics;
pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod model;
pub mod scheduler;
pub mod server;
pub mod signals;
pub mod vehicles;

pub use broadcast::{Broadcaster, Observer, Subscription, SubscriptionId};
pub use engine::{Clock, Engine, SystemClock};
pub use error::{DeliveryError, EngineError};
pub use model::Snapshot;
pub use scheduler::TickScheduler;
