use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "traffic-monitor", about = "Simulated traffic signal monitor")]
pub struct Config {
    /// HTTP port for the REST API and WebSocket stream
    #[arg(long, env = "PORT", default_value = "10000")]
    pub port: u16,

    /// Tick interval in milliseconds
    #[arg(long, env = "TICK_MS", default_value = "2000", value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Seed for the simulation RNG (random if unset)
    #[arg(long, env = "SIM_SEED")]
    pub seed: Option<u64>,

    /// Allowed CORS origin (any origin if unset)
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Kafka bootstrap servers for the snapshot sink
    #[arg(long, env = "KAFKA_BROKERS")]
    pub kafka_brokers: Option<String>,

    /// Kafka topic receiving snapshots
    #[arg(long, env = "KAFKA_TOPIC", default_value = "traffic-update")]
    pub kafka_topic: String,

    /// Snapshots queued per WebSocket client before it starts missing ticks
    #[arg(long, env = "SUBSCRIBER_BUFFER", default_value = "16")]
    pub subscriber_buffer: usize,
}

impl Config {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
