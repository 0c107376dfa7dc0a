use std::sync::Arc;

use rdkafka::{
    config::ClientConfig,
    error::KafkaError,
    producer::{FutureProducer, FutureRecord},
};
use tracing::{info, warn};

use crate::{broadcast::Observer, error::DeliveryError, model::Snapshot};

/// Publishes every snapshot as JSON to a Kafka topic.
///
/// Records are handed to the producer queue without awaiting delivery.
pub struct KafkaObserver {
    producer: FutureProducer,
    topic: String,
}

impl KafkaObserver {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        info!("Kafka sink ready: brokers={} topic={}", brokers, topic);
        Ok(KafkaObserver {
            producer,
            topic: topic.to_string(),
        })
    }

    /// Build the sink, or log and carry on without one.
    pub fn connect_or_degrade(brokers: &str, topic: &str) -> Option<Arc<Self>> {
        match KafkaObserver::new(brokers, topic) {
            Ok(observer) => Some(Arc::new(observer)),
            Err(e) => {
                warn!("Kafka unavailable, running without it: {}", e);
                None
            }
        }
    }
}

impl Observer for KafkaObserver {
    fn deliver(&self, snapshot: &Arc<Snapshot>) -> Result<(), DeliveryError> {
        let payload =
            serde_json::to_string(snapshot.as_ref()).map_err(|e| DeliveryError::Sink(e.to_string()))?;
        let key = snapshot.timestamp.timestamp_millis().to_string();

        self.producer
            .send_result(FutureRecord::to(&self.topic).payload(&payload).key(&key))
            .map(|_| ())
            .map_err(|(e, _)| DeliveryError::Sink(e.to_string()))
    }
}

#[cfg(all(test, feature = "kafka"))]
mod tests {
    use super::*;
    use crate::engine::tests::test_engine;

    #[test]
    fn new_accepts_broker_list() {
        assert!(KafkaObserver::new("localhost:9092,localhost:9093", "traffic-update").is_ok());
        assert!(KafkaObserver::connect_or_degrade("localhost:9092", "traffic-update").is_some());
    }

    // Delivery only enqueues the record, so no broker has to be reachable.
    #[tokio::test]
    async fn deliver_enqueues_snapshot() {
        let engine = test_engine(5);
        let snapshot = engine.tick().await;
        let observer = KafkaObserver::new("localhost:9092", "traffic-update").unwrap();

        assert!(observer.deliver(&snapshot).is_ok());
    }
}
