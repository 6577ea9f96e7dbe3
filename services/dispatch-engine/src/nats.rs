use crate::errors::{DispatchEngineError, Result};
use crate::models::DeliveryEvent;
use async_nats::Client;
use serde_json;
use tracing::info;

pub struct NatsProducer {
    client: Client,
    topic_prefix: String,
}

impl NatsProducer {
    pub async fn new(url: &str, topic_prefix: &str) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| DispatchEngineError::Nats(e.to_string()))?;

        info!("Connected to NATS at {}", url);

        Ok(NatsProducer {
            client,
            topic_prefix: topic_prefix.to_string(),
        })
    }

    pub async fn publish_delivery_event(&self, event: &DeliveryEvent) -> Result<()> {
        let subject = format!("{}.delivery.events", self.topic_prefix);
        let payload = serde_json::to_vec(event)
            .map_err(|e| DispatchEngineError::Nats(format!("Serialization error: {}", e)))?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| DispatchEngineError::Nats(format!("Failed to publish event: {}", e)))?;

        info!(
            "Published delivery event: {:?} for parcel {:?} to subject {}",
            event.event_type, event.parcel_id, subject
        );

        Ok(())
    }
}
