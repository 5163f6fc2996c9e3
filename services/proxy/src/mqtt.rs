//! The MQTT publish seam (§4.6). The client itself is out of scope; this
//! trait is what `Connection` publishes decoded registers and AT-command
//! rejections through, so the publish-ordering invariant (§5) is testable
//! without a real broker.

use async_trait::async_trait;

#[async_trait]
pub trait MqttSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: String);
}

/// Default sink: logs at debug level and drops. Used whenever no real
/// client (`rumqttc`-backed, out of scope here) is wired in.
#[derive(Debug, Default)]
pub struct NullMqttSink;

#[async_trait]
impl MqttSink for NullMqttSink {
    async fn publish(&self, topic: &str, payload: String) {
        tracing::debug!(topic, payload, "mqtt publish (no sink configured)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_sink_accepts_any_publish() {
        let sink = NullMqttSink;
        sink.publish("proxy/inverter/grid_voltage", "230".to_owned()).await;
    }
}
