/*!
Stub broker pour développement sans Adafruit IO

Enregistre toutes les publications et souscriptions, et permet de simuler
la réception de messages sur les topics feeds ("{username}/feeds/{feed}").
*/

use anyhow::Result;
use rumqttc::QoS;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Topic Adafruit IO d'un feed
pub fn feed_topic(username: &str, feed: &str) -> String {
    format!("{username}/feeds/{feed}")
}

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl MockMessage {
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Client broker simulé, interface calquée sur rumqttc::AsyncClient
#[derive(Clone)]
pub struct MockBrokerClient {
    published: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    incoming_tx: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockBrokerClient {
    pub fn new() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            incoming_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Canal de réception des messages simulés (côté "gateway")
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.incoming_tx.lock().unwrap() = Some(tx);
        rx
    }

    /// Simule une publication sortante (signature compatible AsyncClient)
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage { topic: topic.into(), payload: payload.into(), qos, retain };
        log::info!("[stub] published to {}: {} bytes", message.topic, message.payload.len());
        self.published.lock().unwrap().push(message);
        Ok(())
    }

    /// Simule une souscription (signature compatible AsyncClient)
    pub async fn subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        log::info!("[stub] subscribed to {}", topic);
        self.subscriptions.lock().unwrap().push(topic);
        Ok(())
    }

    /// Simule un message entrant du broker vers la passerelle
    pub fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain: false,
        };
        if let Some(tx) = self.incoming_tx.lock().unwrap().as_ref() {
            tx.send(message)
                .map_err(|e| anyhow::anyhow!("simulated receiver closed: {e}"))?;
        }
        Ok(())
    }

    pub fn published_messages(&self) -> Vec<MockMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn messages_on(&self, topic: &str) -> Vec<MockMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Dernier payload publié sur un topic, en texte
    pub fn last_payload_on(&self, topic: &str) -> Option<String> {
        self.messages_on(topic).last().map(|m| m.payload_str())
    }

    /// Parse le dernier message d'un topic en JSON (messages de statut)
    pub fn last_json_on<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        match self.messages_on(topic).last() {
            Some(m) => Ok(Some(serde_json::from_slice(&m.payload)?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

impl Default for MockBrokerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_subscribe_recorded() {
        let _ = env_logger::builder().is_test(true).try_init();
        let client = MockBrokerClient::new();
        let topic = feed_topic("cheems", "fan");

        client.subscribe(&topic, QoS::AtLeastOnce).await.unwrap();
        assert_eq!(client.subscriptions(), vec![topic.clone()]);

        client.publish(&topic, QoS::AtLeastOnce, false, "75").await.unwrap();
        client.publish(&topic, QoS::AtLeastOnce, false, "0").await.unwrap();
        assert_eq!(client.messages_on(&topic).len(), 2);
        assert_eq!(client.last_payload_on(&topic).unwrap(), "0");
    }

    #[tokio::test]
    async fn test_simulated_incoming_reaches_receiver() {
        let client = MockBrokerClient::new();
        let mut rx = client.setup_receiver();
        client
            .simulate_incoming(feed_topic("cheems", "temperature"), "27.5")
            .unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "cheems/feeds/temperature");
        assert_eq!(msg.payload_str(), "27.5");
    }

    #[tokio::test]
    async fn test_json_status_message_parsing() {
        let client = MockBrokerClient::new();
        let status = serde_json::json!({ "broker_status": "connected", "samples_cached": 3 });
        client
            .publish("cheems/status", QoS::AtLeastOnce, false, serde_json::to_vec(&status).unwrap())
            .await
            .unwrap();
        let parsed: Option<serde_json::Value> = client.last_json_on("cheems/status").unwrap();
        assert_eq!(parsed.unwrap()["broker_status"], "connected");
    }

    #[tokio::test]
    async fn test_clear_resets_recordings() {
        let client = MockBrokerClient::new();
        client.publish("t", QoS::AtLeastOnce, false, "1").await.unwrap();
        client.subscribe("t", QoS::AtLeastOnce).await.unwrap();
        client.clear();
        assert!(client.published_messages().is_empty());
        assert!(client.subscriptions().is_empty());
    }
}
