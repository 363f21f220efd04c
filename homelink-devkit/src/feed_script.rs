/*!
Scripts capteurs : relevés synthétiques plausibles par feed

Reprend la boucle "publish random" du prototype d'origine sous forme
réutilisable : un SensorScript génère des valeurs dans des plages
réalistes par type de capteur, et peut dérouler un cycle complet contre
un MockBrokerClient.
*/

use crate::broker_stub::{feed_topic, MockBrokerClient};
use anyhow::Result;
use rand::Rng;
use rumqttc::QoS;

/// Feeds capteurs (lecture seule) du dashboard
pub const SENSOR_FEEDS: [&str; 3] = ["humidity", "light", "temperature"];

pub struct SensorScript {
    username: String,
}

impl SensorScript {
    pub fn new(username: &str) -> Self {
        Self { username: username.to_string() }
    }

    /// Relevé synthétique dans une plage plausible pour le feed donné
    pub fn reading(&self, feed: &str) -> String {
        let mut rng = rand::rng();
        match feed {
            "temperature" => format!("{:.1}", rng.random_range(18.0..35.0)),
            "humidity" => format!("{:.0}", rng.random_range(30.0..90.0)),
            "light" => format!("{:.0}", rng.random_range(0.0..1000.0)),
            // feeds de commande : valeur brute 0..100 comme le prototype
            _ => rng.random_range(0..=100u32).to_string(),
        }
    }

    /// Publie un relevé par feed capteur sur le stub
    pub async fn run_once(&self, client: &MockBrokerClient) -> Result<()> {
        for feed in SENSOR_FEEDS {
            let value = self.reading(feed);
            let topic = feed_topic(&self.username, feed);
            log::info!("[script] {} -> {}", topic, value);
            client.publish(topic, QoS::AtLeastOnce, false, value).await?;
        }
        Ok(())
    }

    /// Injecte un relevé par feed capteur comme messages entrants simulés
    pub fn simulate_sensor_burst(&self, client: &MockBrokerClient) -> Result<()> {
        for feed in SENSOR_FEEDS {
            client.simulate_incoming(feed_topic(&self.username, feed), self.reading(feed))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_within_plausible_ranges() {
        let script = SensorScript::new("cheems");
        for _ in 0..50 {
            let t: f64 = script.reading("temperature").parse().unwrap();
            assert!((18.0..35.0).contains(&t));
            let h: f64 = script.reading("humidity").parse().unwrap();
            assert!((30.0..=90.0).contains(&h));
            let l: f64 = script.reading("light").parse().unwrap();
            assert!((0.0..=1000.0).contains(&l));
            let fan: u32 = script.reading("fan").parse().unwrap();
            assert!(fan <= 100);
        }
    }

    #[tokio::test]
    async fn test_run_once_publishes_every_sensor_feed() {
        let client = MockBrokerClient::new();
        let script = SensorScript::new("cheems");
        script.run_once(&client).await.unwrap();
        for feed in SENSOR_FEEDS {
            assert_eq!(client.messages_on(&feed_topic("cheems", feed)).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_simulated_burst_reaches_receiver() {
        let client = MockBrokerClient::new();
        let mut rx = client.setup_receiver();
        let script = SensorScript::new("cheems");
        script.simulate_sensor_burst(&client).unwrap();
        let mut topics = Vec::new();
        for _ in 0..SENSOR_FEEDS.len() {
            topics.push(rx.recv().await.unwrap().topic);
        }
        assert!(topics.contains(&"cheems/feeds/temperature".to_string()));
        assert!(topics.contains(&"cheems/feeds/humidity".to_string()));
        assert!(topics.contains(&"cheems/feeds/light".to_string()));
    }
}
