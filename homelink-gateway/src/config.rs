use crate::admission::AdmissionSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub broker: BrokerConf,
    #[serde(default)]
    pub http: HttpConf,
    #[serde(default)]
    pub admission: AdmissionConf,
    #[serde(default)]
    pub publisher: PublisherConf,
    /// Comptes vérifiés par /login (lookup opaque côté store)
    #[serde(default)]
    pub users: Vec<UserConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BrokerConf {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Clé AIO ; surchargée par la variable d'env AIO_KEY si présente
    pub key: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// None = reconnexion sans limite ; Some(n) = état Faulted terminal après n échecs
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for BrokerConf {
    fn default() -> Self {
        Self {
            host: "io.adafruit.com".into(),
            port: 1883,
            username: String::new(),
            key: String::new(),
            client_id: "homelink-gateway".into(),
            keep_alive_secs: 15,
            max_reconnect_attempts: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    pub port: u16,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdmissionConf {
    pub limit: u32,
    pub window_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for AdmissionConf {
    fn default() -> Self {
        Self { limit: 25, window_secs: 60, cooldown_secs: 120 }
    }
}

impl AdmissionConf {
    pub fn settings(&self) -> AdmissionSettings {
        AdmissionSettings {
            limit: self.limit,
            window_interval: Duration::from_secs(self.window_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

/// Publisher périodique de démo (boucle random du dashboard d'origine),
/// désactivé par défaut.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PublisherConf {
    pub enabled: bool,
    pub feed: String,
    pub interval_secs: u64,
    /// true = ne pas renvoyer un payload identique au précédent
    pub skip_duplicates: bool,
}

impl Default for PublisherConf {
    fn default() -> Self {
        Self { enabled: false, feed: "fan".into(), interval_secs: 5, skip_duplicates: false }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserConf {
    pub username: String,
    pub password: String,
}

pub async fn load_config() -> GatewayConfig {
    let path = std::env::var("HOMELINK_CONFIG").unwrap_or_else(|_| "gateway.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            GatewayConfig::default()
        } else {
            serde_yaml::from_str(&txt).unwrap_or_else(|e| {
                warn!("config invalide ({path}): {e}, usage config par défaut");
                GatewayConfig::default()
            })
        }
    } else {
        warn!("pas de {path}, usage config par défaut");
        GatewayConfig::default()
    };
    apply_env_overrides(&mut cfg);
    cfg
}

/// Les credentials broker ne vivent pas dans le yaml versionné
fn apply_env_overrides(cfg: &mut GatewayConfig) {
    if let Ok(username) = std::env::var("AIO_USERNAME") {
        cfg.broker.username = username;
    }
    if let Ok(key) = std::env::var("AIO_KEY") {
        cfg.broker.key = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.broker.host, "io.adafruit.com");
        assert_eq!(cfg.admission.limit, 25);
        assert_eq!(cfg.admission.window_secs, 60);
        assert_eq!(cfg.admission.cooldown_secs, 120);
        assert!(!cfg.publisher.enabled);
        assert!(cfg.broker.max_reconnect_attempts.is_none());
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = r#"
broker:
  host: localhost
  port: 1883
  username: cheems
  key: aio_xxx
  client_id: homelink-dev
  keep_alive_secs: 15
  max_reconnect_attempts: 5
admission:
  limit: 2
  window_secs: 60
  cooldown_secs: 120
"#;
        let cfg: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.broker.host, "localhost");
        assert_eq!(cfg.broker.max_reconnect_attempts, Some(5));
        assert_eq!(cfg.admission.limit, 2);
        // sections absentes -> valeurs par défaut
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.publisher.feed, "fan");
        assert!(cfg.users.is_empty());
    }
}
