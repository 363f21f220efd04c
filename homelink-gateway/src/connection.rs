/**
 * CONNECTION MANAGER - Lien persistant unique vers le broker Adafruit IO
 *
 * RÔLE :
 * Possède le client MQTT et sa boucle d'événements sur une tâche dédiée.
 * Machine à états Disconnected → Connecting → Connected → Faulted, avec
 * reconnexion en backoff exponentiel (+ jitter) : une coupure broker n'est
 * jamais fatale au process, le cache reste servable pendant la reconnexion.
 *
 * FONCTIONNEMENT :
 * - ConnAck => souscription à tous les feeds du registre, signal readiness
 * - Publish entrant => lookup feed (drop + log si topic hors registre),
 *   écriture du sample dans le cache (seul chemin d'écriture du cache)
 * - Erreur transport => état Faulted, retry après backoff ; budget optionnel
 *   au-delà duquel l'état Faulted devient terminal (surfacé dans le health)
 *
 * PUBLISH :
 * Refusé en NotConnected hors session vivante ; les erreurs transport
 * remontent en UpstreamUnavailable, jamais retentées ici (politique de
 * retry au caller). La sérialisation sortante passe par le canal de
 * requêtes du client : discipline single-writer sur le transport.
 */

use crate::cache::{TelemetryCache, TelemetrySample};
use crate::config::BrokerConf;
use crate::error::GatewayError;
use crate::feeds::{Feed, FeedRegistry};
use crate::health::HealthTracker;
use crate::readiness::ReadinessGate;
use crate::state::{new_state, Shared};
use rand::Rng;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const BACKOFF_JITTER: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Faulted,
}

pub struct ConnectionManager {
    client: AsyncClient,
    state: Shared<ConnectionState>,
    feeds: Arc<FeedRegistry>,
    cache: TelemetryCache,
    readiness: ReadinessGate,
    health: HealthTracker,
}

impl ConnectionManager {
    pub fn new(
        conf: &BrokerConf,
        feeds: Arc<FeedRegistry>,
        cache: TelemetryCache,
        readiness: ReadinessGate,
        health: HealthTracker,
    ) -> (Arc<Self>, EventLoop) {
        let mut opts = MqttOptions::new(&conf.client_id, &conf.host, conf.port);
        opts.set_keep_alive(Duration::from_secs(conf.keep_alive_secs));
        if !conf.username.is_empty() {
            opts.set_credentials(&conf.username, &conf.key);
        }
        let (client, eventloop) = AsyncClient::new(opts, 32);
        let manager = Arc::new(Self {
            client,
            state: new_state(ConnectionState::Disconnected),
            feeds,
            cache,
            readiness,
            health,
        });
        (manager, eventloop)
    }

    /// Démarre le cycle de vie connexion sur sa propre tâche ; retour immédiat
    pub fn spawn(
        conf: &BrokerConf,
        feeds: Arc<FeedRegistry>,
        cache: TelemetryCache,
        readiness: ReadinessGate,
        health: HealthTracker,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let max_attempts = conf.max_reconnect_attempts;
        let (manager, eventloop) = Self::new(conf, feeds, cache, readiness, health);
        let runner = manager.clone();
        task::spawn(async move { runner.run(eventloop, max_attempts, shutdown).await });
        manager
    }

    async fn run(
        &self,
        mut eventloop: EventLoop,
        max_attempts: Option<u32>,
        shutdown: CancellationToken,
    ) {
        *self.state.lock() = ConnectionState::Connecting;
        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, closing broker link");
                    let _ = self.client.disconnect().await;
                    *self.state.lock() = ConnectionState::Disconnected;
                    break;
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        attempt = 0;
                        self.on_connect().await;
                    }
                    Ok(Event::Incoming(Incoming::Publish(p))) => {
                        self.on_message(&p.topic, &p.payload);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.on_disconnect(&e.to_string());
                        attempt += 1;
                        if let Some(max) = max_attempts {
                            if attempt > max {
                                self.health.mark_broker_faulted();
                                error!("reconnect budget exhausted after {max} attempts, giving up");
                                break;
                            }
                        }
                        let delay = backoff_delay(attempt);
                        warn!("broker reconnect attempt {attempt} in {:?}", delay);
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        *self.state.lock() = ConnectionState::Connecting;
                        self.health.mark_broker_reconnecting();
                    }
                }
            }
        }
    }

    /// Session établie : souscription à tout le registre, ouverture de la gate
    pub async fn on_connect(&self) {
        info!("connected to broker");
        for feed in self.feeds.iter() {
            let topic = self.feeds.topic(feed);
            if let Err(e) = self.client.subscribe(&topic, QoS::AtLeastOnce).await {
                error!("subscribe {topic} failed: {e}");
            }
        }
        *self.state.lock() = ConnectionState::Connected;
        self.health.mark_broker_connected();
        self.readiness.signal();
    }

    /// Message entrant : seul point d'écriture du cache télémétrie.
    /// Un topic hors registre est le seul soft-fail toléré (log + drop).
    pub fn on_message(&self, topic: &str, payload: &[u8]) {
        let Some(feed) = self.feeds.feed_from_topic(topic) else {
            warn!("message on unknown topic {topic}, dropped");
            return;
        };
        let Ok(value) = std::str::from_utf8(payload) else {
            warn!("non-utf8 payload on {topic}, dropped");
            return;
        };
        debug!("received {} = {}", feed.name, value);
        self.cache.set(TelemetrySample {
            feed_index: feed.index,
            feed_name: feed.name.to_string(),
            value: value.to_string(),
            observed_at: OffsetDateTime::now_utc(),
        });
    }

    /// Coupure transport : jamais de sys.exit, le cache garde ses valeurs
    pub fn on_disconnect(&self, reason: &str) {
        error!("broker link lost: {reason}");
        *self.state.lock() = ConnectionState::Faulted;
    }

    /// Publie une valeur sur un feed ; pas de retry interne
    pub async fn publish(&self, feed: &Feed, value: &str) -> Result<(), GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::NotConnected);
        }
        let topic = self.feeds.topic(feed);
        debug!("publishing {} to {}", value, topic);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, value.to_string())
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))
    }

    /// Snapshot non bloquant de l'état de connexion
    pub fn is_connected(&self) -> bool {
        *self.state.lock() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }
}

/// Délai avant la tentative `attempt` (1-based) : exponentiel borné + jitter
fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let raw = BACKOFF_BASE.as_secs_f64() * 2f64.powi(exp as i32);
    let capped = raw.min(BACKOFF_CAP.as_secs_f64());
    let jitter = rand::rng().random_range(1.0 - BACKOFF_JITTER..=1.0 + BACKOFF_JITTER);
    Duration::from_secs_f64(capped * jitter)
}
