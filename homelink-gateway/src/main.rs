/**
 * HOMELINK GATEWAY - Point d'entrée de la passerelle maison connectée
 *
 * RÔLE : Pont entre le broker télémétrie Adafruit IO (pub/sub persistant)
 * et une API REST, protégée de la surcharge par un contrôle d'admission.
 *
 * ARCHITECTURE : Trois tâches logiques indépendantes : (a) boucle de
 * gestion de connexion broker, (b) serving HTTP concurrent, (c) reset
 * périodique de la fenêtre d'admission. Tout l'état partagé (cache
 * télémétrie, fenêtre d'admission) passe par les APIs des composants,
 * jamais par des références brutes. Pas de globals : le contexte est
 * construit une fois ici puis injecté partout.
 */

mod admission;
mod cache;
mod config;
mod connection;
mod error;
mod feeds;
mod health;
mod http;
mod models;
mod publisher;
mod readiness;
mod state;
mod store;

use crate::admission::AdmissionController;
use crate::cache::TelemetryCache;
use crate::connection::ConnectionManager;
use crate::feeds::FeedRegistry;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::readiness::ReadinessGate;
use crate::store::{DataStore, MemoryStore, UserRecord};

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const ACTIVITY_LOG_CAPACITY: usize = 1000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Variables d'environnement depuis .env (si présent) : AIO_USERNAME, AIO_KEY...
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = config::load_config().await;
    if cfg.broker.username.is_empty() {
        warn!("no broker username configured (AIO_USERNAME), broker link will not come up");
    }

    // contexte construit une fois, injecté dans chaque composant
    let feeds = Arc::new(FeedRegistry::new(&cfg.broker.username));
    let cache = TelemetryCache::new(feeds.len());
    let admission = Arc::new(AdmissionController::new(cfg.admission.settings()));
    let readiness = ReadinessGate::new();
    let health = HealthTracker::new();
    let shutdown = CancellationToken::new();

    // lien broker sur sa propre tâche ; l'API sert le cache pendant ce temps
    let manager = ConnectionManager::spawn(
        &cfg.broker,
        feeds.clone(),
        cache.clone(),
        readiness.clone(),
        health.clone(),
        shutdown.clone(),
    );

    // reset périodique de la fenêtre d'admission
    admission.spawn_window_reset(shutdown.clone());

    // publisher de démo, gated par la readiness (rien avant la 1re session)
    if cfg.publisher.enabled {
        publisher::spawn_demo_publisher(
            manager.clone(),
            feeds.clone(),
            cfg.publisher.clone(),
            readiness.clone(),
            shutdown.clone(),
        );
    }

    let users: Vec<UserRecord> = cfg
        .users
        .iter()
        .map(|u| UserRecord { username: u.username.clone(), password: u.password.clone() })
        .collect();
    let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new(users, ACTIVITY_LOG_CAPACITY));

    let app_state = AppState {
        manager,
        feeds,
        cache,
        admission,
        health,
        store,
    };
    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http.port));
    info!("listening on http://{addr}");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let serve_shutdown = shutdown.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("ctrl-c received, shutting down");
            serve_shutdown.cancel();
        })
        .await
    {
        error!("http server error: {e}");
    }

    // les tâches de fond observent le token et se terminent d'elles-mêmes
    shutdown.cancel();
    Ok(())
}
