/**
 * API REST HOMELINK - Couche HTTP de la passerelle
 *
 * RÔLE :
 * Expose les feeds en lecture (cache télémétrie) et en commande (publish
 * broker). Pure orchestration : aucune logique métier ici, les handlers
 * délèguent au ConnectionManager, au cache et au store.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes /sensor, /fan, /light, /text, /login, /activitylog
 * - Gate d'admission en middleware : chaque requête entrante passe par
 *   AdmissionController.admit() avant tout handler ; rejet en 429 +
 *   Retry-After pendant les bursts (/health reste hors budget)
 * - Erreurs structurées GatewayError → status codes (503/502/429/400...)
 */

use crate::admission::{AdmissionController, Decision};
use crate::cache::TelemetryCache;
use crate::connection::ConnectionManager;
use crate::error::GatewayError;
use crate::feeds::FeedRegistry;
use crate::health::{GatewayHealth, HealthTracker};
use crate::models::{ActivityView, ColorRequest, FanSpeed, LoginRequest, SampleView, TextRequest};
use crate::store::{ActivityRecord, DataStore, StoreError};
use axum::extract::{Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub feeds: Arc<FeedRegistry>,
    pub cache: TelemetryCache,
    pub admission: Arc<AdmissionController>,
    pub health: HealthTracker,
    pub store: Arc<dyn DataStore>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/sensor/{feed}/latest", get(get_latest_sample))
        .route("/fan/on", post(fan_on))
        .route("/fan/off", post(fan_off))
        .route("/light/switch/on", post(light_switch_on))
        .route("/light/switch/off", post(light_switch_off))
        .route("/light/color", post(light_color))
        .route("/text", post(display_text))
        .route("/login", post(login))
        .route("/activitylog/recent", get(recent_activity))
        .with_state(app_state.clone())
        .layer(middleware::from_fn_with_state(app_state, admission_gate))
}

/// Gate d'admission : invoquée une fois par requête, avant tout handler
async fn admission_gate(State(app): State<AppState>, req: Request, next: Next) -> Response {
    // le liveness check ne consomme pas le budget d'admission
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }
    match app.admission.admit() {
        Decision::Admitted => next.run(req).await,
        Decision::Throttled { retry_after } => {
            GatewayError::Throttled { retry_after }.into_response()
        }
    }
}

// publish + trace d'activité ; l'échec du journal n'annule pas la commande
async fn publish_and_log(
    app: &AppState,
    feed_name: &str,
    action: &str,
    value: &str,
) -> Result<(), GatewayError> {
    let feed = app.feeds.get(feed_name)?.clone();
    app.manager.publish(&feed, value).await?;
    let record = ActivityRecord {
        feed: feed_name.to_string(),
        action: action.to_string(),
        value: value.to_string(),
        at: OffsetDateTime::now_utc(),
    };
    if let Err(e) = app.store.append_activity(record) {
        warn!("activity log write failed: {e}");
    }
    Ok(())
}

// GET /sensor/{feed}/latest (dernier sample en cache)
async fn get_latest_sample(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SampleView>, GatewayError> {
    let feed = app.feeds.get(&name)?;
    let sample = app.cache.get(feed.index).ok_or_else(|| GatewayError::NoSample(name.clone()))?;
    Ok(Json(SampleView {
        feed: name,
        value: sample.value.clone(),
        timestamp: sample.observed_at.format(&Rfc3339).unwrap_or_default(),
    }))
}

// POST /fan/on (vitesse 0..=100)
async fn fan_on(
    State(app): State<AppState>,
    Json(body): Json<FanSpeed>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    if body.speed > 100 {
        return Err(GatewayError::InvalidPayload(format!(
            "fan speed {} out of range 0..=100",
            body.speed
        )));
    }
    publish_and_log(&app, "fan", "fan/on", &body.speed.to_string()).await?;
    Ok(Json(serde_json::json!({ "message": format!("Fan turned on at speed {}", body.speed) })))
}

// POST /fan/off
async fn fan_off(State(app): State<AppState>) -> Result<Json<serde_json::Value>, GatewayError> {
    publish_and_log(&app, "fan", "fan/off", "0").await?;
    Ok(Json(serde_json::json!({ "message": "Success" })))
}

// POST /light/switch/on
async fn light_switch_on(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    publish_and_log(&app, "switch", "light/on", "1").await?;
    Ok(Json(serde_json::json!({ "message": "Success" })))
}

// POST /light/switch/off
async fn light_switch_off(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    publish_and_log(&app, "switch", "light/off", "0").await?;
    Ok(Json(serde_json::json!({ "message": "Success" })))
}

// POST /light/color
async fn light_color(
    State(app): State<AppState>,
    Json(body): Json<ColorRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    publish_and_log(&app, "color", "light/color", &body.code).await?;
    Ok(Json(serde_json::json!({ "message": "Success" })))
}

// POST /text (message affiché sur le dashboard)
async fn display_text(
    State(app): State<AppState>,
    Json(body): Json<TextRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    publish_and_log(&app, "text", "text", &body.message).await?;
    Ok(Json(serde_json::json!({ "message": "Success" })))
}

// POST /login (credentials vérifiés par lookup externe, réponse opaque)
async fn login(
    State(app): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let user = match app.store.find_user(&body.username) {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(GatewayError::Unauthorized),
        Err(e) => return Err(e.into()),
    };
    if user.password != body.password {
        return Err(GatewayError::Unauthorized);
    }
    Ok(Json(serde_json::json!({ "message": "Success" })))
}

// GET /activitylog/recent?limit=N
async fn recent_activity(
    State(app): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ActivityView>>, GatewayError> {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(100);
    let records = app.store.recent_activity(limit)?;
    let views = records
        .into_iter()
        .map(|r| ActivityView {
            feed: r.feed,
            action: r.action,
            value: r.value,
            at: r.at.format(&Rfc3339).unwrap_or_default(),
        })
        .collect();
    Ok(Json(views))
}

// GET /system/health (état infrastructure)
async fn get_system_health(State(app): State<AppState>) -> Json<GatewayHealth> {
    Json(app.health.get_health(&app.cache, &app.admission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionSettings;
    use crate::config::BrokerConf;
    use crate::readiness::ReadinessGate;
    use crate::store::{MemoryStore, UserRecord};

    // l'eventloop est retournée pour rester vivante pendant le test
    fn test_state() -> (AppState, rumqttc::EventLoop) {
        let feeds = Arc::new(FeedRegistry::new("cheems"));
        let cache = TelemetryCache::new(feeds.len());
        let health = HealthTracker::new();
        let (manager, eventloop) = ConnectionManager::new(
            &BrokerConf { username: "cheems".into(), ..BrokerConf::default() },
            feeds.clone(),
            cache.clone(),
            ReadinessGate::new(),
            health.clone(),
        );
        let store = Arc::new(MemoryStore::new(
            vec![UserRecord { username: "admin".into(), password: "s3cret".into() }],
            64,
        ));
        let state = AppState {
            manager,
            feeds,
            cache,
            admission: Arc::new(AdmissionController::new(AdmissionSettings::default())),
            health,
            store,
        };
        (state, eventloop)
    }

    #[tokio::test]
    async fn test_latest_sample_unknown_feed_then_no_sample() {
        let (app, _eventloop) = test_state();
        let err = get_latest_sample(State(app.clone()), Path("garage".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownFeed(_)));

        let err = get_latest_sample(State(app), Path("temperature".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoSample(_)));
    }

    #[tokio::test]
    async fn test_latest_sample_served_from_cache() {
        let (app, _eventloop) = test_state();
        app.manager.on_message("cheems/feeds/temperature", b"27.5");
        let Json(view) = get_latest_sample(State(app), Path("temperature".into()))
            .await
            .unwrap();
        assert_eq!(view.value, "27.5");
        assert!(!view.timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_fan_speed_validated_before_publish() {
        let (app, _eventloop) = test_state();
        let err = fan_on(State(app), Json(FanSpeed { speed: 150 })).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_commands_rejected_while_disconnected() {
        let (app, _eventloop) = test_state();
        let err = fan_off(State(app)).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConnected));
    }

    #[tokio::test]
    async fn test_command_publishes_and_logs_activity() {
        let (app, _eventloop) = test_state();
        app.manager.on_connect().await;
        let Json(resp) = fan_on(State(app.clone()), Json(FanSpeed { speed: 80 })).await.unwrap();
        assert_eq!(resp["message"], "Fan turned on at speed 80");
        let Json(log) = recent_activity(State(app), Query(HashMap::new())).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].feed, "fan");
        assert_eq!(log[0].value, "80");
    }

    struct FlakyStore;

    impl DataStore for FlakyStore {
        fn find_user(&self, _username: &str) -> Result<UserRecord, StoreError> {
            Err(StoreError::Unavailable("backend offline".into()))
        }
        fn append_activity(&self, _record: ActivityRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("backend offline".into()))
        }
        fn recent_activity(&self, _limit: usize) -> Result<Vec<ActivityRecord>, StoreError> {
            Err(StoreError::Unavailable("backend offline".into()))
        }
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_as_store_error() {
        let (mut app, _eventloop) = test_state();
        app.store = Arc::new(FlakyStore);

        let body = LoginRequest { username: "admin".into(), password: "s3cret".into() };
        let err = login(State(app.clone()), Json(body)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Store(StoreError::Unavailable(_))));

        let err = recent_activity(State(app), Query(HashMap::new())).await.unwrap_err();
        assert!(matches!(err, GatewayError::Store(_)));
    }

    #[tokio::test]
    async fn test_login_checks_credentials() {
        let (app, _eventloop) = test_state();
        let body = LoginRequest { username: "admin".into(), password: "s3cret".into() };
        login(State(app.clone()), Json(body)).await.unwrap();

        let bad = LoginRequest { username: "admin".into(), password: "wrong".into() };
        let err = login(State(app.clone()), Json(bad)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized));

        let ghost = LoginRequest { username: "ghost".into(), password: "x".into() };
        let err = login(State(app), Json(ghost)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized));
    }
}
