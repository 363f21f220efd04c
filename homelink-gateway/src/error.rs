/**
 * ERREURS GATEWAY - Taxonomie des erreurs exposées par la passerelle
 *
 * RÔLE :
 * Résultats structurés plutôt qu'exceptions : chaque handler retourne un
 * GatewayError que la couche HTTP traduit en status code. Les fautes
 * transport internes (reconnexion) ne sortent jamais d'ici directement,
 * elles se manifestent en NotConnected pendant la reconnexion.
 */

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Publish tenté alors que la connexion broker n'est pas établie
    #[error("broker connection not established")]
    NotConnected,
    /// Echec transport pendant un publish/subscribe, jamais avalé silencieusement
    #[error("upstream broker unavailable: {0}")]
    UpstreamUnavailable(String),
    /// Admission refusée, avec indication de retry pour le client
    #[error("too many requests, retry in {}s", retry_after.as_secs())]
    Throttled { retry_after: Duration },
    /// Nom de feed hors du registre (l'ensemble des feeds est fermé)
    #[error("unknown feed: {0}")]
    UnknownFeed(String),
    /// Aucun message encore reçu pour ce feed (distinct d'une valeur périmée)
    #[error("no sample received yet for feed {0}")]
    NoSample(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UnknownFeed(_) => StatusCode::BAD_REQUEST,
            GatewayError::NoSample(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        let mut resp = (status, body).into_response();
        if let GatewayError::Throttled { retry_after } = self {
            // arrondi à la seconde supérieure, jamais 0 pour un client qui retry
            let secs = retry_after.as_secs().max(1);
            resp.headers_mut()
                .insert(header::RETRY_AFTER, axum::http::HeaderValue::from(secs));
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::NotConnected.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            GatewayError::UpstreamUnavailable("timeout".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::UnknownFeed("porte".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::NoSample("temperature".into()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_throttled_response_carries_retry_after() {
        let err = GatewayError::Throttled { retry_after: Duration::from_secs(120) };
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "120");
    }

    #[test]
    fn test_throttled_retry_after_never_zero() {
        let err = GatewayError::Throttled { retry_after: Duration::from_millis(200) };
        let resp = err.into_response();
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }
}
