use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct FanSpeed {
    /// Vitesse de 0 (arrêt) à 100 (max)
    pub speed: u32,
}

#[derive(Debug, Deserialize)]
pub struct ColorRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SampleView {
    pub feed: String,
    pub value: String,
    pub timestamp: String, // RFC3339 pour l'API
}

#[derive(Debug, Serialize)]
pub struct ActivityView {
    pub feed: String,
    pub action: String,
    pub value: String,
    pub at: String,
}
