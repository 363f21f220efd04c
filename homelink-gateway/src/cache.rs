/**
 * CACHE TELEMETRIE - Dernière valeur observée par feed
 *
 * RÔLE :
 * Un slot par feed, écrasé à chaque message entrant. Seul le chemin inbound
 * du ConnectionManager écrit ; les handlers API ne font que lire.
 *
 * CONCURRENCE :
 * Remplacement atomique du slot (swap d'Arc sous RwLock), jamais de mutation
 * de champs en place : un lecteur ne peut pas observer un sample partiel.
 * Les lectures retournent un snapshot cloné, jamais une référence vive.
 * Les valeurs survivent aux déconnexions broker (stale-but-available).
 */

use crate::state::{new_state_rw, SharedRw};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct TelemetrySample {
    pub feed_index: usize,
    pub feed_name: String,
    pub value: String,
    pub observed_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct TelemetryCache {
    slots: SharedRw<Vec<Option<Arc<TelemetrySample>>>>,
}

impl TelemetryCache {
    pub fn new(feed_count: usize) -> Self {
        Self { slots: new_state_rw(vec![None; feed_count]) }
    }

    /// Snapshot du dernier sample pour un feed, None tant qu'aucun message reçu
    pub fn get(&self, feed_index: usize) -> Option<Arc<TelemetrySample>> {
        self.slots.read().get(feed_index)?.clone()
    }

    /// Ecriture réservée au chemin inbound du ConnectionManager
    pub(crate) fn set(&self, sample: TelemetrySample) {
        let index = sample.feed_index;
        let mut slots = self.slots.write();
        if index < slots.len() {
            slots[index] = Some(Arc::new(sample));
        }
    }

    /// Nombre de feeds ayant au moins un sample (pour le health)
    pub fn samples_present(&self) -> usize {
        self.slots.read().iter().filter(|s| s.is_some()).count()
    }
}
