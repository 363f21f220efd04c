/**
 * CONTRÔLE D'ADMISSION - Fenêtre fixe avec escalade en cooldown
 *
 * RÔLE :
 * Borne le débit de requêtes admises vers les handlers (et donc vers le
 * broker et le store externe). Au-delà de `limit` requêtes dans la fenêtre
 * courante, un cooldown est imposé : tout appel pendant le cooldown est
 * rejeté immédiatement avec un hint retry-after. Politique reject-now,
 * jamais de mise en file.
 *
 * CONCURRENCE :
 * Toute la fenêtre (compteur + cooldown) vit sous un unique mutex, partagé
 * entre les requêtes et la tâche périodique de reset : pas de double reset,
 * pas de sur-admission. Aucune I/O sous le verrou.
 */

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    pub limit: u32,
    pub window_interval: Duration,
    pub cooldown: Duration,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            limit: 25,
            window_interval: Duration::from_secs(60),
            cooldown: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admitted,
    Throttled { retry_after: Duration },
}

#[derive(Debug)]
struct AdmissionWindow {
    count: u32,
    cooldown_until: Option<Instant>,
}

pub struct AdmissionController {
    settings: AdmissionSettings,
    window: Mutex<AdmissionWindow>,
    throttled_total: AtomicU64,
}

impl AdmissionController {
    pub fn new(settings: AdmissionSettings) -> Self {
        Self {
            settings,
            window: Mutex::new(AdmissionWindow { count: 0, cooldown_until: None }),
            throttled_total: AtomicU64::new(0),
        }
    }

    /// Vérifie l'admission d'une requête entrante
    pub fn admit(&self) -> Decision {
        self.admit_at(Instant::now())
    }

    // Variante à horloge injectée, partagée par admit() et les tests
    pub(crate) fn admit_at(&self, now: Instant) -> Decision {
        let mut w = self.window.lock();
        if let Some(until) = w.cooldown_until {
            if now < until {
                self.throttled_total.fetch_add(1, Ordering::Relaxed);
                return Decision::Throttled { retry_after: until - now };
            }
            // cooldown expiré : on repart sur une fenêtre vierge
            w.cooldown_until = None;
            w.count = 0;
        }
        if w.count >= self.settings.limit {
            w.cooldown_until = Some(now + self.settings.cooldown);
            self.throttled_total.fetch_add(1, Ordering::Relaxed);
            return Decision::Throttled { retry_after: self.settings.cooldown };
        }
        w.count += 1;
        Decision::Admitted
    }

    /// Reset périodique de la fenêtre ; sans effet tant qu'un cooldown court
    pub fn reset_window(&self) {
        let mut w = self.window.lock();
        if w.cooldown_until.is_none() {
            w.count = 0;
        }
    }

    pub fn throttled_total(&self) -> u64 {
        self.throttled_total.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn window_count(&self) -> u32 {
        self.window.lock().count
    }

    /// Démarre la tâche de reset périodique (une par process)
    pub fn spawn_window_reset(self: &Arc<Self>, shutdown: CancellationToken) {
        let controller = self.clone();
        task::spawn(async move {
            let mut interval = tokio::time::interval(controller.settings.window_interval);
            interval.tick().await; // le premier tick est immédiat
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        controller.reset_window();
                        debug!("admission window reset");
                    }
                }
            }
        });
    }
}
