/**
 * READINESS GATE - Signal one-shot "connexion broker établie"
 *
 * RÔLE :
 * Empêche les tâches dépendantes (publisher périodique notamment) d'envoyer
 * quoi que ce soit avant que le ConnectionManager ait une session vivante.
 * signal() est idempotent ; wait() suspend jusqu'au premier signal puis
 * retourne immédiatement pour tous les appels suivants.
 */

use tokio::sync::watch;

#[derive(Clone)]
pub struct ReadinessGate {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: std::sync::Arc::new(tx), rx }
    }

    /// Marque la connexion comme vivante ; no-op après le premier appel
    pub fn signal(&self) {
        self.tx.send_replace(true);
    }

    /// Suspend jusqu'au signal ; retour immédiat si déjà signalé
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // le sender vit dans self, wait_for ne peut pas échouer tant que la gate existe
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn is_signaled(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_signal() {
        let gate = ReadinessGate::new();
        assert!(!gate.is_signaled());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        gate.signal();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should unblock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_immediate_when_already_signaled() {
        let gate = ReadinessGate::new();
        gate.signal();
        gate.signal(); // idempotent
        tokio::time::timeout(Duration::from_millis(50), gate.wait())
            .await
            .expect("wait should return immediately");
        assert!(gate.is_signaled());
    }

    #[tokio::test]
    async fn test_wait_blocks_before_signal() {
        let gate = ReadinessGate::new();
        let res = tokio::time::timeout(Duration::from_millis(50), gate.wait()).await;
        assert!(res.is_err(), "wait must suspend until signal");
    }
}
