/**
 * PUBLISHER PERIODIQUE - Boucle d'émission synthétique (démo dashboard)
 *
 * RÔLE :
 * Reprend la boucle random du dashboard d'origine : publie une valeur
 * synthétique sur un feed à intervalle fixe. Attend la ReadinessGate avant
 * le premier envoi : rien ne part tant que la connexion broker n'est pas
 * vivante. La politique de déduplication sortante est configurable.
 */

use crate::config::PublisherConf;
use crate::connection::ConnectionManager;
use crate::feeds::FeedRegistry;
use crate::readiness::ReadinessGate;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub fn spawn_demo_publisher(
    manager: Arc<ConnectionManager>,
    feeds: Arc<FeedRegistry>,
    conf: PublisherConf,
    readiness: ReadinessGate,
    shutdown: CancellationToken,
) {
    let feed = match feeds.get(&conf.feed) {
        Ok(feed) => feed.clone(),
        Err(e) => {
            error!("demo publisher disabled: {e}");
            return;
        }
    };

    task::spawn(async move {
        // rien ne part avant la première session broker
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = readiness.wait() => {}
        }

        let mut interval = tokio::time::interval(Duration::from_secs(conf.interval_secs));
        let mut last_sent: Option<String> = None;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let value = rand::rng().random_range(0..=100u32).to_string();
                    if !should_send(conf.skip_duplicates, last_sent.as_deref(), &value) {
                        debug!("duplicate {} on {}, skipped", value, feed.name);
                        continue;
                    }
                    match manager.publish(&feed, &value).await {
                        Ok(()) => last_sent = Some(value),
                        Err(e) => warn!("demo publish failed: {e}"),
                    }
                }
            }
        }
    });
}

fn should_send(skip_duplicates: bool, last_sent: Option<&str>, next: &str) -> bool {
    !(skip_duplicates && last_sent == Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_always_sent_by_default() {
        assert!(should_send(false, Some("42"), "42"));
        assert!(should_send(false, None, "42"));
    }

    #[test]
    fn test_duplicates_skipped_when_configured() {
        assert!(!should_send(true, Some("42"), "42"));
        assert!(should_send(true, Some("41"), "42"));
        assert!(should_send(true, None, "42"));
    }
}
