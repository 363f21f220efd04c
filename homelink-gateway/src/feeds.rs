/**
 * REGISTRE DES FEEDS - Table statique des canaux télémétrie Adafruit IO
 *
 * RÔLE :
 * L'ensemble des feeds est fermé : 7 canaux logiques définis une fois au
 * démarrage, index stables pour toute la vie du process. Toute lookup par
 * nom hors de cette table est une erreur UnknownFeed.
 *
 * TOPICS :
 * Adafruit IO adresse les feeds en "{username}/feeds/{feed}" ; le registre
 * centralise la construction et le parsing de ces topics.
 */

use crate::error::GatewayError;
use std::collections::HashMap;

/// Liste des devices, dans l'ordre historique du dashboard :
///   "color"       = 0  -- couleur de la lampe
///   "fan"         = 1  -- vitesse du ventilateur
///   "humidity"    = 2  -- capteur d'humidité
///   "light"       = 3  -- capteur de luminosité
///   "switch"      = 4  -- interrupteur lampe on/off
///   "temperature" = 5  -- capteur de température
///   "text"        = 6  -- message affiché sur le dashboard
pub const FEED_NAMES: [&str; 7] = [
    "color", "fan", "humidity", "light", "switch", "temperature", "text",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub name: &'static str,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct FeedRegistry {
    feeds: Vec<Feed>,
    by_name: HashMap<&'static str, usize>,
    username: String,
}

impl FeedRegistry {
    pub fn new(username: &str) -> Self {
        let feeds: Vec<Feed> = FEED_NAMES
            .iter()
            .enumerate()
            .map(|(index, name)| Feed { name, index })
            .collect();
        let by_name = feeds.iter().map(|f| (f.name, f.index)).collect();
        Self { feeds, by_name, username: username.to_string() }
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feed> {
        self.feeds.iter()
    }

    /// Lookup par nom ; l'ensemble étant fermé, tout nom inconnu est rejeté
    pub fn get(&self, name: &str) -> Result<&Feed, GatewayError> {
        self.by_name
            .get(name)
            .map(|&i| &self.feeds[i])
            .ok_or_else(|| GatewayError::UnknownFeed(name.to_string()))
    }

    pub fn by_index(&self, index: usize) -> Option<&Feed> {
        self.feeds.get(index)
    }

    /// Topic MQTT Adafruit IO du feed : "{username}/feeds/{feed}"
    pub fn topic(&self, feed: &Feed) -> String {
        format!("{}/feeds/{}", self.username, feed.name)
    }

    /// Retrouve le feed depuis un topic entrant, None si hors registre
    pub fn feed_from_topic(&self, topic: &str) -> Option<&Feed> {
        let prefix = format!("{}/feeds/", self.username);
        let name = topic.strip_prefix(&prefix)?;
        self.by_name.get(name).map(|&i| &self.feeds[i])
    }
}
