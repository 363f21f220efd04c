/**
 * ACTIVITY STORE - Collaborateur de persistance, contrat lecture/écriture simple
 *
 * RÔLE :
 * Le coeur de la passerelle ne persiste rien ; ce module définit le contrat
 * opaque attendu du store externe (lookup credentials, append/lecture du
 * journal d'activité) et fournit une implémentation mémoire par défaut.
 *
 * FONCTIONNEMENT :
 * - DataStore trait = interface commune que chaque backend implémente
 * - MemoryStore = backend par défaut, ring borné, reset au restart
 * - Chaque commande publiée par l'API laisse une trace dans le journal
 */

use parking_lot::Mutex;
use std::collections::VecDeque;
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub feed: String,
    pub action: String,
    pub value: String,
    pub at: OffsetDateTime,
}

/// Contrat opaque fail/succeed du store externe
pub trait DataStore: Send + Sync {
    /// Lookup par credentials (select by username)
    fn find_user(&self, username: &str) -> Result<UserRecord, StoreError>;

    /// Insert d'une trace d'activité
    fn append_activity(&self, record: ActivityRecord) -> Result<(), StoreError>;

    /// Lecture des traces les plus récentes, la plus récente d'abord
    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityRecord>, StoreError>;
}

/// Backend mémoire : journal borné, comptes chargés depuis la config
pub struct MemoryStore {
    users: Vec<UserRecord>,
    log: Mutex<VecDeque<ActivityRecord>>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(users: Vec<UserRecord>, capacity: usize) -> Self {
        Self { users, log: Mutex::new(VecDeque::new()), capacity }
    }
}

impl DataStore for MemoryStore {
    fn find_user(&self, username: &str) -> Result<UserRecord, StoreError> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn append_activity(&self, record: ActivityRecord) -> Result<(), StoreError> {
        let mut log = self.log.lock();
        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(record);
        Ok(())
    }

    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityRecord>, StoreError> {
        let log = self.log.lock();
        Ok(log.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str) -> ActivityRecord {
        ActivityRecord {
            feed: "fan".into(),
            action: "publish".into(),
            value: value.into(),
            at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_find_user() {
        let store = MemoryStore::new(
            vec![UserRecord { username: "admin".into(), password: "s3cret".into() }],
            16,
        );
        assert_eq!(store.find_user("admin").unwrap().password, "s3cret");
        assert!(matches!(store.find_user("ghost"), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_recent_activity_newest_first() {
        let store = MemoryStore::new(vec![], 16);
        store.append_activity(record("10")).unwrap();
        store.append_activity(record("20")).unwrap();
        store.append_activity(record("30")).unwrap();
        let recent = store.recent_activity(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].value, "30");
        assert_eq!(recent[1].value, "20");
    }

    #[test]
    fn test_ring_drops_oldest_at_capacity() {
        let store = MemoryStore::new(vec![], 3);
        for v in ["1", "2", "3", "4"] {
            store.append_activity(record(v)).unwrap();
        }
        let all = store.recent_activity(10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.last().unwrap().value, "2");
    }
}
