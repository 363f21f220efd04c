use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Etat partagé sous exclusion mutuelle (fenêtre d'admission, état connexion...)
pub type Shared<T> = Arc<Mutex<T>>;

/// Etat partagé multi-lecteurs / écrivain unique (cache télémétrie)
pub type SharedRw<T> = Arc<RwLock<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

pub fn new_state_rw<T>(value: T) -> SharedRw<T> {
    Arc::new(RwLock::new(value))
}
