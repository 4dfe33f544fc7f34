use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// A payload consumer. `M` carries what the layer below knows about the payload: where it came
/// from and when it arrived.
pub type Handler<M> = Arc<dyn Fn(&[u8], &M) + Send + Sync>;

/// Maps a protocol key to the one handler that consumes payloads carrying it.
///
/// Registering a key that already has a handler replaces it: the last registration wins.
/// There is no removal. A handler runs on the thread that dispatched to it, outside the
/// registry's lock, so handlers may block or register other handlers.
pub struct Registry<K, M> {
    name: &'static str,
    handlers: RwLock<HashMap<K, Handler<M>>>,
}

impl<K, M> Registry<K, M>
where
    K: Copy + Eq + Hash + Debug,
{
    pub fn new(name: &'static str) -> Self {
        Registry {
            name,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<F>(&self, key: K, handler: F)
    where
        F: Fn(&[u8], &M) + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if handlers.insert(key, Arc::new(handler)).is_some() {
            debug!(registry = self.name, key = ?key, "replaced handler");
        }
    }

    /// Hands `payload` to the handler for `key`. Returns false, having done nothing, when no
    /// handler is registered.
    pub fn dispatch(&self, key: K, payload: &[u8], meta: &M) -> bool {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();

        match handler {
            Some(handler) => {
                handler(payload, meta);
                true
            }
            None => {
                trace!(registry = self.name, key = ?key, "no handler registered");
                false
            }
        }
    }

    pub fn is_registered(&self, key: K) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }
}
