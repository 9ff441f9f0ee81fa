//! Shared per-server state: the client registry, ownership, and the
//! small bundle of configuration/progress fields every session and the
//! simulation manager both read.

use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::sim_manager::SimState;
use crate::world::WorldKind;

pub type ClientId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalMode {
    Interactive,
    Summary,
}

pub struct ClientHandle {
    pub id: ClientId,
    pub pid: u32,
    pub stream: UnixStream,
}

const MAX_CLIENTS: usize = 32;

/// Fixed-capacity table of joined connections plus an optional owner.
/// Guarded independently of `Config` so a broadcast that walks the
/// client list never needs the configuration lock.
pub struct ClientRegistry {
    clients: Mutex<Vec<ClientHandle>>,
    owner: Mutex<Option<ClientId>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        ClientRegistry { clients: Mutex::new(Vec::with_capacity(MAX_CLIENTS)), owner: Mutex::new(None), next_id: AtomicU64::new(1) }
    }

    /// Register a connection, making it owner if no owner is currently set.
    /// Fails once `MAX_CLIENTS` are registered.
    pub fn register(&self, pid: u32, stream: UnixStream) -> Option<ClientId> {
        let mut clients = self.clients.lock().unwrap();
        if clients.len() >= MAX_CLIENTS {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        clients.push(ClientHandle { id, pid, stream });
        drop(clients);

        let mut owner = self.owner.lock().unwrap();
        if owner.is_none() {
            *owner = Some(id);
        }
        Some(id)
    }

    /// Idempotent: unregistering an id that isn't present is a no-op.
    /// If the departing client was owner, ownership passes to whichever
    /// client remains first in join order, or is cleared if none remain.
    pub fn unregister(&self, id: ClientId) {
        let mut clients = self.clients.lock().unwrap();
        clients.retain(|c| c.id != id);
        let next_owner = clients.first().map(|c| c.id);
        drop(clients);

        let mut owner = self.owner.lock().unwrap();
        if *owner == Some(id) {
            *owner = next_owner;
        }
    }

    pub fn owner(&self) -> Option<ClientId> {
        *self.owner.lock().unwrap()
    }

    pub fn can_control(&self, id: ClientId) -> bool {
        match self.owner() {
            None => true,
            Some(owner_id) => owner_id == id,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `f` for every registered client while holding the registry
    /// lock. `f` must not call back into the registry or block on a
    /// per-connection lock, or it will deadlock against a concurrent
    /// register/unregister.
    pub fn for_each_client<F: FnMut(&ClientHandle)>(&self, mut f: F) {
        let clients = self.clients.lock().unwrap();
        for c in clients.iter() {
            f(c);
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub world_kind: WorldKind,
    pub width: u32,
    pub height: u32,
    pub probs: [f64; 4],
    pub k_max_steps: u32,
    pub total_reps: u32,
    pub current_rep: u32,
    pub sim_state: SimState,
    pub global_mode: GlobalMode,
    pub multi_user: bool,
}

impl ConfigState {
    pub fn new(world_kind: WorldKind, width: u32, height: u32) -> Self {
        ConfigState {
            world_kind,
            width,
            height,
            probs: [0.25, 0.25, 0.25, 0.25],
            k_max_steps: 0,
            total_reps: 0,
            current_rep: 0,
            sim_state: SimState::Lobby,
            global_mode: GlobalMode::Interactive,
            multi_user: false,
        }
    }
}

/// The full shared server state: registry plus configuration/progress,
/// each behind its own lock. Code that needs both must acquire the
/// registry lock first and release it before taking the config lock;
/// the reverse order is forbidden.
pub struct ServerContext {
    pub registry: ClientRegistry,
    config: Mutex<ConfigState>,
}

impl ServerContext {
    pub fn new(world_kind: WorldKind, width: u32, height: u32) -> Self {
        ServerContext { registry: ClientRegistry::new(), config: Mutex::new(ConfigState::new(world_kind, width, height)) }
    }

    pub fn with_config<R>(&self, f: impl FnOnce(&ConfigState) -> R) -> R {
        f(&self.config.lock().unwrap())
    }

    pub fn with_config_mut<R>(&self, f: impl FnOnce(&mut ConfigState) -> R) -> R {
        f(&mut self.config.lock().unwrap())
    }

    pub fn client_can_control(&self, id: ClientId) -> bool {
        self.registry.can_control(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream as Stream;

    fn pair() -> (Stream, Stream) {
        Stream::pair().unwrap()
    }

    #[test]
    fn first_joiner_becomes_owner() {
        let reg = ClientRegistry::new();
        let (a, _keep_a) = pair();
        let id_a = reg.register(100, a).unwrap();
        assert_eq!(reg.owner(), Some(id_a));
        assert!(reg.can_control(id_a));
    }

    #[test]
    fn ownership_passes_on_owner_disconnect() {
        let reg = ClientRegistry::new();
        let (a, _ka) = pair();
        let (b, _kb) = pair();
        let id_a = reg.register(100, a).unwrap();
        let id_b = reg.register(200, b).unwrap();
        assert_eq!(reg.owner(), Some(id_a));
        reg.unregister(id_a);
        assert_eq!(reg.owner(), Some(id_b));
        assert!(reg.can_control(id_b));
        assert!(!reg.can_control(id_a));
    }

    #[test]
    fn unregister_is_idempotent() {
        let reg = ClientRegistry::new();
        reg.unregister(999);
        reg.unregister(999);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn registry_rejects_past_capacity() {
        let reg = ClientRegistry::new();
        let mut kept = Vec::new();
        for i in 0..MAX_CLIENTS {
            let (a, b) = pair();
            kept.push(b);
            assert!(reg.register(i as u32, a).is_some());
        }
        let (overflow, _keep) = pair();
        assert!(reg.register(999, overflow).is_none());
    }
}
