//! Shared helpers for behavioral specs

pub use cosync_chan::{after, Channel, ChannelError, Select};
pub use cosync_core::{MemoryStore, SharedStore};
pub use cosync_lock::{
    Lock, LockError, LockOptions, Mutex, MutexConfig, RwMutex, RwMutexConfig, Semaphore,
    SemaphoreConfig,
};
pub use std::sync::Arc;
pub use std::time::Duration;

/// A fresh in-memory store
pub fn store() -> SharedStore {
    Arc::new(MemoryStore::new())
}

/// Spin fast so distributed specs stay quick
pub const SPIN: Duration = Duration::from_millis(1);

/// Let spawned tasks run until they park
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
