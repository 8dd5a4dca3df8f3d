use crate::domain::user::UserId;
use dashmap::DashMap;
use opentelemetry::{global, metrics::UpDownCounter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

#[derive(Clone, Debug)]
struct Metrics {
    active_users: UpDownCounter<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("uni-server");
        Self {
            active_users: meter
                .i64_up_down_counter("uni_live_users")
                .with_description("Users holding at least one live connection")
                .build(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    token: CancellationToken,
    connections: usize,
}

/// Tracks live connections per user so sign-out can tear them down.
/// A user's entry lives exactly as long as one of their connections does.
#[derive(Clone, Debug)]
pub struct SessionRegistry {
    slots: Arc<DashMap<UserId, Slot>>,
    generations: Arc<AtomicU64>,
    metrics: Metrics,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Arc::new(DashMap::new()), generations: Arc::new(AtomicU64::new(0)), metrics: Metrics::new() }
    }

    /// Registers one live connection. Dropping the handle unregisters it.
    #[must_use]
    pub fn connect(&self, user_id: &UserId) -> LiveConnection {
        let mut slot = self.slots.entry(user_id.clone()).or_insert_with(|| {
            self.metrics.active_users.add(1, &[]);
            Slot {
                generation: self.generations.fetch_add(1, Ordering::Relaxed),
                token: CancellationToken::new(),
                connections: 0,
            }
        });
        slot.connections += 1;

        LiveConnection {
            token: slot.token.child_token(),
            generation: slot.generation,
            user_id: user_id.clone(),
            registry: self.clone(),
        }
    }

    /// Cancels every live connection of the user.
    pub fn revoke(&self, user_id: &UserId) {
        if let Some((_, slot)) = self.slots.remove(user_id) {
            slot.token.cancel();
            self.metrics.active_users.add(-1, &[]);
            tracing::debug!(user_id = %user_id, connections = slot.connections, "Live connections revoked");
        }
    }

    fn disconnect(&self, user_id: &UserId, generation: u64) {
        let removed = self.slots.remove_if_mut(user_id, |_, slot| {
            if slot.generation != generation {
                return false;
            }
            slot.connections = slot.connections.saturating_sub(1);
            slot.connections == 0
        });
        if removed.is_some() {
            self.metrics.active_users.add(-1, &[]);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// One registered connection; cancelled when its user signs out.
#[derive(Debug)]
pub struct LiveConnection {
    token: CancellationToken,
    generation: u64,
    user_id: UserId,
    registry: SessionRegistry,
}

impl LiveConnection {
    pub fn revoked(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.registry.disconnect(&self.user_id, self.generation);
    }
}
