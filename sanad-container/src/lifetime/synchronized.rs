//! Synchronized lifetime slots.
//!
//! A [`SyncSlot`] moves through `Empty → Resolving → Populated`. The first
//! thread to [`acquire`](SyncSlot::acquire) an empty slot becomes its
//! builder and receives a [`BuildGuard`]; every other thread waits on the
//! slot's condition variable until the builder either publishes a value
//! ([`BuildGuard::complete`]) or gives up (guard dropped → [`SyncSlot::recover`]).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::{Attachment, Lifetime, LifetimeKind, LifetimeManager, LifetimeScope};
use crate::value::Value;

#[derive(Default)]
struct SlotState {
    value: Option<Value>,
    builder: Option<ThreadId>,
}

/// Lock-protected value cell with a single builder at a time.
#[derive(Default)]
pub struct SyncSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

/// Outcome of [`SyncSlot::acquire`].
pub enum Acquired<'a> {
    /// The slot is populated.
    Ready(Value),
    /// The caller must build the value.
    Build(BuildGuard<'a>),
}

/// Why a slot could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    /// Another thread kept building for longer than the timeout.
    Timeout(Duration),
    /// The calling thread is already building this slot.
    Reentrant,
}

impl SyncSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value, or makes the caller the builder.
    ///
    /// Blocks while another thread is building, at most `timeout` when set.
    pub fn acquire(&self, timeout: Option<Duration>) -> Result<Acquired<'_>, AcquireError> {
        let me = thread::current().id();
        let started = Instant::now();
        let mut state = self.state.lock();

        loop {
            if let Some(value) = &state.value {
                return Ok(Acquired::Ready(value.clone()));
            }

            match state.builder {
                None => {
                    state.builder = Some(me);
                    return Ok(Acquired::Build(BuildGuard {
                        slot: self,
                        completed: false,
                    }));
                }
                Some(owner) if owner == me => return Err(AcquireError::Reentrant),
                Some(_) => match timeout {
                    None => self.ready.wait(&mut state),
                    Some(limit) => {
                        let timed_out = self.ready.wait_until(&mut state, started + limit).timed_out();
                        if timed_out && state.value.is_none() && state.builder.is_some() {
                            return Err(AcquireError::Timeout(started.elapsed()));
                        }
                    }
                },
            }
        }
    }

    /// Stores `value`, releases the builder and wakes waiters.
    pub fn set_value(&self, value: Value) {
        let mut state = self.state.lock();
        state.value = Some(value);
        state.builder = None;
        self.ready.notify_all();
    }

    /// Releases the slot after a failed build. Idempotent.
    ///
    /// Only the building thread releases; calls from other threads and
    /// repeated calls are no-ops.
    pub fn recover(&self) {
        let mut state = self.state.lock();
        if state.builder == Some(thread::current().id()) {
            state.builder = None;
            trace!("Released synchronized slot after failed build");
            self.ready.notify_all();
        }
    }

    /// Current value without blocking.
    pub fn value(&self) -> Option<Value> {
        self.state.lock().value.clone()
    }

    pub fn clear(&self) {
        self.state.lock().value = None;
    }

    pub fn is_building(&self) -> bool {
        self.state.lock().builder.is_some()
    }
}

impl fmt::Debug for SyncSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SyncSlot")
            .field("populated", &state.value.is_some())
            .field("building", &state.builder.is_some())
            .finish()
    }
}

/// Exclusive right to build a slot's value.
///
/// Dropping the guard without calling [`complete`](Self::complete)
/// releases the slot, so waiters never deadlock on a failed build.
pub struct BuildGuard<'a> {
    slot: &'a SyncSlot,
    completed: bool,
}

impl BuildGuard<'_> {
    /// Publishes the built value.
    pub fn complete(mut self, value: Value) {
        self.completed = true;
        self.slot.set_value(value);
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.slot.recover();
        }
    }
}

/// Singleton lifetime: one value per registration, built once.
#[derive(Debug, Default)]
pub struct ContainerControlledLifetime {
    slot: Arc<SyncSlot>,
    timeout: Option<Duration>,
    attachment: Attachment,
}

impl ContainerControlledLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how long other threads wait for the builder.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

impl LifetimeManager for ContainerControlledLifetime {
    fn kind(&self) -> LifetimeKind {
        LifetimeKind::Synchronized
    }

    fn lifetime(&self) -> Lifetime {
        Lifetime::Singleton
    }

    fn get_value(&self, _scope: &LifetimeScope) -> Option<Value> {
        self.slot.value()
    }

    fn set_value(&self, value: Value, _scope: &LifetimeScope) {
        self.slot.set_value(value);
    }

    fn remove_value(&self, _scope: &LifetimeScope) {
        self.slot.clear();
    }

    fn slot(&self, _scope: &LifetimeScope) -> Option<Arc<SyncSlot>> {
        Some(self.slot.clone())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn attach(&self) -> bool {
        self.attachment.attach()
    }
}

/// One synchronized value per container scope.
#[derive(Debug, Default)]
pub struct HierarchicalLifetime {
    slots: Mutex<HashMap<LifetimeScope, Arc<SyncSlot>>>,
    timeout: Option<Duration>,
    attachment: Attachment,
}

impl HierarchicalLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    fn slot_for(&self, scope: &LifetimeScope) -> Arc<SyncSlot> {
        self.slots
            .lock()
            .entry(*scope)
            .or_insert_with(|| {
                debug!(scope = scope.id(), "Creating hierarchical lifetime slot");
                Arc::new(SyncSlot::new())
            })
            .clone()
    }
}

impl LifetimeManager for HierarchicalLifetime {
    fn kind(&self) -> LifetimeKind {
        LifetimeKind::Synchronized
    }

    fn lifetime(&self) -> Lifetime {
        Lifetime::Hierarchical
    }

    fn get_value(&self, scope: &LifetimeScope) -> Option<Value> {
        self.slots.lock().get(scope).and_then(|slot| slot.value())
    }

    fn set_value(&self, value: Value, scope: &LifetimeScope) {
        self.slot_for(scope).set_value(value);
    }

    fn remove_value(&self, scope: &LifetimeScope) {
        self.slots.lock().remove(scope);
    }

    fn release_scope(&self, scope: &LifetimeScope) {
        if self.slots.lock().remove(scope).is_some() {
            debug!(scope = scope.id(), "Released hierarchical lifetime slot");
        }
    }

    fn slot(&self, scope: &LifetimeScope) -> Option<Arc<SyncSlot>> {
        Some(self.slot_for(scope))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn attach(&self) -> bool {
        self.attachment.attach()
    }
}
