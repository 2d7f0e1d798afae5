//! Unsynchronized lifetime managers.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use super::{Attachment, Lifetime, LifetimeKind, LifetimeManager, LifetimeScope};
use crate::value::{Value, WeakValue};

/// Never stores anything.
#[derive(Debug, Default)]
pub struct TransientLifetime {
    attachment: Attachment,
}

impl TransientLifetime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for TransientLifetime {
    fn kind(&self) -> LifetimeKind {
        LifetimeKind::Transient
    }

    fn lifetime(&self) -> Lifetime {
        Lifetime::Transient
    }

    fn get_value(&self, _scope: &LifetimeScope) -> Option<Value> {
        None
    }

    fn set_value(&self, _value: Value, _scope: &LifetimeScope) {}

    fn remove_value(&self, _scope: &LifetimeScope) {}

    fn attach(&self) -> bool {
        self.attachment.attach()
    }
}

/// Marker manager; values live in the resolution context.
///
/// The manager itself stores nothing; the lifetime stage keeps one value
/// per contract for the duration of a single outer resolve.
#[derive(Debug, Default)]
pub struct PerResolveLifetime {
    attachment: Attachment,
}

impl PerResolveLifetime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for PerResolveLifetime {
    fn kind(&self) -> LifetimeKind {
        LifetimeKind::PerResolve
    }

    fn lifetime(&self) -> Lifetime {
        Lifetime::PerResolve
    }

    fn get_value(&self, _scope: &LifetimeScope) -> Option<Value> {
        None
    }

    fn set_value(&self, _value: Value, _scope: &LifetimeScope) {}

    fn remove_value(&self, _scope: &LifetimeScope) {}

    fn attach(&self) -> bool {
        self.attachment.attach()
    }
}

thread_local! {
    // Dropped when the thread exits; entries whose token is gone are pruned.
    static THREAD_ALIVE: Arc<()> = Arc::new(());
}

#[derive(Debug)]
struct ThreadValue {
    alive: Weak<()>,
    value: Value,
}

/// One value per thread.
#[derive(Debug, Default)]
pub struct PerThreadLifetime {
    values: Mutex<HashMap<ThreadId, ThreadValue>>,
    attachment: Attachment,
}

impl PerThreadLifetime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for PerThreadLifetime {
    fn lifetime(&self) -> Lifetime {
        Lifetime::PerThread
    }

    fn get_value(&self, _scope: &LifetimeScope) -> Option<Value> {
        self.values
            .lock()
            .get(&thread::current().id())
            .map(|entry| entry.value.clone())
    }

    fn set_value(&self, value: Value, _scope: &LifetimeScope) {
        let alive = THREAD_ALIVE.with(Arc::downgrade);
        let mut values = self.values.lock();
        values.retain(|_, entry| entry.alive.strong_count() > 0);
        values.insert(thread::current().id(), ThreadValue { alive, value });
    }

    fn remove_value(&self, _scope: &LifetimeScope) {
        self.values.lock().remove(&thread::current().id());
    }

    fn attach(&self) -> bool {
        self.attachment.attach()
    }
}

/// Holds only a weak reference; the caller owns the value.
#[derive(Debug, Default)]
pub struct ExternallyControlledLifetime {
    value: Mutex<Option<WeakValue>>,
    attachment: Attachment,
}

impl ExternallyControlledLifetime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LifetimeManager for ExternallyControlledLifetime {
    fn lifetime(&self) -> Lifetime {
        Lifetime::External
    }

    fn get_value(&self, _scope: &LifetimeScope) -> Option<Value> {
        self.value.lock().as_ref().and_then(WeakValue::upgrade)
    }

    fn set_value(&self, value: Value, _scope: &LifetimeScope) {
        // The shared null is a process-wide static and never collected.
        *self.value.lock() = value.downgrade();
    }

    fn remove_value(&self, _scope: &LifetimeScope) {
        *self.value.lock() = None;
    }

    fn attach(&self) -> bool {
        self.attachment.attach()
    }
}
