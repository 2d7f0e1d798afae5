//! Lifetime policies.
//!
//! A [`LifetimeManager`] decides how long a resolved value is kept and who
//! shares it. Each registration owns exactly one manager.
//!
//! - [`Lifetime::Transient`]: never cached, every resolve builds
//! - [`Lifetime::Singleton`]: one value for the registration, built once
//!   under a lock ([`ContainerControlledLifetime`])
//! - [`Lifetime::Hierarchical`]: one value per container in a hierarchy
//! - [`Lifetime::PerThread`]: one value per thread
//! - [`Lifetime::PerResolve`]: one value per outer `resolve` call
//! - [`Lifetime::External`]: weakly held, rebuilt once the owner drops it
//!
//! # Ordering
//! Lifetimes are ordered by how long a value lives:
//! `Singleton > Hierarchical > PerThread > PerResolve > Transient`.
//! External is ranked with Singleton.

mod managers;
mod synchronized;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::value::Value;

pub use managers::{
    ExternallyControlledLifetime, PerResolveLifetime, PerThreadLifetime, TransientLifetime,
};
pub use synchronized::{
    AcquireError, Acquired, BuildGuard, ContainerControlledLifetime, HierarchicalLifetime, SyncSlot,
};

/// Identifies the container a value is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LifetimeScope {
    id: u64,
}

impl LifetimeScope {
    pub(crate) fn new(id: u64) -> Self {
        Self { id }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// How the pipeline's lifetime stage treats a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimeKind {
    /// No caching; the lifetime stage is skipped entirely.
    Transient,
    /// Cached inside the resolution context for one resolve call.
    PerResolve,
    /// Built under the manager's [`SyncSlot`].
    Synchronized,
    /// Plain get / set through the manager.
    Cached,
}

/// Value-caching strategy attached to one registration.
pub trait LifetimeManager: Send + Sync + fmt::Debug {
    fn kind(&self) -> LifetimeKind {
        LifetimeKind::Cached
    }

    /// Policy tag used in diagnostics and validation.
    fn lifetime(&self) -> Lifetime;

    /// Current value for `scope`, `None` when nothing is stored.
    fn get_value(&self, scope: &LifetimeScope) -> Option<Value>;

    /// Non-blocking read. Same as [`get_value`](Self::get_value) unless the
    /// manager blocks on reads.
    fn try_get_value(&self, scope: &LifetimeScope) -> Option<Value> {
        self.get_value(scope)
    }

    fn set_value(&self, value: Value, scope: &LifetimeScope);

    fn remove_value(&self, scope: &LifetimeScope);

    /// Drops whatever is kept for `scope` once its container is gone.
    fn release_scope(&self, _scope: &LifetimeScope) {}

    /// Slot used by [`LifetimeKind::Synchronized`] managers.
    fn slot(&self, _scope: &LifetimeScope) -> Option<Arc<SyncSlot>> {
        None
    }

    /// Per-manager build timeout, overriding the container default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Marks the manager as owned by a registration.
    ///
    /// Returns `false` when it is already attached to another one.
    fn attach(&self) -> bool {
        true
    }
}

/// Ownership flag shared by the built-in managers.
#[derive(Debug, Default)]
pub(crate) struct Attachment(AtomicBool);

impl Attachment {
    pub(crate) fn attach(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

/// Built-in lifetime policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// A new value on every resolve. The default.
    #[default]
    Transient,
    /// One value per outer resolve call.
    PerResolve,
    /// One value per thread.
    PerThread,
    /// One value per container in a hierarchy.
    Hierarchical,
    /// One value for the registration.
    Singleton,
    /// Weakly held; rebuilt after the last strong reference is dropped.
    External,
}

impl Lifetime {
    /// Creates a fresh manager for this policy.
    pub fn manager(self) -> Arc<dyn LifetimeManager> {
        match self {
            Lifetime::Transient => Arc::new(TransientLifetime::new()),
            Lifetime::PerResolve => Arc::new(PerResolveLifetime::new()),
            Lifetime::PerThread => Arc::new(PerThreadLifetime::new()),
            Lifetime::Hierarchical => Arc::new(HierarchicalLifetime::new()),
            Lifetime::Singleton => Arc::new(ContainerControlledLifetime::new()),
            Lifetime::External => Arc::new(ExternallyControlledLifetime::new()),
        }
    }

    /// `true` if values outlive a single resolve.
    #[inline]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Lifetime::Transient | Lifetime::PerResolve)
    }

    #[inline]
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Lifetime::Singleton | Lifetime::External => 4,
            Lifetime::Hierarchical => 3,
            Lifetime::PerThread => 2,
            Lifetime::PerResolve => 1,
            Lifetime::Transient => 0,
        }
    }
}

impl PartialOrd for Lifetime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifetime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| (*self as u8).cmp(&(*other as u8)))
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Transient => write!(f, "Transient"),
            Lifetime::PerResolve => write!(f, "PerResolve"),
            Lifetime::PerThread => write!(f, "PerThread"),
            Lifetime::Hierarchical => write!(f, "Hierarchical"),
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::External => write!(f, "External"),
        }
    }
}
