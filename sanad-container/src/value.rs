//! Type-erased service values.
//!
//! Every resolved dependency travels through the pipeline as a [`Value`]:
//! a cheaply clonable handle around an `Arc<T>`. Wrapping the `Arc<T>`
//! (instead of erasing `T` directly) lets unsized services such as
//! `Arc<dyn Logger>` flow through the same machinery as concrete ones.
//!
//! "Nothing stored" is always expressed as `Option::<Value>::None`.
//! A legitimately stored null is [`Value::null()`], which is a real value.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;

/// Owned, not yet shared instance produced by a constructor.
///
/// Member injection mutates it before it is sealed into a [`Value`].
pub type Instance = Box<dyn Any + Send + Sync>;

type Downgrade = fn(&(dyn Any + Send + Sync)) -> Option<WeakValue>;

/// Marker stored inside [`Value::null()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Null;

static NULL: Lazy<Value> = Lazy::new(|| Value::from_arc(Arc::new(Null)));

/// A resolved, shareable service.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    address: usize,
    downgrade: Downgrade,
}

impl Value {
    /// Wraps an owned value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an existing `Arc<T>`. `T` may be unsized.
    pub fn from_arc<T: ?Sized + Send + Sync + 'static>(arc: Arc<T>) -> Self {
        let address = Arc::as_ptr(&arc) as *const () as usize;
        Self {
            inner: Arc::new(arc),
            type_name: type_name::<T>(),
            address,
            downgrade: downgrade_arc::<T>,
        }
    }

    /// The shared null value. Distinct from "no value".
    pub fn null() -> Self {
        NULL.clone()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.inner.is::<Arc<Null>>()
    }

    /// Returns the service as `Arc<T>` when the value holds a `T`.
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.inner.downcast_ref::<Arc<T>>().cloned()
    }

    /// `true` when the value holds an `Arc<T>`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.inner.is::<Arc<T>>()
    }

    /// [`TypeId`] of the `Arc<T>` held inside.
    pub fn holder_type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Name of the held service type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Reference identity: both values point at the same service allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Value) -> bool {
        self.address == other.address
    }

    /// Weak handle to the held service, for externally controlled lifetimes.
    pub fn downgrade(&self) -> Option<WeakValue> {
        (self.downgrade)(&*self.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("Value(null)");
        }
        write!(f, "Value({} @ {:#x})", self.type_name, self.address)
    }
}

/// Non-owning counterpart of [`Value`].
pub struct WeakValue(Box<dyn ErasedWeak>);

impl WeakValue {
    /// Upgrades back to a [`Value`] when the service is still alive.
    pub fn upgrade(&self) -> Option<Value> {
        self.0.upgrade()
    }
}

impl fmt::Debug for WeakValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakValue")
    }
}

trait ErasedWeak: Send + Sync {
    fn upgrade(&self) -> Option<Value>;
}

impl<T: ?Sized + Send + Sync + 'static> ErasedWeak for Weak<T> {
    fn upgrade(&self) -> Option<Value> {
        Weak::upgrade(self).map(Value::from_arc)
    }
}

fn downgrade_arc<T: ?Sized + Send + Sync + 'static>(inner: &(dyn Any + Send + Sync)) -> Option<WeakValue> {
    inner
        .downcast_ref::<Arc<T>>()
        .map(|arc| WeakValue(Box::new(Arc::downgrade(arc))))
}

/// Seals an owned instance of `T` into a shareable [`Value`].
pub(crate) fn seal<T: Send + Sync + 'static>(instance: Instance) -> Option<Value> {
    instance
        .downcast::<T>()
        .ok()
        .map(|boxed| Value::from_arc(Arc::<T>::from(boxed)))
}
