//! Typed dependencies and shapes.
//!
//! [`Dependency`] is implemented by every type that may appear as a
//! constructor parameter, injected member or resolve target. It knows the
//! [`Import`] it needs from the container and how to convert the resolved
//! [`Value`] back into itself.
//!
//! | Rust type        | Contract              | Resolved as                          |
//! |------------------|-----------------------|--------------------------------------|
//! | `Arc<T>`         | `T`                   | the registration for `T`             |
//! | `Option<D>`      | contract of `D`       | `None` when absent or null           |
//! | `Vec<D>`         | `Vec<D>` (array)      | every *named* registration of `D`    |
//! | `Many<D>`        | `Many<D>` (enumerable)| default and named registrations      |
//! | `Lazy<T>`        | `Lazy<T>`             | deferred, resolved once when forced  |
//! | `Func<T>`        | `Func<T>`             | deferred, resolved on every call     |
//! | primitives       | the primitive type    | the registration for that type       |
//!
//! The last four are *shapes*: the container synthesizes them on top of
//! ordinary registrations through a [`ShapeFactory`](crate::pipeline::ShapeFactory).

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::container::WeakContainer;
use crate::contract::Contract;
use crate::error::{ResolveError, Result};
use crate::value::Value;

/// A type that can be requested from the container.
pub trait Dependency: Sized + Send + Sync + 'static {
    /// What to ask the container for.
    fn import() -> Import;

    /// Converts a resolved value. `None` when the value has the wrong type.
    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

/// Converts `value` into `D`, reporting a [`ResolveError::TypeMismatch`].
pub(crate) fn expect<D: Dependency>(value: &Value, contract: Contract) -> Result<D> {
    D::from_value(value).ok_or_else(|| ResolveError::TypeMismatch {
        contract,
        expected: type_name::<D>(),
        found: found_name(value),
    })
}

pub(crate) fn found_name(value: &Value) -> &'static str {
    if value.is_null() { "null" } else { value.type_name() }
}

/// One dependency request: a contract, an optional shape and optionality.
#[derive(Clone)]
pub struct Import {
    contract: Contract,
    shape: Option<Arc<Shape>>,
    optional: bool,
}

impl Import {
    pub fn of(contract: Contract) -> Self {
        Self {
            contract,
            shape: None,
            optional: false,
        }
    }

    pub fn shaped(contract: Contract, shape: Shape) -> Self {
        Self {
            contract,
            shape: Some(Arc::new(shape)),
            optional: false,
        }
    }

    #[inline]
    pub fn contract(&self) -> Contract {
        self.contract
    }

    pub fn shape(&self) -> Option<&Arc<Shape>> {
        self.shape.as_ref()
    }

    #[inline]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Marks the import optional: resolution failures yield null.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn named(self, name: &'static str) -> Self {
        self.with_name(Some(name))
    }

    /// Applies a registration name.
    ///
    /// Lazy and Func pass the name on to their element. Arrays and
    /// enumerables always cover every name, so they ignore it.
    pub fn with_name(mut self, name: Option<&'static str>) -> Self {
        let Some(shape) = self.shape.take() else {
            self.contract = self.contract.with_name(name);
            return self;
        };

        match shape.kind {
            ShapeKind::Array | ShapeKind::Enumerable => self.shape = Some(shape),
            ShapeKind::Lazy | ShapeKind::Func => {
                self.contract = self.contract.with_name(name);
                self.shape = Some(Arc::new(Shape {
                    element: shape.element.clone().with_name(name),
                    ..(*shape).clone()
                }));
            }
        }
        self
    }

    /// Innermost contract, found by unwrapping nested shapes.
    pub fn target(&self) -> Contract {
        let mut current = self;
        while let Some(shape) = &current.shape {
            current = &shape.element;
        }
        current.contract
    }
}

impl fmt::Debug for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Import")
            .field("contract", &self.contract)
            .field("shape", &self.shape.as_ref().map(|s| s.kind))
            .field("optional", &self.optional)
            .finish()
    }
}

/// Well-known generic wrappers the container synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Array,
    Enumerable,
    Lazy,
    Func,
}

/// How a shape turns element values into its own value.
#[derive(Clone, Copy)]
pub enum ShapeBuild {
    /// Collects resolved elements. `None` when an element has the wrong type.
    Collect(fn(Vec<Value>) -> Option<Value>),
    /// Wraps a deferred resolver.
    Defer(fn(Deferred) -> Value),
}

/// A closed shape: kind, element import and builder.
#[derive(Clone)]
pub struct Shape {
    pub kind: ShapeKind,
    pub element: Import,
    pub build: ShapeBuild,
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("kind", &self.kind)
            .field("element", &self.element)
            .finish()
    }
}

/// A resolve call postponed until a [`Lazy`] or [`Func`] is used.
///
/// Holds the container weakly, so a deferred resolver stored inside a
/// singleton never keeps its container alive.
#[derive(Clone)]
pub struct Deferred {
    container: WeakContainer,
    import: Import,
}

impl Deferred {
    pub(crate) fn new(container: WeakContainer, import: Import) -> Self {
        Self { container, import }
    }

    pub fn import(&self) -> &Import {
        &self.import
    }

    /// Resolves against the registrations current at call time.
    pub fn resolve(&self) -> Result<Value> {
        let container = self.container.upgrade().ok_or(ResolveError::ContainerDropped {
            contract: self.import.contract(),
        })?;
        container.resolve_import(&self.import, &[])
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("import", &self.import).finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Arc<T> {
    fn import() -> Import {
        Import::of(Contract::of::<T>())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.downcast::<T>()
    }

    fn into_value(self) -> Value {
        Value::from_arc(self)
    }
}

impl<D: Dependency> Dependency for Option<D> {
    fn import() -> Import {
        D::import().optional()
    }

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }
        D::from_value(value).map(Some)
    }

    fn into_value(self) -> Value {
        match self {
            Some(dependency) => dependency.into_value(),
            None => Value::null(),
        }
    }
}

macro_rules! plain_dependency {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Dependency for $ty {
                fn import() -> Import {
                    Import::of(Contract::of::<$ty>())
                }

                fn from_value(value: &Value) -> Option<Self> {
                    value.downcast::<$ty>().map(|inner| (*inner).clone())
                }

                fn into_value(self) -> Value {
                    Value::new(self)
                }
            }
        )*
    };
}

plain_dependency!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &'static str, Contract,
);

fn collect<C, D>(values: Vec<Value>) -> Option<Value>
where
    C: FromIterator<D> + Send + Sync + 'static,
    D: Dependency,
{
    values
        .iter()
        .map(D::from_value)
        .collect::<Option<C>>()
        .map(Value::new)
}

impl<D: Dependency + Clone> Dependency for Vec<D> {
    fn import() -> Import {
        Import::shaped(
            Contract::of::<Vec<D>>(),
            Shape {
                kind: ShapeKind::Array,
                element: D::import(),
                build: ShapeBuild::Collect(collect::<Vec<D>, D>),
            },
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.downcast::<Vec<D>>().map(|items| (*items).clone())
    }

    fn into_value(self) -> Value {
        Value::new(self)
    }
}

/// Every registration of `D`: the default one first, then named ones.
///
/// Falls back to resolving `D` directly when nothing is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Many<D>(Vec<D>);

impl<D> Many<D> {
    pub fn into_inner(self) -> Vec<D> {
        self.0
    }
}

impl<D> Deref for Many<D> {
    type Target = [D];

    fn deref(&self) -> &[D] {
        &self.0
    }
}

impl<D> FromIterator<D> for Many<D> {
    fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
        Many(iter.into_iter().collect())
    }
}

impl<D> IntoIterator for Many<D> {
    type Item = D;
    type IntoIter = std::vec::IntoIter<D>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, D> IntoIterator for &'a Many<D> {
    type Item = &'a D;
    type IntoIter = std::slice::Iter<'a, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<D: Dependency + Clone> Dependency for Many<D> {
    fn import() -> Import {
        Import::shaped(
            Contract::of::<Many<D>>(),
            Shape {
                kind: ShapeKind::Enumerable,
                element: D::import(),
                build: ShapeBuild::Collect(collect::<Many<D>, D>),
            },
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.downcast::<Many<D>>().map(|items| (*items).clone())
    }

    fn into_value(self) -> Value {
        Value::new(self)
    }
}

struct LazyCell<T: ?Sized> {
    deferred: Deferred,
    value: OnceCell<Arc<T>>,
}

/// Resolves `T` the first time it is forced, then keeps the result.
pub struct Lazy<T: ?Sized> {
    cell: Arc<LazyCell<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Lazy<T> {
    pub(crate) fn new(deferred: Deferred) -> Self {
        Self {
            cell: Arc::new(LazyCell {
                deferred,
                value: OnceCell::new(),
            }),
        }
    }

    /// Forces the value. A failed attempt is not cached.
    pub fn get(&self) -> Result<Arc<T>> {
        self.cell
            .value
            .get_or_try_init(|| {
                let value = self.cell.deferred.resolve()?;
                expect::<Arc<T>>(&value, self.cell.deferred.import().contract())
            })
            .cloned()
    }

    pub fn is_forced(&self) -> bool {
        self.cell.value.get().is_some()
    }
}

impl<T: ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("type", &type_name::<T>())
            .field("forced", &self.cell.value.get().is_some())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Lazy<T> {
    fn import() -> Import {
        Import::shaped(
            Contract::of::<Lazy<T>>(),
            Shape {
                kind: ShapeKind::Lazy,
                element: <Arc<T> as Dependency>::import(),
                build: ShapeBuild::Defer(|deferred| Value::new(Lazy::<T>::new(deferred))),
            },
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.downcast::<Lazy<T>>().map(|lazy| (*lazy).clone())
    }

    fn into_value(self) -> Value {
        Value::new(self)
    }
}

/// Resolves `T` on every call.
pub struct Func<T: ?Sized> {
    deferred: Arc<Deferred>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Func<T> {
    pub(crate) fn new(deferred: Deferred) -> Self {
        Self {
            deferred: Arc::new(deferred),
            _marker: PhantomData,
        }
    }

    pub fn call(&self) -> Result<Arc<T>> {
        let value = self.deferred.resolve()?;
        expect::<Arc<T>>(&value, self.deferred.import().contract())
    }
}

impl<T: ?Sized> Clone for Func<T> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Func<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func").field("type", &type_name::<T>()).finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Func<T> {
    fn import() -> Import {
        Import::shaped(
            Contract::of::<Func<T>>(),
            Shape {
                kind: ShapeKind::Func,
                element: <Arc<T> as Dependency>::import(),
                build: ShapeBuild::Defer(|deferred| Value::new(Func::<T>::new(deferred))),
            },
        )
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.downcast::<Func<T>>().map(|func| (*func).clone())
    }

    fn into_value(self) -> Value {
        Value::new(self)
    }
}
