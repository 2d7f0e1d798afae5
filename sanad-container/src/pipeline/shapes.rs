//! Shape synthesis.
//!
//! `Vec<D>`, `Many<D>`, `Lazy<T>` and `Func<T>` are never registered
//! directly. When one is requested, the container creates a `Clone`
//! registration for the closed shape and asks the [`ShapeFactory`] of that
//! kind for its pipeline. The result is cached like any other pipeline.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{Pipeline, pipeline};
use crate::container::Container;
use crate::context::ResolutionContext;
use crate::contract::Contract;
use crate::dependency::{Deferred, Import, Shape, ShapeBuild, ShapeKind};
use crate::error::{ResolveError, Result};
use crate::value::Value;

/// Builds pipelines for one kind of shape.
pub trait ShapeFactory: Send + Sync + fmt::Debug {
    fn kind(&self) -> ShapeKind;

    fn pipeline(&self, contract: Contract, shape: &Arc<Shape>) -> Result<Pipeline>;
}

struct NamesSnapshot {
    container: u64,
    version: u64,
    names: Arc<[Option<&'static str>]>,
}

/// Registration names of an element type, refreshed when the hierarchy
/// version moves.
#[derive(Default)]
struct NameCache {
    snapshot: RwLock<Option<NamesSnapshot>>,
}

impl NameCache {
    fn names(&self, container: &Container, element: Contract) -> Arc<[Option<&'static str>]> {
        let version = container.hierarchy_version();
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            if snapshot.container == container.id() && snapshot.version == version {
                return snapshot.names.clone();
            }
        }

        let names: Arc<[Option<&'static str>]> = container.registered_names(element.type_id()).into();
        debug!(
            element = element.type_name(),
            count = names.len(),
            version,
            "Refreshed registration names"
        );
        *self.snapshot.write() = Some(NamesSnapshot {
            container: container.id(),
            version,
            names: names.clone(),
        });
        names
    }
}

fn collector(contract: Contract, shape: &Shape) -> Result<fn(Vec<Value>) -> Option<Value>> {
    match shape.build {
        ShapeBuild::Collect(build) => Ok(build),
        ShapeBuild::Defer(_) => Err(ResolveError::invalid(
            contract,
            format!("{:?} shapes must collect their elements", shape.kind),
        )),
    }
}

fn collect(build: fn(Vec<Value>) -> Option<Value>, values: Vec<Value>, contract: Contract) -> Result<Value> {
    build(values).ok_or(ResolveError::TypeMismatch {
        contract,
        expected: contract.type_name(),
        found: "an element of another type",
    })
}

/// Resolves `element` under each name. Elements whose type cannot be
/// loaded are skipped; any other failure aborts.
fn resolve_named(
    ctx: &mut ResolutionContext<'_>,
    element: &Import,
    names: &[Option<&'static str>],
) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(names.len());
    for name in names {
        match ctx.resolve_import(&element.clone().with_name(*name)) {
            Ok(value) => values.push(value),
            Err(error) if error.is_type_load() => {
                debug!(element = %element.target(), name = ?name, %error, "Skipping element that cannot be loaded");
            }
            Err(error) => return Err(error),
        }
    }
    Ok(values)
}

/// `Vec<D>`: every named registration of the element type.
#[derive(Debug, Default)]
pub struct ArrayFactory;

impl ShapeFactory for ArrayFactory {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Array
    }

    fn pipeline(&self, contract: Contract, shape: &Arc<Shape>) -> Result<Pipeline> {
        let build = collector(contract, shape)?;
        let element = shape.element.clone();
        let cache = NameCache::default();

        Ok(pipeline(move |ctx| {
            let all = cache.names(ctx.container(), element.target());
            let named: Vec<Option<&'static str>> = all.iter().copied().filter(Option::is_some).collect();
            let values = resolve_named(ctx, &element, &named)?;
            collect(build, values, contract)
        }))
    }
}

/// `Many<D>`: the default registration and every named one. With none
/// registered, the element is resolved directly.
#[derive(Debug, Default)]
pub struct EnumerableFactory;

impl ShapeFactory for EnumerableFactory {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Enumerable
    }

    fn pipeline(&self, contract: Contract, shape: &Arc<Shape>) -> Result<Pipeline> {
        let build = collector(contract, shape)?;
        let element = shape.element.clone();
        let cache = NameCache::default();

        Ok(pipeline(move |ctx| {
            let names = cache.names(ctx.container(), element.target());
            if !names.is_empty() {
                let values = resolve_named(ctx, &element, &names)?;
                return collect(build, values, contract);
            }

            let values = match ctx.resolve_import(&element) {
                Ok(value) => vec![value],
                Err(error) => {
                    debug!(element = %element.target(), %error, "Nothing registered, enumerating no elements");
                    Vec::new()
                }
            };
            collect(build, values, contract)
        }))
    }
}

/// `Lazy<T>` and `Func<T>`: a deferred resolver bound to the container.
#[derive(Debug)]
pub struct DeferredFactory {
    kind: ShapeKind,
}

impl DeferredFactory {
    pub fn lazy() -> Self {
        Self { kind: ShapeKind::Lazy }
    }

    pub fn func() -> Self {
        Self { kind: ShapeKind::Func }
    }
}

impl ShapeFactory for DeferredFactory {
    fn kind(&self) -> ShapeKind {
        self.kind
    }

    fn pipeline(&self, contract: Contract, shape: &Arc<Shape>) -> Result<Pipeline> {
        let ShapeBuild::Defer(build) = shape.build else {
            return Err(ResolveError::invalid(
                contract,
                format!("{:?} shapes must defer resolution", shape.kind),
            ));
        };
        let element = shape.element.clone();

        Ok(pipeline(move |ctx| {
            Ok(build(Deferred::new(ctx.container().downgrade(), element.clone())))
        }))
    }
}

/// One factory per shape kind.
pub(crate) fn defaults() -> Vec<Arc<dyn ShapeFactory>> {
    vec![
        Arc::new(ArrayFactory),
        Arc::new(EnumerableFactory),
        Arc::new(DeferredFactory::lazy()),
        Arc::new(DeferredFactory::func()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{Dependency, Lazy};

    #[test]
    fn default_factories_cover_every_kind() {
        let kinds: Vec<ShapeKind> = defaults().iter().map(|f| f.kind()).collect();
        assert_eq!(
            kinds,
            vec![ShapeKind::Array, ShapeKind::Enumerable, ShapeKind::Lazy, ShapeKind::Func]
        );
    }

    #[test]
    fn array_factory_rejects_deferred_shape() {
        let import = <Lazy<String>>::import();
        let shape = import.shape().unwrap();
        let built = ArrayFactory.pipeline(import.contract(), shape);
        assert!(matches!(built, Err(ResolveError::InvalidRegistration { .. })));
    }

    #[test]
    fn deferred_factory_rejects_collections() {
        let import = <Vec<u32>>::import();
        let shape = import.shape().unwrap();
        let built = DeferredFactory::lazy().pipeline(import.contract(), shape);
        assert!(matches!(built, Err(ResolveError::InvalidRegistration { .. })));
    }
}
