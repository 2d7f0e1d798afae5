//! Per-resolve state.
//!
//! A [`ResolutionContext`] lives for one outer `resolve` call. It carries
//! the resolving container, the caller's overrides, the stack of contracts
//! currently being built (for cycle detection and error reporting) and the
//! values cached by [`Lifetime::PerResolve`](crate::Lifetime::PerResolve)
//! registrations.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::container::Container;
use crate::contract::Contract;
use crate::dependency::{Dependency, Import, expect};
use crate::error::{CircularDependencyError, ResolveError, Result};
use crate::lifetime::LifetimeScope;
use crate::overrides::Override;
use crate::pipeline::BuildUpStep;
use crate::value::Value;

/// One contract on the resolution stack.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub contract: Contract,
    pub depth: usize,
}

pub struct ResolutionContext<'a> {
    container: &'a Container,
    overrides: &'a [Override],
    frames: Vec<Frame>,
    per_resolve: HashMap<Contract, Value>,
}

impl<'a> ResolutionContext<'a> {
    pub(crate) fn new(container: &'a Container, overrides: &'a [Override]) -> Self {
        Self {
            container,
            overrides,
            frames: Vec::new(),
            per_resolve: HashMap::new(),
        }
    }

    /// The container the outer resolve call was made on.
    pub fn container(&self) -> &'a Container {
        self.container
    }

    pub fn overrides(&self) -> &'a [Override] {
        self.overrides
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of contracts currently being resolved.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Contract currently being built.
    pub fn current(&self) -> Option<Contract> {
        self.frames.last().map(|frame| frame.contract)
    }

    pub fn lifetime_scope(&self) -> LifetimeScope {
        LifetimeScope::new(self.container.id())
    }

    /// Resolves `import` as a nested dependency of the current frame.
    ///
    /// A failed optional import resolves to null.
    pub fn resolve_import(&mut self, import: &Import) -> Result<Value> {
        match self.resolve_required(import) {
            Err(error) if import.is_optional() && error.is_resolution_failure() => {
                trace!(contract = %import.contract(), %error, "Optional dependency unavailable");
                Ok(Value::null())
            }
            other => other,
        }
    }

    fn resolve_required(&mut self, import: &Import) -> Result<Value> {
        let registration = self.container.registration_for(import, self.current())?;
        let compiled = registration.pipeline(self.container)?;

        self.frames.push(Frame {
            contract: registration.contract(),
            depth: self.frames.len(),
        });
        let result = (compiled.pipeline)(self);
        self.frames.pop();
        result
    }

    /// Runs build-up steps on an existing instance of `contract`.
    pub(crate) fn build_up(
        &mut self,
        contract: Contract,
        steps: &[BuildUpStep],
        instance: &mut (dyn Any + Send + Sync),
    ) -> Result<()> {
        self.frames.push(Frame {
            contract,
            depth: self.frames.len(),
        });
        let result = steps.iter().try_for_each(|inject| inject(self, &mut *instance));
        self.frames.pop();
        result
    }

    /// Resolves the default registration of `T`.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        self.resolve_as::<Arc<T>>()
    }

    pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&mut self, name: &'static str) -> Result<Arc<T>> {
        let import = <Arc<T>>::import().named(name);
        let value = self.resolve_import(&import)?;
        expect::<Arc<T>>(&value, import.contract())
    }

    /// Resolves any [`Dependency`], including shapes and optionals.
    pub fn resolve_as<D: Dependency>(&mut self) -> Result<D> {
        let import = D::import();
        let value = self.resolve_import(&import)?;
        expect::<D>(&value, import.contract())
    }

    /// Fails when the current contract is already further down the stack.
    pub(crate) fn check_cycle(&self) -> Result<()> {
        let Some((current, outer)) = self.frames.split_last() else {
            return Ok(());
        };
        if outer.iter().any(|frame| frame.contract == current.contract) {
            return Err(self.cycle_error(current.contract));
        }
        Ok(())
    }

    /// Cycle error for `contract` re-entering the stack.
    pub(crate) fn cycle_error(&self, contract: Contract) -> ResolveError {
        let start = self
            .frames
            .iter()
            .position(|frame| frame.contract == contract)
            .unwrap_or(self.frames.len());
        let mut chain: Vec<Contract> = self.frames[start..].iter().map(|frame| frame.contract).collect();
        if chain.len() < 2 || chain.last() != Some(&contract) {
            chain.push(contract);
        }

        let root = self.frames.first().map_or(contract, |frame| frame.contract);
        warn!(cycle = ?chain, "Circular dependency detected");
        ResolveError::CircularDependency(CircularDependencyError { root, chain })
    }

    pub(crate) fn per_resolve_value(&self, contract: &Contract) -> Option<Value> {
        self.per_resolve.get(contract).cloned()
    }

    pub(crate) fn store_per_resolve(&mut self, contract: Contract, value: Value) {
        self.per_resolve.insert(contract, value);
    }
}

impl std::fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("container", &self.container.id())
            .field("overrides", &self.overrides.len())
            .field("frames", &self.frames)
            .field("per_resolve", &self.per_resolve.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    fn push(ctx: &mut ResolutionContext<'_>, contract: Contract) {
        let depth = ctx.frames.len();
        ctx.frames.push(Frame { contract, depth });
    }

    #[test]
    fn cycle_chain_starts_at_first_occurrence() {
        let container = Container::new();
        let mut ctx = ResolutionContext::new(&container, &[]);
        push(&mut ctx, Contract::of::<u8>());
        push(&mut ctx, Contract::of::<A>());
        push(&mut ctx, Contract::of::<B>());
        assert!(ctx.check_cycle().is_ok());
        push(&mut ctx, Contract::of::<A>());

        let Err(ResolveError::CircularDependency(cycle)) = ctx.check_cycle() else {
            panic!("expected a cycle");
        };
        assert_eq!(cycle.root, Contract::of::<u8>());
        assert_eq!(
            cycle.chain,
            vec![Contract::of::<A>(), Contract::of::<B>(), Contract::of::<A>()]
        );
    }

    #[test]
    fn reentrant_cycle_error_closes_the_chain() {
        let container = Container::new();
        let mut ctx = ResolutionContext::new(&container, &[]);
        push(&mut ctx, Contract::of::<A>());
        push(&mut ctx, Contract::of::<B>());
        let ResolveError::CircularDependency(cycle) = ctx.cycle_error(Contract::of::<A>()) else {
            panic!("expected a cycle");
        };
        assert_eq!(
            cycle.chain,
            vec![Contract::of::<A>(), Contract::of::<B>(), Contract::of::<A>()]
        );
    }

    #[test]
    fn per_resolve_values_stay_in_context() {
        let container = Container::new();
        let mut ctx = ResolutionContext::new(&container, &[]);
        let contract = Contract::of::<A>();
        assert!(ctx.per_resolve_value(&contract).is_none());
        let value = Value::new(A);
        ctx.store_per_resolve(contract, value.clone());
        assert!(ctx.per_resolve_value(&contract).unwrap().ptr_eq(&value));

        let other = ResolutionContext::new(&container, &[]);
        assert!(other.per_resolve_value(&contract).is_none());
    }

    #[test]
    fn optional_import_of_missing_type_is_null() {
        let container = Container::new();
        let mut ctx = ResolutionContext::new(&container, &[]);
        let value = ctx.resolve_import(&<Option<Arc<A>>>::import()).unwrap();
        assert!(value.is_null());
        assert!(ctx.resolve_as::<Option<Arc<B>>>().unwrap().is_none());
        assert!(matches!(ctx.resolve::<A>(), Err(ResolveError::NotRegistered(_))));
        assert_eq!(ctx.depth(), 0);
    }
}
