//! # The Container
//!
//! Resolves contracts through cached pipelines and manages the lifetime of
//! the values it builds.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Container ──create_child()──> Container
//!                                   │                            │
//!                                   └──── Shared (strategies, shape factories,
//!                                          type catalog, options) ────┘
//! ```
//!
//! Each container owns its registration table. Lookups walk from the
//! resolving container to the root; contracts nobody registered are
//! synthesized (shapes) or auto-built (catalog types).
//!
//! # Examples
//! ```rust
//! use sanad_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) -> String { format!("[console] {msg}") }
//! }
//! impl Injectable for ConsoleLogger {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::builder::<ConsoleLogger>().constructor([], |_| Ok(ConsoleLogger)).build()
//!     }
//! }
//!
//! let container = Container::builder()
//!     .register(Registration::map::<dyn Logger, ConsoleLogger, _>(|logger| logger).lifetime(Lifetime::Singleton))
//!     .build()
//!     .expect("Failed to build container");
//!
//! let logger = container.resolve::<dyn Logger>().expect("Failed to resolve");
//! assert_eq!(logger.log("hi"), "[console] hi");
//! ```

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::iter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use sanad_support::rendering::suggest_contracts;
use tracing::{debug, info, instrument, trace, warn};

use crate::context::ResolutionContext;
use crate::contract::Contract;
use crate::dependency::{Dependency, Import, ShapeKind, expect};
use crate::error::{BoxError, NotRegisteredError, ResolveError, Result};
use crate::graph::{Edge, GraphValidator, Node};
use crate::injection::InjectionMember;
use crate::lifetime::{Lifetime, LifetimeScope};
use crate::options::ContainerOptions;
use crate::overrides::Override;
use crate::pipeline::{BuilderStrategy, ShapeFactory, StrategyChain, shape_factories};
use crate::provider::{Provider, ProviderRegistry};
use crate::reflect::{Catalog, Injectable, TypeInfo};
use crate::registration::{Registration, RegistrationBuilder, RegistrationData};
use crate::registry::Registry;
use crate::value::Value;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const MAX_SUGGESTIONS: usize = 3;

/// State shared by every container of one hierarchy.
struct Shared {
    strategies: StrategyChain,
    shapes: DashMap<ShapeKind, Arc<dyn ShapeFactory>>,
    catalog: Catalog,
    options: ContainerOptions,
}

struct Inner {
    id: u64,
    parent: Option<Container>,
    registry: Registry,
    implicit: DashMap<Contract, Arc<Registration>>,
    shared: Arc<Shared>,
}

impl Inner {
    /// Registrations this container may have cached values for.
    fn cached_registrations(&self) -> impl Iterator<Item = Arc<Registration>> + '_ {
        self.registry.all().into_iter().chain(
            self.implicit
                .iter()
                .map(|entry| entry.value().clone())
                .collect::<Vec<_>>(),
        )
    }
}

impl Drop for Inner {
    /// Releases the values hierarchical lifetimes keep for this container,
    /// including those held by ancestors' registrations.
    fn drop(&mut self) {
        let scope = LifetimeScope::new(self.id);
        let ancestors = iter::successors(self.parent.as_ref(), |container| container.inner.parent.as_ref());
        for registration in self
            .cached_registrations()
            .chain(ancestors.flat_map(|container| container.inner.cached_registrations().collect::<Vec<_>>()))
        {
            registration.lifetime_manager().release_scope(&scope);
        }
        trace!(id = self.id, "Released container scope");
    }
}

/// Thread-safe dependency injection container.
///
/// Cloning is cheap and yields a handle to the same container.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

/// Non-owning handle held by deferred resolvers.
#[derive(Clone)]
pub struct WeakContainer(Weak<Inner>);

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

impl fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakContainer")
            .field(&self.upgrade().map(|container| container.id()))
            .finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// An empty root container with default options.
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        let shapes = DashMap::new();
        for factory in shape_factories() {
            shapes.insert(factory.kind(), factory);
        }
        let shared = Arc::new(Shared {
            strategies: StrategyChain::with_defaults(),
            shapes,
            catalog: Catalog::default(),
            options,
        });

        let container = Self::create(None, shared);
        // The table is empty, so the self-registration cannot collide.
        let _ = container
            .inner
            .registry
            .register(Arc::new(Registration::internal()), true);
        container
    }

    fn create(parent: Option<Container>, shared: Arc<Shared>) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::new(Inner {
                id,
                parent,
                registry: Registry::new(),
                implicit: DashMap::new(),
                shared,
            }),
        }
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// A child container. It sees every registration of its ancestors,
    /// and its own registrations shadow theirs. Hierarchical lifetimes
    /// keep one value per child.
    pub fn create_child(&self) -> Container {
        let child = Self::create(Some(self.clone()), self.inner.shared.clone());
        debug!(parent = self.id(), child = child.id(), "Created child container");
        child
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.shared.options
    }

    pub fn strategies(&self) -> &StrategyChain {
        &self.inner.shared.strategies
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.inner.shared.catalog
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer(Arc::downgrade(&self.inner))
    }

    /// This container followed by its ancestors.
    fn lineage(&self) -> impl Iterator<Item = &Container> {
        iter::successors(Some(self), |container| container.inner.parent.as_ref())
    }

    // ── Registration ──

    /// Adds a registration to this container.
    ///
    /// # Errors
    /// [`ResolveError::InvalidRegistration`] for inconsistent registrations,
    /// [`ResolveError::AlreadyRegistered`] when the contract is taken and
    /// `allow_override` is off.
    pub fn register(&self, registration: RegistrationBuilder) -> Result<()> {
        let registration = Arc::new(registration.build()?);
        self.inner
            .registry
            .register(registration, self.options().allow_override)
    }

    /// Registers `T` built from its metadata under `lifetime`.
    pub fn register_type<T: Injectable>(&self, lifetime: Lifetime) -> Result<()> {
        self.register(Registration::of::<T>().lifetime(lifetime))
    }

    pub fn register_singleton<T: Injectable>(&self) -> Result<()> {
        self.register_type::<T>(Lifetime::Singleton)
    }

    /// Registers a pre-built value.
    pub fn register_instance<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) -> Result<()> {
        self.register(Registration::instance(value))
    }

    pub fn register_factory<T, F>(&self, lifetime: Lifetime, factory: F) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&mut ResolutionContext<'_>) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.register(Registration::factory(factory).lifetime(lifetime))
    }

    /// Maps `I` to `T`.
    pub fn register_mapping<I, T, F>(&self, lifetime: Lifetime, cast: F) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        self.register(Registration::map::<I, T, F>(cast).lifetime(lifetime))
    }

    /// Supplies construction metadata for a type that is not submitted to
    /// the link-time catalog.
    pub fn register_type_info(&self, info: TypeInfo) {
        self.catalog().insert(info);
        self.strategies().touch();
    }

    /// Appends a builder strategy to the chain shared by the hierarchy.
    /// Every cached pipeline is rebuilt on next use.
    pub fn add_strategy(&self, strategy: Arc<dyn BuilderStrategy>) {
        self.strategies().add(strategy);
    }

    /// Replaces the factory for one shape kind.
    pub fn add_shape_factory(&self, factory: Arc<dyn ShapeFactory>) {
        debug!(kind = ?factory.kind(), ?factory, "Added shape factory");
        self.inner.shared.shapes.insert(factory.kind(), factory);
        self.strategies().touch();
    }

    pub(crate) fn shape_factory(&self, kind: ShapeKind) -> Option<Arc<dyn ShapeFactory>> {
        self.inner.shared.shapes.get(&kind).map(|factory| factory.value().clone())
    }

    /// Runs a [`Provider`] against this container.
    pub fn add_provider(&self, provider: &dyn Provider) -> Result<()> {
        debug!(provider = provider.name(), "Adding provider");
        let mut registrar = self.clone();
        provider.register(&mut registrar)
    }

    // ── Lookup ──

    fn find_explicit(&self, contract: &Contract) -> Option<Arc<Registration>> {
        self.lineage()
            .find_map(|container| container.inner.registry.get(contract))
    }

    /// `true` when `T` is registered here or in an ancestor.
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.is_registered_contract(&Contract::of::<T>())
    }

    pub fn is_registered_named<T: ?Sized + 'static>(&self, name: &'static str) -> bool {
        self.is_registered_contract(&Contract::named::<T>(name))
    }

    pub fn is_registered_contract(&self, contract: &Contract) -> bool {
        self.lineage()
            .any(|container| container.inner.registry.contains(contract))
    }

    /// Registrations visible from this container, nearest first.
    pub fn registrations(&self) -> Vec<Arc<Registration>> {
        let mut seen = HashSet::new();
        let mut visible = Vec::new();
        for container in self.lineage() {
            for registration in container.inner.registry.all() {
                if seen.insert(registration.contract()) {
                    visible.push(registration);
                }
            }
        }
        visible
    }

    /// Registration that serves `import`.
    ///
    /// Lookup order: explicit registrations up the parent chain, then
    /// synthesized ones: closed shapes, then concrete types with
    /// construction metadata, named or not.
    pub(crate) fn registration_for(&self, import: &Import, required_by: Option<Contract>) -> Result<Arc<Registration>> {
        let contract = import.contract();
        if let Some(registration) = self.find_explicit(&contract) {
            return Ok(registration);
        }
        if let Some(registration) = self.inner.implicit.get(&contract) {
            return Ok(registration.value().clone());
        }

        if let Some(shape) = import.shape() {
            return Ok(self.implicit(contract, || Registration::shape(contract, shape.clone())));
        }
        if self.catalog().contains(contract.type_id()) {
            return Ok(self.implicit(contract, || Registration::cached(contract, None)));
        }

        Err(ResolveError::NotRegistered(NotRegisteredError {
            requested: contract,
            required_by,
            suggestions: self.suggestions(&contract),
        }))
    }

    fn implicit(&self, contract: Contract, create: impl FnOnce() -> Registration) -> Arc<Registration> {
        self.inner
            .implicit
            .entry(contract)
            .or_insert_with(|| {
                let registration = create();
                debug!(contract = %contract, category = ?registration.category(), "Synthesized registration");
                Arc::new(registration)
            })
            .value()
            .clone()
    }

    fn suggestions(&self, contract: &Contract) -> Vec<String> {
        let registrations = self.registrations();
        let labels: Vec<String> = registrations
            .iter()
            .map(|registration| registration.contract().short_name())
            .collect();
        let registered: Vec<&str> = labels.iter().map(String::as_str).collect();
        suggest_contracts(&contract.short_name(), &registered, MAX_SUGGESTIONS)
    }

    /// Names under which `type_id` is registered across the hierarchy.
    /// The default registration comes first, then named ones, ancestors
    /// before descendants.
    pub(crate) fn registered_names(&self, type_id: TypeId) -> Vec<Option<&'static str>> {
        let lineage: Vec<&Container> = self.lineage().collect();
        let mut names: Vec<Option<&'static str>> = Vec::new();
        for container in lineage.into_iter().rev() {
            for contract in container.inner.registry.contracts_of(type_id) {
                if !names.contains(&contract.name()) {
                    names.push(contract.name());
                }
            }
        }
        names.sort_by_key(Option::is_some);
        names
    }

    /// Moves whenever a registration is added anywhere in the lineage.
    pub fn version(&self) -> u64 {
        self.hierarchy_version()
    }

    pub(crate) fn hierarchy_version(&self) -> u64 {
        self.lineage()
            .map(|container| container.inner.registry.version())
            .sum()
    }

    // ── Resolution ──

    /// Resolves the default registration of `T`.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = container.resolve::<Database>()?;
    /// ```
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_with::<T>(None, &[])
    }

    pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        self.resolve_with::<T>(Some(name), &[])
    }

    /// Resolves with resolve-time overrides.
    pub fn resolve_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: Option<&'static str>,
        overrides: &[Override],
    ) -> Result<Arc<T>> {
        let import = <Arc<T>>::import().with_name(name);
        let value = self.resolve_import(&import, overrides)?;
        expect::<Arc<T>>(&value, import.contract())
    }

    /// Resolves any [`Dependency`]: shapes, optionals and plain values.
    ///
    /// ```rust,ignore
    /// let handlers: Vec<Arc<dyn Handler>> = container.resolve_as()?;
    /// let cache: Option<Arc<Cache>> = container.resolve_as()?;
    /// ```
    pub fn resolve_as<D: Dependency>(&self) -> Result<D> {
        let import = D::import();
        let value = self.resolve_import(&import, &[])?;
        expect::<D>(&value, import.contract())
    }

    /// Every named registration of `T`.
    pub fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        self.resolve_as::<Vec<Arc<T>>>()
    }

    /// Type-erased resolve of a registered contract.
    pub fn resolve_contract(&self, contract: &Contract, overrides: &[Override]) -> Result<Value> {
        self.resolve_import(&Import::of(*contract), overrides)
    }

    /// Outermost resolve: a fresh context per call.
    pub fn resolve_import(&self, import: &Import, overrides: &[Override]) -> Result<Value> {
        trace!(contract = %import.contract(), overrides = overrides.len(), "Resolving");
        let mut ctx = ResolutionContext::new(self, overrides);
        ctx.resolve_import(import).inspect_err(|error| {
            warn!(contract = %import.contract(), %error, "Resolve failed");
        })
    }

    /// Injects members into an existing instance without constructing it.
    ///
    /// Uses the explicit registration of `T` when it builds `T`, otherwise
    /// `T`'s own metadata.
    pub fn build_up<T: Injectable>(&self, instance: T) -> Result<T> {
        self.build_up_with(instance, &[])
    }

    pub fn build_up_with<T: Injectable>(&self, mut instance: T, overrides: &[Override]) -> Result<T> {
        let contract = Contract::of::<T>();
        let registration = match self.find_explicit(&contract) {
            Some(registration) if registration.is_activated() => registration,
            _ => self.implicit(contract, || Registration::cached(contract, Some(T::type_info))),
        };
        let compiled = registration.pipeline(self)?;

        trace!(contract = %contract, steps = compiled.build_up.len(), "Building up");
        let mut ctx = ResolutionContext::new(self, overrides);
        ctx.build_up(contract, &compiled.build_up, &mut instance)
            .inspect_err(|error| warn!(contract = %contract, %error, "Build-up failed"))?;
        Ok(instance)
    }

    /// Resolves on the blocking thread pool.
    #[cfg(feature = "async")]
    pub async fn resolve_async<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let container = self.clone();
        tokio::task::spawn_blocking(move || container.resolve::<T>())
            .await
            .map_err(|error| ResolveError::captured(Contract::of::<T>(), error))?
    }

    // ── Validation ──

    /// Checks the registrations visible from this container: missing
    /// dependencies, cycles and, with `strict_lifetimes`, lifetime
    /// mismatches.
    pub fn validate(&self) -> Result<()> {
        let mut nodes: HashMap<Contract, Node> = HashMap::new();
        let mut pending: Vec<Arc<Registration>> = self.registrations();

        while let Some(registration) = pending.pop() {
            let contract = registration.contract();
            if nodes.contains_key(&contract) {
                continue;
            }
            let edges = self.edges(&registration);
            for edge in &edges {
                if nodes.contains_key(&edge.contract) || self.find_explicit(&edge.contract).is_some() {
                    continue;
                }
                if self.catalog().contains(edge.contract.type_id()) {
                    pending.push(Arc::new(Registration::cached(edge.contract, None)));
                }
            }
            nodes.insert(
                contract,
                Node {
                    contract,
                    lifetime: registration.lifetime(),
                    edges,
                },
            );
        }

        GraphValidator::new(nodes, self.options().strict_lifetimes).validate()
    }

    fn edges(&self, registration: &Registration) -> Vec<Edge> {
        let mut edges: Vec<Edge> = registration
            .declared_dependencies()
            .iter()
            .map(|contract| Edge::required(*contract))
            .collect();

        if let Some(target) = registration.mapped_to() {
            edges.push(Edge::required(target));
        }
        if registration.is_activated() {
            let info = match registration.data() {
                RegistrationData::Type {
                    target,
                    describe: Some(describe),
                    ..
                } => Some(self.catalog().get_or_describe(target.type_id(), *describe)),
                RegistrationData::Type { target, .. } => self.catalog().get(target.type_id()),
                _ => None,
            };
            if let Some(info) = info {
                // A constructor directive supplies its own arguments.
                let directed = registration.members().iter().any(InjectionMember::is_constructor);
                let skip = match info.default_constructor() {
                    Some(constructor) if directed => {
                        constructor.parameters().iter().filter(|p| !p.has_default()).count()
                    }
                    _ => 0,
                };
                edges.extend(
                    info.dependencies()
                        .into_iter()
                        .skip(skip)
                        .filter(|import| import.shape().is_none())
                        .map(|import| Edge {
                            contract: import.contract(),
                            required: !import.is_optional(),
                        }),
                );
            }
        }
        edges
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id())
            .field("parent", &self.parent().map(Container::id))
            .field("registered", &self.inner.registry.len())
            .field("strategies", &self.strategies().len())
            .finish()
    }
}

impl ProviderRegistry for Container {
    fn register(&mut self, registration: RegistrationBuilder) -> Result<()> {
        Container::register(self, registration)
    }

    fn add_strategy(&mut self, strategy: Arc<dyn BuilderStrategy>) {
        Container::add_strategy(self, strategy);
    }
}

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a root [`Container`].
///
/// Registration errors are kept and reported by
/// [`build()`](ContainerBuilder::build), so calls can be chained.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .resolve_timeout(Duration::from_secs(5))
///     .singleton::<Database>()
///     .transient::<UserService>()
///     .register(Registration::value(Config::load()))
///     .build()?;
/// ```
pub struct ContainerBuilder {
    options: ContainerOptions,
    registrations: Vec<RegistrationBuilder>,
    strategies: Vec<Arc<dyn BuilderStrategy>>,
    shapes: Vec<Arc<dyn ShapeFactory>>,
    type_infos: Vec<TypeInfo>,
    failure: Option<ResolveError>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            options: ContainerOptions::default(),
            registrations: Vec::new(),
            strategies: Vec::new(),
            shapes: Vec::new(),
            type_infos: Vec::new(),
            failure: None,
        }
    }

    pub fn options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    /// Allow overriding previously registered dependencies.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.options.allow_override = allow;
        self
    }

    /// Bound on waiting for another thread's singleton build.
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.options.resolve_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn validate_on_build(mut self, validate: bool) -> Self {
        self.options.validate_on_build = validate;
        self
    }

    pub fn strict_lifetimes(mut self, strict: bool) -> Self {
        self.options.strict_lifetimes = strict;
        self
    }

    pub fn register(mut self, registration: RegistrationBuilder) -> Self {
        self.registrations.push(registration);
        self
    }

    // ── Shorthands ──

    pub fn singleton<T: Injectable>(self) -> Self {
        self.register(Registration::of::<T>().lifetime(Lifetime::Singleton))
    }

    pub fn transient<T: Injectable>(self) -> Self {
        self.register(Registration::of::<T>())
    }

    pub fn per_resolve<T: Injectable>(self) -> Self {
        self.register(Registration::of::<T>().lifetime(Lifetime::PerResolve))
    }

    pub fn instance<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.register(Registration::value(value))
    }

    pub fn factory<T, F>(self, lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut ResolutionContext<'_>) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.register(Registration::factory(factory).lifetime(lifetime))
    }

    /// Binds `I` to `T`.
    pub fn bind<I, T, F>(self, lifetime: Lifetime, cast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        self.register(Registration::map::<I, T, F>(cast).lifetime(lifetime))
    }

    pub fn type_info(mut self, info: TypeInfo) -> Self {
        self.type_infos.push(info);
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn BuilderStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn shape_factory(mut self, factory: Arc<dyn ShapeFactory>) -> Self {
        self.shapes.push(factory);
        self
    }

    // ── Provider modules ──

    /// Add a [`Provider`] module.
    ///
    /// The first error a provider returns is reported by
    /// [`build()`](ContainerBuilder::build).
    pub fn add_provider(mut self, provider: &dyn Provider) -> Self {
        debug!(provider = provider.name(), "Adding provider");
        if let Err(error) = provider.register(&mut self) {
            warn!(provider = provider.name(), %error, "Provider failed");
            self.failure.get_or_insert(error);
        }
        self
    }

    // ── Build ──

    /// Build the container, registering everything in order.
    ///
    /// With `validate_on_build`, the dependency graph is checked too.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        info!(registered = self.registrations.len(), "Building container");
        if let Some(error) = self.failure {
            return Err(error);
        }

        let container = Container::with_options(self.options);
        for info in self.type_infos {
            container.register_type_info(info);
        }
        for strategy in self.strategies {
            container.add_strategy(strategy);
        }
        for factory in self.shapes {
            container.add_shape_factory(factory);
        }
        for registration in self.registrations {
            container.register(registration)?;
        }

        if container.options().validate_on_build {
            container.validate()?;
        }

        info!(id = container.id(), "Container built successfully ✓");
        Ok(container)
    }
}

impl ProviderRegistry for ContainerBuilder {
    fn register(&mut self, registration: RegistrationBuilder) -> Result<()> {
        self.registrations.push(registration);
        Ok(())
    }

    fn add_strategy(&mut self, strategy: Arc<dyn BuilderStrategy>) {
        self.strategies.push(strategy);
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("options", &self.options)
            .field("registrations", &self.registrations.len())
            .field("strategies", &self.strategies.len())
            .field("failed", &self.failure.is_some())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::context::ResolutionContext;
    pub use crate::contract::Contract;
    pub use crate::dependency::{Dependency, Func, Lazy, Many};
    pub use crate::error::{BoxError, ResolveError, Result};
    pub use crate::injection::{InjectionData, InjectionMember};
    pub use crate::lifetime::Lifetime;
    pub use crate::options::ContainerOptions;
    pub use crate::overrides::Override;
    pub use crate::provider::{Provider, ProviderRegistry};
    pub use crate::reflect::{Injectable, ParameterInfo, TypeInfo};
    pub use crate::registration::Registration;
    pub use crate::value::Value;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
