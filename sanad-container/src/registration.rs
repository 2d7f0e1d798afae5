//! Registrations.
//!
//! A [`Registration`] associates a [`Contract`] with a way to produce its
//! value, a lifetime manager and optional injection directives. It also
//! caches the compiled pipeline, stamped with the versions it was built
//! against.
//!
//! # Examples
//! ```rust,ignore
//! container.register(
//!     Registration::map::<dyn Logger, ConsoleLogger>(|logger| logger)
//!         .named("console")
//!         .lifetime(Lifetime::Singleton),
//! )?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::container::Container;
use crate::context::ResolutionContext;
use crate::contract::Contract;
use crate::dependency::Shape;
use crate::error::{BoxError, ResolveError, Result};
use crate::injection::InjectionMember;
use crate::lifetime::{Lifetime, LifetimeManager};
use crate::pipeline::{Compiled, compile};
use crate::reflect::{Injectable, TypeInfo};
use crate::value::Value;

/// Converts a resolved target value into the mapped contract's value.
pub type CastFn = Arc<dyn Fn(Value) -> Option<Value> + Send + Sync>;

/// User factory producing a registration's value.
pub type FactoryFn = Arc<dyn Fn(&mut ResolutionContext<'_>) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// How a registration came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Synthesized for a concrete type found in the type catalog.
    Cache,
    /// Synthesized for a closed shape such as `Vec<D>`.
    Clone,
    /// The container itself.
    Internal,
    /// A type built by activation, or a mapping to another contract.
    Type,
    /// A pre-built value.
    Instance,
    /// A user factory.
    Factory,
}

/// What a registration produces.
#[derive(Clone)]
pub enum RegistrationData {
    /// Build `target`. With `cast`, resolve `target` and convert it.
    Type {
        target: Contract,
        cast: Option<CastFn>,
        describe: Option<fn() -> TypeInfo>,
    },
    Instance(Value),
    Factory(FactoryFn),
    Internal,
    Shape(Arc<Shape>),
}

impl fmt::Debug for RegistrationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationData::Type { target, cast, .. } => f
                .debug_struct("Type")
                .field("target", target)
                .field("mapped", &cast.is_some())
                .finish(),
            RegistrationData::Instance(value) => f.debug_tuple("Instance").field(value).finish(),
            RegistrationData::Factory(_) => f.write_str("Factory(..)"),
            RegistrationData::Internal => f.write_str("Internal"),
            RegistrationData::Shape(shape) => f.debug_tuple("Shape").field(&shape.kind).finish(),
        }
    }
}

/// Registration entry for a single contract.
pub struct Registration {
    contract: Contract,
    category: Category,
    data: RegistrationData,
    lifetime: Arc<dyn LifetimeManager>,
    members: RwLock<Vec<InjectionMember>>,
    dependencies: Vec<Contract>,
    policy_version: AtomicU64,
    compiled: RwLock<Option<Arc<Compiled>>>,
}

impl Registration {
    /// Builds `T` through its [`Injectable`] metadata.
    pub fn of<T: Injectable>() -> RegistrationBuilder {
        RegistrationBuilder::new(
            Contract::of::<T>(),
            Category::Type,
            RegistrationData::Type {
                target: Contract::of::<T>(),
                cast: None,
                describe: Some(T::type_info),
            },
        )
    }

    /// Maps contract `I` to the concrete type `T`.
    ///
    /// `T` is resolved through its own registration (or built from its
    /// metadata) and converted with `cast`.
    pub fn map<I, T, F>(cast: F) -> RegistrationBuilder
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        Self::try_map::<I, T, _>(move |target| Some(cast(target)))
    }

    /// Like [`map`](Self::map), for conversions that may fail. A failed
    /// conversion is reported as [`ResolveError::TypeLoad`].
    pub fn try_map<I, T, F>(cast: F) -> RegistrationBuilder
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable,
        F: Fn(Arc<T>) -> Option<Arc<I>> + Send + Sync + 'static,
    {
        RegistrationBuilder::new(
            Contract::of::<I>(),
            Category::Type,
            RegistrationData::Type {
                target: Contract::of::<T>(),
                cast: Some(Arc::new(move |value: Value| {
                    value.downcast::<T>().and_then(&cast).map(Value::from_arc)
                })),
                describe: Some(T::type_info),
            },
        )
    }

    /// A pre-built value, shared by every resolve.
    pub fn instance<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> RegistrationBuilder {
        Self::instance_value(Contract::of::<T>(), Value::from_arc(value))
    }

    /// Convenience for [`instance`](Self::instance) with an owned value.
    pub fn value<T: Send + Sync + 'static>(value: T) -> RegistrationBuilder {
        Self::instance(Arc::new(value))
    }

    pub fn instance_value(contract: Contract, value: Value) -> RegistrationBuilder {
        RegistrationBuilder::new(contract, Category::Instance, RegistrationData::Instance(value))
    }

    /// Produces `T` with a closure. Transient unless a lifetime is set.
    pub fn factory<T, F>(factory: F) -> RegistrationBuilder
    where
        T: Send + Sync + 'static,
        F: Fn(&mut ResolutionContext<'_>) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::factory_value(
            Contract::of::<T>(),
            Arc::new(move |ctx: &mut ResolutionContext<'_>| factory(ctx).map(Value::new)),
        )
    }

    /// Produces an `Arc<T>` with a closure; `T` may be a trait object.
    pub fn factory_arc<T, F>(factory: F) -> RegistrationBuilder
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&mut ResolutionContext<'_>) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        Self::factory_value(
            Contract::of::<T>(),
            Arc::new(move |ctx: &mut ResolutionContext<'_>| factory(ctx).map(Value::from_arc)),
        )
    }

    pub fn factory_value(contract: Contract, factory: FactoryFn) -> RegistrationBuilder {
        RegistrationBuilder::new(contract, Category::Factory, RegistrationData::Factory(factory))
    }

    pub(crate) fn internal() -> Registration {
        Self::synthesized(Contract::of::<Container>(), Category::Internal, RegistrationData::Internal)
    }

    pub(crate) fn shape(contract: Contract, shape: Arc<Shape>) -> Registration {
        Self::synthesized(contract, Category::Clone, RegistrationData::Shape(shape))
    }

    /// Transient activation of an unregistered concrete type.
    pub(crate) fn cached(contract: Contract, describe: Option<fn() -> TypeInfo>) -> Registration {
        Self::synthesized(
            contract,
            Category::Cache,
            RegistrationData::Type {
                target: contract.without_name(),
                cast: None,
                describe,
            },
        )
    }

    fn synthesized(contract: Contract, category: Category, data: RegistrationData) -> Registration {
        Registration {
            contract,
            category,
            data,
            lifetime: Lifetime::Transient.manager(),
            members: RwLock::new(Vec::new()),
            dependencies: Vec::new(),
            policy_version: AtomicU64::new(0),
            compiled: RwLock::new(None),
        }
    }

    #[inline]
    pub fn contract(&self) -> Contract {
        self.contract
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn data(&self) -> &RegistrationData {
        &self.data
    }

    pub fn lifetime_manager(&self) -> &Arc<dyn LifetimeManager> {
        &self.lifetime
    }

    /// Effective lifetime. Instances and the container itself are
    /// singletons, synthesized shapes are transient.
    pub fn lifetime(&self) -> Lifetime {
        match self.category {
            Category::Instance | Category::Internal => Lifetime::Singleton,
            Category::Clone => Lifetime::Transient,
            _ => self.lifetime.lifetime(),
        }
    }

    /// `true` when activation constructs the value.
    pub fn is_activated(&self) -> bool {
        matches!(self.data, RegistrationData::Type { cast: None, .. })
    }

    /// Mapping target, for type mappings.
    pub fn mapped_to(&self) -> Option<Contract> {
        match &self.data {
            RegistrationData::Type {
                target, cast: Some(_), ..
            } => Some(*target),
            _ => None,
        }
    }

    /// Contracts declared with `depends_on`.
    pub fn declared_dependencies(&self) -> &[Contract] {
        &self.dependencies
    }

    /// Snapshot of the injection directives.
    pub fn members(&self) -> Vec<InjectionMember> {
        self.members.read().clone()
    }

    /// Adds a directive. Only registrations built by activation accept
    /// directives, and only one constructor directive each.
    pub fn add_member(&self, member: InjectionMember) -> Result<()> {
        if !self.is_activated() {
            return Err(ResolveError::invalid(
                self.contract,
                format!("injection members cannot be applied to a {:?} registration", self.category),
            ));
        }
        let mut members = self.members.write();
        if member.is_constructor() && members.iter().any(InjectionMember::is_constructor) {
            return Err(ResolveError::invalid(self.contract, "only one constructor directive is allowed"));
        }
        members.push(member);
        self.policy_version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn clear_members(&self) {
        self.members.write().clear();
        self.policy_version.fetch_add(1, Ordering::AcqRel);
    }

    pub fn policy_version(&self) -> u64 {
        self.policy_version.load(Ordering::Acquire)
    }

    /// The compiled pipeline, rebuilt when the strategy chain or the
    /// directives changed since it was cached.
    pub(crate) fn pipeline(&self, container: &Container) -> Result<Arc<Compiled>> {
        let chain_version = container.strategies().version();
        let policy_version = self.policy_version();
        if let Some(compiled) = self.compiled.read().as_ref() {
            if compiled.is_current(chain_version, policy_version) {
                return Ok(compiled.clone());
            }
        }

        let compiled = Arc::new(compile(container, self)?);
        *self.compiled.write() = Some(compiled.clone());
        Ok(compiled)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("contract", &self.contract)
            .field("category", &self.category)
            .field("lifetime", &self.lifetime())
            .field("data", &self.data)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Fluent configuration of a [`Registration`].
pub struct RegistrationBuilder {
    contract: Contract,
    category: Category,
    data: RegistrationData,
    lifetime: Option<Arc<dyn LifetimeManager>>,
    members: Vec<InjectionMember>,
    dependencies: Vec<Contract>,
}

impl RegistrationBuilder {
    fn new(contract: Contract, category: Category, data: RegistrationData) -> Self {
        Self {
            contract,
            category,
            data,
            lifetime: None,
            members: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn contract(&self) -> Contract {
        self.contract
    }

    /// Registers under `name`.
    pub fn named(mut self, name: &'static str) -> Self {
        self.contract = self.contract.with_name(Some(name));
        self
    }

    /// Resolves a named registration of the mapping target.
    pub fn target_named(mut self, name: &'static str) -> Self {
        if let RegistrationData::Type { target, cast: Some(_), .. } = &mut self.data {
            *target = target.with_name(Some(name));
        }
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime.manager());
        self
    }

    /// Uses a specific manager instance. A manager serves one registration.
    pub fn lifetime_manager(mut self, manager: Arc<dyn LifetimeManager>) -> Self {
        self.lifetime = Some(manager);
        self
    }

    pub fn inject(mut self, member: InjectionMember) -> Self {
        self.members.push(member);
        self
    }

    /// Declares a dependency for graph validation.
    pub fn depends_on<T: ?Sized + 'static>(self) -> Self {
        self.depends_on_contract(Contract::of::<T>())
    }

    pub fn depends_on_contract(mut self, contract: Contract) -> Self {
        self.dependencies.push(contract);
        self
    }

    pub fn build(self) -> Result<Registration> {
        let contract = self.contract;
        if let RegistrationData::Type {
            target, cast: Some(_), ..
        } = &self.data
        {
            if *target == contract {
                return Err(ResolveError::invalid(contract, "a type mapping cannot target itself"));
            }
        }

        let lifetime = self.lifetime.unwrap_or_else(|| Lifetime::Transient.manager());
        if !lifetime.attach() {
            return Err(ResolveError::invalid(
                contract,
                format!("lifetime manager {lifetime:?} already serves another registration"),
            ));
        }

        let registration = Registration {
            contract,
            category: self.category,
            data: self.data,
            lifetime,
            members: RwLock::new(Vec::new()),
            dependencies: self.dependencies,
            policy_version: AtomicU64::new(0),
            compiled: RwLock::new(None),
        };
        for member in self.members {
            registration.add_member(member)?;
        }
        Ok(registration)
    }
}

impl fmt::Debug for RegistrationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationBuilder")
            .field("contract", &self.contract)
            .field("category", &self.category)
            .field("data", &self.data)
            .field("members", &self.members)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::InjectionData;
    use crate::lifetime::ContainerControlledLifetime;
    use crate::reflect::ParameterInfo;

    trait Greeter: Send + Sync {}

    struct English;

    impl Greeter for English {}

    impl Injectable for English {
        fn type_info() -> TypeInfo {
            TypeInfo::builder::<English>().constructor([], |_| Ok(English)).build()
        }
    }

    struct Counter {
        start: u32,
    }

    impl Injectable for Counter {
        fn type_info() -> TypeInfo {
            TypeInfo::builder::<Counter>()
                .constructor([ParameterInfo::of::<u32>("start")], |args| {
                    Ok(Counter { start: args.next()? })
                })
                .build()
        }
    }

    #[test]
    fn default_lifetime_is_transient() {
        let registration = Registration::of::<English>().build().unwrap();
        assert_eq!(registration.lifetime(), Lifetime::Transient);
        assert_eq!(registration.category(), Category::Type);
        assert!(registration.is_activated());
    }

    #[test]
    fn mapping_targets_concrete_type() {
        let registration = Registration::map::<dyn Greeter, English, _>(|english| english)
            .named("en")
            .build()
            .unwrap();
        assert_eq!(registration.contract(), Contract::named::<dyn Greeter>("en"));
        assert_eq!(registration.mapped_to(), Some(Contract::of::<English>()));
        assert!(!registration.is_activated());
    }

    #[test]
    fn mapping_to_itself_is_invalid() {
        let result = Registration::map::<English, English, _>(|english| english).build();
        assert!(matches!(result, Err(ResolveError::InvalidRegistration { .. })));
    }

    #[test]
    fn mapping_rejects_members() {
        let result = Registration::map::<dyn Greeter, English, _>(|english| english)
            .inject(InjectionMember::field("name"))
            .build();
        assert!(matches!(result, Err(ResolveError::InvalidRegistration { .. })));
    }

    #[test]
    fn instances_are_singletons() {
        let registration = Registration::value(7u32).lifetime(Lifetime::Transient).build().unwrap();
        assert_eq!(registration.lifetime(), Lifetime::Singleton);
        assert_eq!(registration.category(), Category::Instance);
    }

    #[test]
    fn members_bump_policy_version() {
        let registration = Registration::of::<Counter>().build().unwrap();
        assert_eq!(registration.policy_version(), 0);
        registration
            .add_member(InjectionMember::constructor([InjectionData::value(1u32)]))
            .unwrap();
        assert_eq!(registration.policy_version(), 1);
        assert!(
            registration
                .add_member(InjectionMember::default_constructor())
                .is_err()
        );
        registration.clear_members();
        assert_eq!(registration.policy_version(), 2);
        assert!(registration.members().is_empty());
    }

    #[test]
    fn lifetime_manager_serves_one_registration() {
        let manager: Arc<dyn LifetimeManager> = Arc::new(ContainerControlledLifetime::new());
        Registration::of::<English>()
            .lifetime_manager(manager.clone())
            .build()
            .unwrap();
        let second = Registration::of::<Counter>().lifetime_manager(manager).build();
        assert!(matches!(second, Err(ResolveError::InvalidRegistration { .. })));
    }

    #[test]
    fn target_named_only_affects_mappings() {
        let mapping = Registration::map::<dyn Greeter, English, _>(|english| english)
            .target_named("uk")
            .build()
            .unwrap();
        assert_eq!(mapping.mapped_to(), Some(Contract::named::<English>("uk")));
    }
}
