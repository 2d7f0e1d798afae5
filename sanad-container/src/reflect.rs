//! Construction metadata.
//!
//! A [`TypeInfo`] lists how a type can be built and injected: its
//! constructors, injectable fields and properties, and injection methods.
//! It is produced by [`Injectable::type_info`], written either through
//! [`TypeInfo::builder`] or by `#[derive(Injectable)]`.
//!
//! Derived types also submit a [`TypeEntry`] to a link-time catalog, so the
//! container can build concrete types that were never registered.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use sanad_container::reflect::{Injectable, ParameterInfo, TypeInfo};
//!
//! struct Database;
//! struct Repository {
//!     db: Arc<Database>,
//!     table: String,
//! }
//!
//! impl Injectable for Repository {
//!     fn type_info() -> TypeInfo {
//!         TypeInfo::builder::<Repository>()
//!             .constructor(
//!                 [
//!                     ParameterInfo::of::<Arc<Database>>("db"),
//!                     ParameterInfo::of::<String>("table").named("users_table"),
//!                 ],
//!                 |args| Ok(Repository { db: args.next()?, table: args.next()? }),
//!             )
//!             .build()
//!     }
//! }
//!
//! assert_eq!(Repository::type_info().constructors()[0].parameters().len(), 2);
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::contract::Contract;
use crate::dependency::{Dependency, Import, found_name};
use crate::error::BoxError;
use crate::value::{Instance, Value, seal};

pub(crate) type ConstructFn = Arc<dyn Fn(&mut Arguments) -> Result<Instance, BoxError> + Send + Sync>;
pub(crate) type SetFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), Value) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type InvokeFn = Arc<
    dyn Fn(&mut (dyn Any + Send + Sync), &mut Arguments) -> Result<(), BoxError> + Send + Sync,
>;

/// Produces a declared default.
pub type DefaultFn = fn() -> Value;

/// Types the container knows how to build.
pub trait Injectable: Send + Sync + Sized + 'static {
    fn type_info() -> TypeInfo;
}

/// Error raised while reading constructor or method arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("argument {position} is missing")]
    Missing { position: usize },

    #[error("argument {position} expected {expected}, found {found}")]
    Mismatch {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("injection target is not a {expected}")]
    Target { expected: &'static str },
}

/// Resolved arguments, consumed in declaration order.
#[derive(Debug)]
pub struct Arguments {
    values: Vec<Value>,
    position: usize,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            position: 0,
        }
    }

    /// Takes the next argument as `D`.
    pub fn next<D: Dependency>(&mut self) -> Result<D, ArgumentError> {
        let position = self.position;
        let value = self
            .values
            .get(position)
            .ok_or(ArgumentError::Missing { position })?;
        self.position += 1;
        D::from_value(value).ok_or(ArgumentError::Mismatch {
            position,
            expected: type_name::<D>(),
            found: found_name(value),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

static EMPTY_PARAMETERS: Lazy<Arc<[ParameterInfo]>> = Lazy::new(|| Arc::from(Vec::new()));

fn parameter_list(parameters: impl IntoIterator<Item = ParameterInfo>) -> Arc<[ParameterInfo]> {
    let parameters: Vec<ParameterInfo> = parameters.into_iter().collect();
    if parameters.is_empty() {
        EMPTY_PARAMETERS.clone()
    } else {
        parameters.into()
    }
}

/// One constructor or method parameter.
#[derive(Clone)]
pub struct ParameterInfo {
    name: &'static str,
    import: Import,
    default: Option<DefaultFn>,
    accepts: fn(&Value) -> bool,
    type_name: &'static str,
}

impl ParameterInfo {
    pub fn of<D: Dependency>(name: &'static str) -> Self {
        Self {
            name,
            import: D::import(),
            default: None,
            accepts: |value| D::from_value(value).is_some(),
            type_name: type_name::<D>(),
        }
    }

    /// Parameter falling back to `D::default()` when it cannot be resolved.
    pub fn defaulted<D: Dependency + Default>(name: &'static str) -> Self {
        Self {
            default: Some(|| D::default().into_value()),
            ..Self::of::<D>(name)
        }
    }

    /// Resolves the registration with this name.
    pub fn named(mut self, name: &'static str) -> Self {
        self.import = self.import.named(name);
        self
    }

    pub fn with_default(mut self, default: DefaultFn) -> Self {
        self.default = Some(default);
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn import(&self) -> &Import {
        &self.import
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// `true` when `value` converts into the parameter type.
    pub fn accepts(&self, value: &Value) -> bool {
        (self.accepts)(value)
    }

    pub(crate) fn default_fn(&self) -> Option<DefaultFn> {
        self.default
    }
}

impl fmt::Debug for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterInfo")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("import", &self.import)
            .field("default", &self.default.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct ConstructorInfo {
    parameters: Arc<[ParameterInfo]>,
    invoke: ConstructFn,
    preferred: bool,
}

impl ConstructorInfo {
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    pub(crate) fn invoker(&self) -> ConstructFn {
        self.invoke.clone()
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("parameters", &self.parameters)
            .field("preferred", &self.preferred)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Property,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Field => write!(f, "field"),
            MemberKind::Property => write!(f, "property"),
        }
    }
}

/// An injectable field or property.
#[derive(Clone)]
pub struct MemberInfo {
    name: &'static str,
    kind: MemberKind,
    import: Import,
    default: Option<DefaultFn>,
    attributed: bool,
    set: SetFn,
}

impl MemberInfo {
    /// A field written directly on `T`.
    pub fn field<T, D, F>(name: &'static str, set: F) -> Self
    where
        T: Send + Sync + 'static,
        D: Dependency,
        F: Fn(&mut T, D) + Send + Sync + 'static,
    {
        Self::new::<T, D, F>(name, MemberKind::Field, set)
    }

    /// A property written through a setter on `T`.
    pub fn property<T, D, F>(name: &'static str, set: F) -> Self
    where
        T: Send + Sync + 'static,
        D: Dependency,
        F: Fn(&mut T, D) + Send + Sync + 'static,
    {
        Self::new::<T, D, F>(name, MemberKind::Property, set)
    }

    fn new<T, D, F>(name: &'static str, kind: MemberKind, set: F) -> Self
    where
        T: Send + Sync + 'static,
        D: Dependency,
        F: Fn(&mut T, D) + Send + Sync + 'static,
    {
        Self {
            name,
            kind,
            import: D::import(),
            default: None,
            attributed: false,
            set: Arc::new(move |target: &mut (dyn Any + Send + Sync), value: Value| {
                let target = target.downcast_mut::<T>().ok_or(ArgumentError::Target {
                    expected: type_name::<T>(),
                })?;
                let dependency = D::from_value(&value).ok_or(ArgumentError::Mismatch {
                    position: 0,
                    expected: type_name::<D>(),
                    found: found_name(&value),
                })?;
                set(target, dependency);
                Ok(())
            }),
        }
    }

    /// Injected on every build, without a directive.
    pub fn attributed(mut self) -> Self {
        self.attributed = true;
        self
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.import = self.import.named(name);
        self
    }

    pub fn with_default(mut self, default: DefaultFn) -> Self {
        self.default = Some(default);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn import(&self) -> &Import {
        &self.import
    }

    pub fn is_attributed(&self) -> bool {
        self.attributed
    }

    pub(crate) fn default_fn(&self) -> Option<DefaultFn> {
        self.default
    }

    pub(crate) fn setter(&self) -> SetFn {
        self.set.clone()
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("import", &self.import)
            .field("attributed", &self.attributed)
            .finish()
    }
}

/// A method called after construction with resolved arguments.
#[derive(Clone)]
pub struct MethodInfo {
    name: &'static str,
    parameters: Arc<[ParameterInfo]>,
    invoke: InvokeFn,
    attributed: bool,
}

impl MethodInfo {
    pub fn new<T, F>(
        name: &'static str,
        parameters: impl IntoIterator<Item = ParameterInfo>,
        invoke: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut T, &mut Arguments) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name,
            parameters: parameter_list(parameters),
            invoke: Arc::new(move |target: &mut (dyn Any + Send + Sync), args: &mut Arguments| {
                let target = target.downcast_mut::<T>().ok_or(ArgumentError::Target {
                    expected: type_name::<T>(),
                })?;
                invoke(target, args)
            }),
            attributed: false,
        }
    }

    pub fn attributed(mut self) -> Self {
        self.attributed = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn is_attributed(&self) -> bool {
        self.attributed
    }

    pub(crate) fn invoker(&self) -> InvokeFn {
        self.invoke.clone()
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("attributed", &self.attributed)
            .finish()
    }
}

/// Everything the container needs to build and inject one type.
#[derive(Clone)]
pub struct TypeInfo {
    contract: Contract,
    constructors: Vec<ConstructorInfo>,
    members: Vec<MemberInfo>,
    methods: Vec<MethodInfo>,
    seal: fn(Instance) -> Option<Value>,
}

impl TypeInfo {
    pub fn builder<T: Send + Sync + 'static>() -> TypeInfoBuilder<T> {
        TypeInfoBuilder {
            info: TypeInfo {
                contract: Contract::of::<T>(),
                constructors: Vec::new(),
                members: Vec::new(),
                methods: Vec::new(),
                seal: seal::<T>,
            },
            _marker: PhantomData,
        }
    }

    /// Unnamed contract of the described type.
    pub fn contract(&self) -> Contract {
        self.contract
    }

    pub fn type_name(&self) -> &'static str {
        self.contract.type_name()
    }

    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn member(&self, name: &str, kind: MemberKind) -> Option<&MemberInfo> {
        self.members.iter().find(|m| m.name == name && m.kind == kind)
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// The constructor used when no directive picks one: the preferred
    /// one if marked, otherwise the longest. Ties go to the first declared.
    pub fn default_constructor(&self) -> Option<&ConstructorInfo> {
        if let Some(preferred) = self.constructors.iter().find(|c| c.preferred) {
            return Some(preferred);
        }
        self.constructors
            .iter()
            .rev()
            .max_by_key(|c| c.arity())
    }

    /// Imports used when building with no directives.
    pub fn dependencies(&self) -> Vec<&Import> {
        let constructor = self
            .default_constructor()
            .into_iter()
            .flat_map(|c| c.parameters.iter().filter(|p| p.default.is_none()))
            .map(|p| &p.import);
        let members = self
            .members
            .iter()
            .filter(|m| m.attributed && m.default.is_none())
            .map(|m| &m.import);
        let methods = self
            .methods
            .iter()
            .filter(|m| m.attributed)
            .flat_map(|m| m.parameters.iter().filter(|p| p.default.is_none()))
            .map(|p| &p.import);
        constructor.chain(members).chain(methods).collect()
    }

    pub(crate) fn seal(&self, instance: Instance) -> Option<Value> {
        (self.seal)(instance)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("type", &self.contract.type_name())
            .field("constructors", &self.constructors)
            .field("members", &self.members)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Fluent construction of a [`TypeInfo`] for `T`.
pub struct TypeInfoBuilder<T> {
    info: TypeInfo,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeInfoBuilder<T> {
    pub fn constructor<F>(self, parameters: impl IntoIterator<Item = ParameterInfo>, construct: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.push_constructor(parameters, construct, false)
    }

    /// Constructor chosen over longer ones when no directive applies.
    pub fn preferred_constructor<F>(
        self,
        parameters: impl IntoIterator<Item = ParameterInfo>,
        construct: F,
    ) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.push_constructor(parameters, construct, true)
    }

    fn push_constructor<F>(
        mut self,
        parameters: impl IntoIterator<Item = ParameterInfo>,
        construct: F,
        preferred: bool,
    ) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.info.constructors.push(ConstructorInfo {
            parameters: parameter_list(parameters),
            invoke: Arc::new(move |args: &mut Arguments| construct(args).map(|built| Box::new(built) as Instance)),
            preferred,
        });
        self
    }

    pub fn member(mut self, member: MemberInfo) -> Self {
        self.info.members.push(member);
        self
    }

    /// Field injected only when a directive names it.
    pub fn field<D: Dependency>(self, name: &'static str, set: impl Fn(&mut T, D) + Send + Sync + 'static) -> Self {
        self.member(MemberInfo::field::<T, D, _>(name, set))
    }

    /// Field injected on every build.
    pub fn inject_field<D: Dependency>(
        self,
        name: &'static str,
        set: impl Fn(&mut T, D) + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberInfo::field::<T, D, _>(name, set).attributed())
    }

    pub fn property<D: Dependency>(
        self,
        name: &'static str,
        set: impl Fn(&mut T, D) + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberInfo::property::<T, D, _>(name, set))
    }

    pub fn inject_property<D: Dependency>(
        self,
        name: &'static str,
        set: impl Fn(&mut T, D) + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberInfo::property::<T, D, _>(name, set).attributed())
    }

    /// Method called only when a directive names it.
    pub fn method<F>(mut self, name: &'static str, parameters: impl IntoIterator<Item = ParameterInfo>, invoke: F) -> Self
    where
        F: Fn(&mut T, &mut Arguments) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.info.methods.push(MethodInfo::new::<T, F>(name, parameters, invoke));
        self
    }

    /// Method called on every build.
    pub fn inject_method<F>(
        mut self,
        name: &'static str,
        parameters: impl IntoIterator<Item = ParameterInfo>,
        invoke: F,
    ) -> Self
    where
        F: Fn(&mut T, &mut Arguments) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.info
            .methods
            .push(MethodInfo::new::<T, F>(name, parameters, invoke).attributed());
        self
    }

    pub fn build(self) -> TypeInfo {
        self.info
    }
}

/// Link-time catalog entry submitted by `#[derive(Injectable)]`.
pub struct TypeEntry {
    type_id: fn() -> TypeId,
    describe: fn() -> TypeInfo,
}

impl TypeEntry {
    pub const fn new(type_id: fn() -> TypeId, describe: fn() -> TypeInfo) -> Self {
        Self { type_id, describe }
    }
}

inventory::collect!(TypeEntry);

static SUBMITTED: Lazy<HashMap<TypeId, fn() -> TypeInfo>> = Lazy::new(|| {
    let entries: HashMap<TypeId, fn() -> TypeInfo> = inventory::iter::<TypeEntry>
        .into_iter()
        .map(|entry| ((entry.type_id)(), entry.describe))
        .collect();
    debug!(types = entries.len(), "Loaded injectable type catalog");
    entries
});

/// Type metadata known to a container family.
///
/// Filled lazily from submitted entries and registrations, or explicitly
/// through [`Container::register_type_info`](crate::Container::register_type_info).
#[derive(Default)]
pub(crate) struct Catalog {
    types: DashMap<TypeId, Arc<TypeInfo>>,
}

impl Catalog {
    pub fn insert(&self, info: TypeInfo) {
        debug!(type_name = info.type_name(), "Registered type info");
        self.types.insert(info.contract().type_id(), Arc::new(info));
    }

    /// Metadata for `type_id`, from explicit entries or the link-time catalog.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<TypeInfo>> {
        if let Some(info) = self.types.get(&type_id) {
            return Some(info.value().clone());
        }
        let describe = SUBMITTED.get(&type_id)?;
        Some(self.get_or_describe(type_id, *describe))
    }

    pub fn get_or_describe(&self, type_id: TypeId, describe: fn() -> TypeInfo) -> Arc<TypeInfo> {
        self.types
            .entry(type_id)
            .or_insert_with(|| Arc::new(describe()))
            .value()
            .clone()
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.types.contains_key(&type_id) || SUBMITTED.contains_key(&type_id)
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog").field("types", &self.types.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Engine {
        power: u32,
        label: String,
        started: bool,
    }

    impl Injectable for Engine {
        fn type_info() -> TypeInfo {
            TypeInfo::builder::<Engine>()
                .constructor([], |_| {
                    Ok(Engine {
                        power: 0,
                        label: String::new(),
                        started: false,
                    })
                })
                .constructor([ParameterInfo::of::<u32>("power")], |args| {
                    Ok(Engine {
                        power: args.next()?,
                        label: String::new(),
                        started: false,
                    })
                })
                .inject_field::<String>("label", |engine, label| engine.label = label)
                .method("start", [], |engine: &mut Engine, _| {
                    engine.started = true;
                    Ok(())
                })
                .build()
        }
    }

    #[test]
    fn default_constructor_is_longest() {
        let info = Engine::type_info();
        assert_eq!(info.default_constructor().unwrap().arity(), 1);
    }

    #[test]
    fn default_constructor_prefers_marked() {
        let info = TypeInfo::builder::<u8>()
            .preferred_constructor([], |_| Ok(0u8))
            .constructor([ParameterInfo::of::<u16>("wide")], |_| Ok(1u8))
            .build();
        assert_eq!(info.default_constructor().unwrap().arity(), 0);
    }

    #[test]
    fn equal_arity_goes_to_first_declared() {
        let info = TypeInfo::builder::<u8>()
            .constructor([ParameterInfo::of::<u16>("a")], |_| Ok(1u8))
            .constructor([ParameterInfo::of::<u32>("b")], |_| Ok(2u8))
            .build();
        let chosen = info.default_constructor().unwrap();
        assert_eq!(chosen.parameters()[0].name(), "a");
    }

    #[test]
    fn zero_parameter_lists_are_shared() {
        let first = parameter_list(Vec::new());
        let second = parameter_list(Vec::new());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn arguments_report_mismatch() {
        let mut args = Arguments::new(vec![Value::new(5u32), Value::new("text")]);
        assert_eq!(args.next::<u32>().unwrap(), 5);
        let err = args.next::<u32>().unwrap_err();
        assert!(matches!(err, ArgumentError::Mismatch { position: 1, .. }));
        assert!(matches!(args.next::<u32>(), Err(ArgumentError::Missing { position: 2 })));
    }

    #[test]
    fn construct_inject_and_seal() {
        let info = Engine::type_info();
        let constructor = info.default_constructor().unwrap();
        let mut args = Arguments::new(vec![Value::new(300u32)]);
        let mut instance = (constructor.invoker())(&mut args).unwrap();

        let label = info.member("label", MemberKind::Field).unwrap();
        assert!(label.is_attributed());
        (label.setter())(instance.as_mut(), Value::new(String::from("v8"))).unwrap();

        let start = info.method("start").unwrap();
        (start.invoker())(instance.as_mut(), &mut Arguments::new(Vec::new())).unwrap();

        let engine = info.seal(instance).unwrap().downcast::<Engine>().unwrap();
        assert_eq!(engine.power, 300);
        assert_eq!(engine.label, "v8");
        assert!(engine.started);
    }

    #[test]
    fn defaulted_parameter_is_not_a_dependency() {
        let info = TypeInfo::builder::<u8>()
            .constructor(
                [
                    ParameterInfo::of::<Arc<String>>("required"),
                    ParameterInfo::defaulted::<u16>("port"),
                ],
                |_| Ok(0u8),
            )
            .build();
        let deps = info.dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].contract(), Contract::of::<String>());
    }

    #[test]
    fn catalog_prefers_explicit_entries() {
        let catalog = Catalog::default();
        assert!(catalog.get(TypeId::of::<Engine>()).is_none());
        catalog.insert(Engine::type_info());
        assert!(catalog.contains(TypeId::of::<Engine>()));
        let first = catalog.get(TypeId::of::<Engine>()).unwrap();
        let second = catalog.get_or_describe(TypeId::of::<Engine>(), Engine::type_info);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
