//! Resolve pipelines.
//!
//! A registration is compiled once into a [`Pipeline`]: a chain of closures
//! produced by the container's [`BuilderStrategy`] list. Strategies run in
//! [`Stage`] order:
//!
//! ```text
//! Setup → Lifetime → TypeMapping → Creation → Initialization → PostInitialization
//! └──────────── value pipeline ────────────┘  └─────── build-up steps ───────┘
//! ```
//!
//! Value strategies are composed back to front, so each one receives the
//! downstream pipeline and may wrap it or replace it with a terminal one.
//! Member strategies contribute [`BuildUpStep`]s that activation runs on a
//! freshly constructed instance and that `build_up` runs on an existing one.
//!
//! Compiled pipelines are stamped with the strategy chain version and the
//! registration's policy version; either changing forces a rebuild.

mod shapes;
mod strategies;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::container::Container;
use crate::context::ResolutionContext;
use crate::contract::Contract;
use crate::error::{ResolveError, Result};
use crate::injection::{InjectionData, InjectionMember};
use crate::reflect::TypeInfo;
use crate::registration::{Registration, RegistrationData};
use crate::value::Value;

pub use shapes::{ArrayFactory, DeferredFactory, EnumerableFactory, ShapeFactory};
pub(crate) use shapes::defaults as shape_factories;
pub use strategies::{
    ActivationStrategy, CreationStrategy, GuardStrategy, LifetimeStrategy, MappingStrategy,
    MemberInjectionStrategy, MethodInjectionStrategy,
};

/// Produces the value of one registration.
pub type Pipeline = Arc<dyn Fn(&mut ResolutionContext<'_>) -> Result<Value> + Send + Sync>;

/// Injects members into an instance that already exists.
pub type BuildUpStep =
    Arc<dyn Fn(&mut ResolutionContext<'_>, &mut (dyn Any + Send + Sync)) -> Result<()> + Send + Sync>;

/// Wraps a closure as a [`Pipeline`].
pub fn pipeline<F>(f: F) -> Pipeline
where
    F: Fn(&mut ResolutionContext<'_>) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as a [`BuildUpStep`].
pub fn step<F>(f: F) -> BuildUpStep
where
    F: Fn(&mut ResolutionContext<'_>, &mut (dyn Any + Send + Sync)) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Position of a strategy in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Setup,
    Lifetime,
    TypeMapping,
    Creation,
    Initialization,
    PostInitialization,
}

/// One link of the pipeline builder chain.
pub trait BuilderStrategy: Send + Sync + fmt::Debug {
    fn stage(&self) -> Stage;

    /// Wraps or replaces the downstream pipeline.
    fn build(&self, _builder: &PipelineBuilder<'_>, next: Option<Pipeline>) -> Result<Option<Pipeline>> {
        Ok(next)
    }

    /// Adds steps run after construction.
    fn build_up(&self, _builder: &PipelineBuilder<'_>, _steps: &mut Vec<BuildUpStep>) -> Result<()> {
        Ok(())
    }
}

struct ChainState {
    version: u64,
    strategies: Arc<[Arc<dyn BuilderStrategy>]>,
}

/// Ordered, versioned strategy list shared by a container hierarchy.
pub struct StrategyChain {
    state: RwLock<ChainState>,
}

impl StrategyChain {
    pub fn new(mut strategies: Vec<Arc<dyn BuilderStrategy>>) -> Self {
        strategies.sort_by_key(|s| s.stage());
        Self {
            state: RwLock::new(ChainState {
                version: 0,
                strategies: strategies.into(),
            }),
        }
    }

    /// The built-in strategies.
    pub fn with_defaults() -> Self {
        Self::new(strategies::defaults())
    }

    /// Inserts a strategy after every existing one of the same stage.
    pub fn add(&self, strategy: Arc<dyn BuilderStrategy>) {
        let mut state = self.state.write();
        let mut strategies = state.strategies.to_vec();
        debug!(?strategy, stage = ?strategy.stage(), "Added builder strategy");
        strategies.push(strategy);
        strategies.sort_by_key(|s| s.stage());
        state.strategies = strategies.into();
        state.version += 1;
    }

    /// Invalidates every compiled pipeline.
    pub fn touch(&self) {
        self.state.write().version += 1;
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn len(&self) -> usize {
        self.state.read().strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn snapshot(&self) -> (u64, Arc<[Arc<dyn BuilderStrategy>]>) {
        let state = self.state.read();
        (state.version, state.strategies.clone())
    }
}

impl fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("StrategyChain")
            .field("version", &state.version)
            .field("strategies", &state.strategies)
            .finish()
    }
}

/// What strategies see while a registration is compiled.
pub struct PipelineBuilder<'a> {
    container: &'a Container,
    registration: &'a Registration,
    type_info: Option<Arc<TypeInfo>>,
    members: Vec<InjectionMember>,
    build_up: Arc<[BuildUpStep]>,
}

impl<'a> PipelineBuilder<'a> {
    fn new(container: &'a Container, registration: &'a Registration) -> Self {
        let type_info = match registration.data() {
            RegistrationData::Type {
                target,
                cast: None,
                describe,
            } => match describe {
                Some(describe) => Some(container.catalog().get_or_describe(target.type_id(), *describe)),
                None => container.catalog().get(target.type_id()),
            },
            _ => None,
        };

        Self {
            container,
            registration,
            type_info,
            members: registration.members(),
            build_up: Arc::from(Vec::new()),
        }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    pub fn registration(&self) -> &'a Registration {
        self.registration
    }

    pub fn contract(&self) -> Contract {
        self.registration.contract()
    }

    /// Metadata of the type activation builds, when the registration
    /// constructs one.
    pub fn type_info(&self) -> Option<&Arc<TypeInfo>> {
        self.type_info.as_ref()
    }

    /// Injection directives, as of compile time.
    pub fn members(&self) -> &[InjectionMember] {
        &self.members
    }

    /// Arguments of the constructor directive, if any.
    pub fn constructor_directive(&self) -> Option<&[InjectionData]> {
        self.members.iter().find_map(|member| match member {
            InjectionMember::Constructor(arguments) => Some(arguments.as_slice()),
            _ => None,
        })
    }

    /// Steps collected from the member strategies.
    pub fn build_up_steps(&self) -> Arc<[BuildUpStep]> {
        self.build_up.clone()
    }
}

/// A cached pipeline and the versions it was built against.
pub(crate) struct Compiled {
    pub chain_version: u64,
    pub policy_version: u64,
    pub pipeline: Pipeline,
    pub build_up: Arc<[BuildUpStep]>,
}

impl Compiled {
    pub fn is_current(&self, chain_version: u64, policy_version: u64) -> bool {
        self.chain_version == chain_version && self.policy_version == policy_version
    }
}

impl fmt::Debug for Compiled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiled")
            .field("chain_version", &self.chain_version)
            .field("policy_version", &self.policy_version)
            .field("build_up", &self.build_up.len())
            .finish()
    }
}

/// Runs every strategy against `registration`.
pub(crate) fn compile(container: &Container, registration: &Registration) -> Result<Compiled> {
    let (chain_version, strategies) = container.strategies().snapshot();
    let policy_version = registration.policy_version();
    let contract = registration.contract();

    let mut builder = PipelineBuilder::new(container, registration);

    let mut steps = Vec::new();
    for strategy in strategies.iter() {
        strategy.build_up(&builder, &mut steps)?;
    }
    builder.build_up = steps.into();

    let mut next = None;
    for strategy in strategies.iter().rev() {
        next = strategy.build(&builder, next)?;
    }
    let pipeline = next.ok_or_else(|| ResolveError::invalid(contract, "no strategy produced a value"))?;

    debug!(
        contract = %contract,
        category = ?registration.category(),
        steps = builder.build_up.len(),
        "Built resolve pipeline"
    );

    Ok(Compiled {
        chain_version,
        policy_version,
        pipeline,
        build_up: builder.build_up,
    })
}
