//! Core container implementation for Sanad DI.
//!
//! A [`Container`] turns each [`Registration`] into a cached resolve
//! pipeline built by an ordered chain of [`BuilderStrategy`] objects and
//! runs it per resolve call inside a [`ResolutionContext`].

pub mod container;
pub mod context;
pub mod contract;
pub mod dependency;
pub mod error;
mod graph;
pub mod injection;
pub mod lifetime;
pub mod options;
pub mod overrides;
pub mod pipeline;
mod processor;
pub mod provider;
pub mod reflect;
pub mod registration;
mod registry;
pub mod value;

#[doc(hidden)]
pub use inventory;

pub use container::{Container, ContainerBuilder, WeakContainer, prelude};
pub use context::{Frame, ResolutionContext};
pub use contract::Contract;
pub use dependency::{Deferred, Dependency, Func, Import, Lazy, Many, Shape, ShapeBuild, ShapeKind};
pub use error::{BoxError, ResolveError, Result};
pub use injection::{InjectionData, InjectionMember, ValueProvider};
pub use lifetime::{Lifetime, LifetimeKind, LifetimeManager, LifetimeScope};
pub use options::ContainerOptions;
pub use overrides::{InjectionSite, MatchRank, MemberTarget, Override};
pub use pipeline::{BuildUpStep, BuilderStrategy, Pipeline, PipelineBuilder, Stage, StrategyChain};
pub use provider::{Provider, ProviderRegistry};
pub use reflect::{Arguments, ArgumentError, Injectable, MemberInfo, MemberKind, ParameterInfo, TypeEntry, TypeInfo};
pub use registration::{Category, Registration, RegistrationBuilder, RegistrationData};
pub use value::{Null, Value};
