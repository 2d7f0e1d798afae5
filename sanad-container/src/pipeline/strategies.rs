//! Built-in builder strategies.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{BuildUpStep, BuilderStrategy, Pipeline, PipelineBuilder, Stage, pipeline, step};
use crate::context::ResolutionContext;
use crate::contract::Contract;
use crate::dependency::{Import, found_name};
use crate::error::{ResolveError, Result};
use crate::injection::{InjectionData, InjectionMember};
use crate::lifetime::{AcquireError, Acquired, LifetimeKind};
use crate::overrides::{InjectionSite, MemberTarget};
use crate::processor::{ImportPlan, select_constructor};
use crate::reflect::{Arguments, MemberKind, ParameterInfo};
use crate::registration::{Category, RegistrationData};
use crate::value::Value;

pub(super) fn defaults() -> Vec<Arc<dyn BuilderStrategy>> {
    vec![
        Arc::new(GuardStrategy),
        Arc::new(LifetimeStrategy),
        Arc::new(MappingStrategy),
        Arc::new(CreationStrategy),
        Arc::new(ActivationStrategy),
        Arc::new(MemberInjectionStrategy),
        Arc::new(MethodInjectionStrategy),
    ]
}

fn parameter_plans(
    declaring: Contract,
    parameters: &[ParameterInfo],
    arguments: &[InjectionData],
) -> Arc<[ImportPlan]> {
    parameters
        .iter()
        .enumerate()
        .map(|(position, parameter)| {
            let target = MemberTarget {
                declaring,
                site: InjectionSite::Parameter,
                name: parameter.name(),
                contract: parameter.import().contract(),
            };
            ImportPlan::new(target, parameter.import(), arguments.get(position), parameter.default_fn())
        })
        .collect()
}

fn resolve_all(plans: &[ImportPlan], ctx: &mut ResolutionContext<'_>) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(plans.len());
    for plan in plans {
        values.push(plan.resolve(ctx)?);
    }
    Ok(values)
}

/// Rejects re-entry of a contract that is still being resolved.
#[derive(Debug, Default)]
pub struct GuardStrategy;

impl BuilderStrategy for GuardStrategy {
    fn stage(&self) -> Stage {
        Stage::Setup
    }

    fn build(&self, _builder: &PipelineBuilder<'_>, next: Option<Pipeline>) -> Result<Option<Pipeline>> {
        Ok(next.map(|next| {
            pipeline(move |ctx| {
                ctx.check_cycle()?;
                next(ctx)
            })
        }))
    }
}

/// Consults the registration's lifetime manager before building and
/// stores the built value afterwards.
#[derive(Debug, Default)]
pub struct LifetimeStrategy;

impl BuilderStrategy for LifetimeStrategy {
    fn stage(&self) -> Stage {
        Stage::Lifetime
    }

    fn build(&self, builder: &PipelineBuilder<'_>, next: Option<Pipeline>) -> Result<Option<Pipeline>> {
        let Some(next) = next else {
            return Ok(None);
        };
        let registration = builder.registration();
        if matches!(registration.category(), Category::Instance | Category::Internal) {
            return Ok(Some(next));
        }

        let contract = registration.contract();
        let manager = registration.lifetime_manager().clone();

        let wrapped = match manager.kind() {
            LifetimeKind::Transient => next,
            LifetimeKind::PerResolve => pipeline(move |ctx| {
                if let Some(value) = ctx.per_resolve_value(&contract) {
                    return Ok(value);
                }
                let value = next(ctx)?;
                ctx.store_per_resolve(contract, value.clone());
                Ok(value)
            }),
            LifetimeKind::Synchronized => {
                let timeout = manager.timeout().or(builder.container().options().resolve_timeout());
                pipeline(move |ctx| {
                    let scope = ctx.lifetime_scope();
                    let slot = manager
                        .slot(&scope)
                        .ok_or_else(|| ResolveError::invalid(contract, "synchronized lifetime has no slot"))?;
                    match slot.acquire(timeout) {
                        Ok(Acquired::Ready(value)) => Ok(value),
                        Ok(Acquired::Build(guard)) => {
                            let value = next(ctx)?;
                            guard.complete(value.clone());
                            Ok(value)
                        }
                        Err(AcquireError::Reentrant) => Err(ctx.cycle_error(contract)),
                        Err(AcquireError::Timeout(waited)) => {
                            warn!(contract = %contract, ?waited, "Timed out waiting for synchronized lifetime");
                            Err(ResolveError::Timeout { contract, waited })
                        }
                    }
                })
            }
            LifetimeKind::Cached => pipeline(move |ctx| {
                let scope = ctx.lifetime_scope();
                if let Some(value) = manager.get_value(&scope) {
                    return Ok(value);
                }
                let value = next(ctx)?;
                manager.set_value(value.clone(), &scope);
                Ok(value)
            }),
        };
        Ok(Some(wrapped))
    }
}

/// Resolves the target of a type mapping and casts it to the contract.
#[derive(Debug, Default)]
pub struct MappingStrategy;

impl BuilderStrategy for MappingStrategy {
    fn stage(&self) -> Stage {
        Stage::TypeMapping
    }

    fn build(&self, builder: &PipelineBuilder<'_>, next: Option<Pipeline>) -> Result<Option<Pipeline>> {
        let registration = builder.registration();
        let RegistrationData::Type {
            target,
            cast: Some(cast),
            ..
        } = registration.data()
        else {
            return Ok(next);
        };

        let contract = registration.contract();
        let import = Import::of(*target);
        let cast = cast.clone();
        Ok(Some(pipeline(move |ctx| {
            let value = ctx.resolve_import(&import)?;
            let found = found_name(&value);
            cast(value).ok_or_else(|| {
                ResolveError::type_load(contract, format!("{found} cannot be used as {}", contract.type_name()))
            })
        })))
    }
}

/// Terminal pipelines for registrations that do not construct a type.
#[derive(Debug, Default)]
pub struct CreationStrategy;

impl BuilderStrategy for CreationStrategy {
    fn stage(&self) -> Stage {
        Stage::Creation
    }

    fn build(&self, builder: &PipelineBuilder<'_>, next: Option<Pipeline>) -> Result<Option<Pipeline>> {
        let contract = builder.contract();
        let terminal = match builder.registration().data() {
            RegistrationData::Type { .. } => return Ok(next),
            RegistrationData::Instance(value) => {
                let value = value.clone();
                pipeline(move |_| Ok(value.clone()))
            }
            RegistrationData::Factory(factory) => {
                let factory = factory.clone();
                pipeline(move |ctx| factory(ctx).map_err(|error| ResolveError::from_user(contract, error)))
            }
            RegistrationData::Internal => pipeline(|ctx| Ok(Value::new(ctx.container().clone()))),
            RegistrationData::Shape(shape) => {
                let factory = builder.container().shape_factory(shape.kind).ok_or_else(|| {
                    ResolveError::invalid(contract, format!("no factory synthesizes {:?} shapes", shape.kind))
                })?;
                factory.pipeline(contract, shape)?
            }
        };
        Ok(Some(terminal))
    }
}

/// Selects a constructor, resolves its parameters, runs the build-up
/// steps and seals the instance.
#[derive(Debug, Default)]
pub struct ActivationStrategy;

impl BuilderStrategy for ActivationStrategy {
    fn stage(&self) -> Stage {
        Stage::Creation
    }

    fn build(&self, builder: &PipelineBuilder<'_>, next: Option<Pipeline>) -> Result<Option<Pipeline>> {
        if !builder.registration().is_activated() {
            return Ok(next);
        }
        let contract = builder.contract();
        let info = builder
            .type_info()
            .cloned()
            .ok_or_else(|| ResolveError::ConstructorNotFound {
                contract,
                reason: "no construction metadata is known for this type".into(),
            })?;

        let directive = builder.constructor_directive();
        let constructor = select_constructor(&info, directive, contract)?;
        let plans = parameter_plans(info.contract(), constructor.parameters(), directive.unwrap_or(&[]));
        let invoke = constructor.invoker();
        let steps = builder.build_up_steps();

        debug!(
            contract = %contract,
            arity = constructor.arity(),
            steps = steps.len(),
            "Selected constructor"
        );

        Ok(Some(pipeline(move |ctx| {
            let arguments = resolve_all(&plans, ctx)?;
            let mut instance =
                invoke(&mut Arguments::new(arguments)).map_err(|error| ResolveError::from_user(contract, error))?;
            for inject in steps.iter() {
                inject(ctx, instance.as_mut())?;
            }
            info.seal(instance).ok_or(ResolveError::TypeMismatch {
                contract,
                expected: info.type_name(),
                found: "an instance of another type",
            })
        })))
    }
}

/// Injects fields and properties: attributed ones always, others when a
/// directive names them.
#[derive(Debug, Default)]
pub struct MemberInjectionStrategy;

impl BuilderStrategy for MemberInjectionStrategy {
    fn stage(&self) -> Stage {
        Stage::Initialization
    }

    fn build_up(&self, builder: &PipelineBuilder<'_>, steps: &mut Vec<BuildUpStep>) -> Result<()> {
        let Some(info) = builder.type_info() else {
            return Ok(());
        };
        let contract = builder.contract();

        for member in builder.members() {
            let (name, kind) = match member {
                InjectionMember::Field { name, .. } => (*name, MemberKind::Field),
                InjectionMember::Property { name, .. } => (*name, MemberKind::Property),
                _ => continue,
            };
            if info.member(name, kind).is_none() {
                return Err(ResolveError::invalid(
                    contract,
                    format!("{} has no injectable {kind} named `{name}`", info.type_name()),
                ));
            }
        }

        for member in info.members() {
            let directive = builder.members().iter().rev().find_map(|configured| match configured {
                InjectionMember::Field { name, data } if member.kind() == MemberKind::Field && *name == member.name() => {
                    Some(data.as_ref())
                }
                InjectionMember::Property { name, data }
                    if member.kind() == MemberKind::Property && *name == member.name() =>
                {
                    Some(data.as_ref())
                }
                _ => None,
            });
            if directive.is_none() && !member.is_attributed() {
                continue;
            }

            let target = MemberTarget {
                declaring: info.contract(),
                site: match member.kind() {
                    MemberKind::Field => InjectionSite::Field,
                    MemberKind::Property => InjectionSite::Property,
                },
                name: member.name(),
                contract: member.import().contract(),
            };
            let plan = ImportPlan::new(target, member.import(), directive.flatten(), member.default_fn());
            let set = member.setter();
            steps.push(step(move |ctx, instance| {
                let value = plan.resolve(ctx)?;
                set(instance, value).map_err(|error| ResolveError::from_user(contract, error))
            }));
        }
        Ok(())
    }
}

/// Calls injection methods after construction.
#[derive(Debug, Default)]
pub struct MethodInjectionStrategy;

impl BuilderStrategy for MethodInjectionStrategy {
    fn stage(&self) -> Stage {
        Stage::PostInitialization
    }

    fn build_up(&self, builder: &PipelineBuilder<'_>, steps: &mut Vec<BuildUpStep>) -> Result<()> {
        let Some(info) = builder.type_info() else {
            return Ok(());
        };
        let contract = builder.contract();

        for member in builder.members() {
            let InjectionMember::Method { name, arguments } = member else {
                continue;
            };
            let method = info.method(name).ok_or_else(|| {
                ResolveError::invalid(contract, format!("{} has no injection method `{name}`", info.type_name()))
            })?;
            if let Some(arguments) = arguments {
                if arguments.len() != method.parameters().len() {
                    return Err(ResolveError::invalid(
                        contract,
                        format!(
                            "method `{name}` takes {} argument(s), {} configured",
                            method.parameters().len(),
                            arguments.len()
                        ),
                    ));
                }
            }
        }

        for method in info.methods() {
            let directive = builder.members().iter().rev().find_map(|configured| match configured {
                InjectionMember::Method { name, arguments } if *name == method.name() => Some(arguments.as_deref()),
                _ => None,
            });
            if directive.is_none() && !method.is_attributed() {
                continue;
            }

            let plans = parameter_plans(info.contract(), method.parameters(), directive.flatten().unwrap_or(&[]));
            let invoke = method.invoker();
            steps.push(step(move |ctx, instance| {
                let arguments = resolve_all(&plans, ctx)?;
                invoke(instance, &mut Arguments::new(arguments)).map_err(|error| ResolveError::from_user(contract, error))
            }));
        }
        Ok(())
    }
}
