//! Member and parameter processors.
//!
//! Each injectable member is turned into an [`ImportPlan`] when a pipeline
//! is built. At resolve time the plan checks overrides first, then uses
//! its classified [`ImportSource`], and substitutes the declared default
//! when resolution fails and the member allows it.

use std::any::TypeId;
use std::sync::Arc;

use tracing::trace;

use crate::context::ResolutionContext;
use crate::contract::Contract;
use crate::dependency::Import;
use crate::error::{ResolveError, Result};
use crate::injection::InjectionData;
use crate::overrides::{MemberTarget, find_override};
use crate::pipeline::Pipeline;
use crate::reflect::{ConstructorInfo, DefaultFn, ParameterInfo, TypeInfo};
use crate::value::Value;

/// Where a member's value comes from.
#[derive(Clone)]
pub(crate) enum ImportSource {
    /// Looked up in the container.
    Container(Import),
    /// Used as-is.
    Literal(Value),
    /// Produced by a nested pipeline.
    Pipeline(Pipeline),
}

/// Classifies configured injection data for a member importing `import`.
pub(crate) fn classify(data: Option<&InjectionData>, import: &Import) -> ImportSource {
    match data {
        None => ImportSource::Container(import.clone()),
        Some(InjectionData::Value(value)) => match value.downcast::<Contract>() {
            Some(contract) if !expects_contract(import) => ImportSource::Container(redirect(import, *contract)),
            _ => ImportSource::Literal(value.clone()),
        },
        Some(InjectionData::Redirect(contract)) => ImportSource::Container(redirect(import, *contract)),
        Some(InjectionData::Dependency { name, optional }) => {
            let mut resolved = match name {
                Some(name) => import.clone().named(name),
                None => import.clone(),
            };
            if *optional {
                resolved = resolved.optional();
            }
            ImportSource::Container(resolved)
        }
        Some(InjectionData::Provider(provider)) => {
            let provider = provider.clone();
            ImportSource::Pipeline(Arc::new(move |ctx: &mut ResolutionContext<'_>| provider.provide(ctx)))
        }
        Some(InjectionData::Pipeline(pipeline)) => ImportSource::Pipeline(pipeline.clone()),
    }
}

fn expects_contract(import: &Import) -> bool {
    import.target().type_id() == TypeId::of::<Contract>()
}

fn redirect(import: &Import, contract: Contract) -> Import {
    let redirected = Import::of(contract);
    if import.is_optional() {
        redirected.optional()
    } else {
        redirected
    }
}

/// `true` when `data` can feed `parameter`. Used for constructor selection.
pub(crate) fn fits(parameter: &ParameterInfo, data: &InjectionData) -> bool {
    let redirect_fits = |contract: &Contract| contract.same_type(&parameter.import().contract());
    match data {
        InjectionData::Value(value) => match value.downcast::<Contract>() {
            Some(contract) if !expects_contract(parameter.import()) => redirect_fits(&contract),
            _ => parameter.accepts(value),
        },
        InjectionData::Redirect(contract) => redirect_fits(contract),
        InjectionData::Dependency { .. } | InjectionData::Provider(_) | InjectionData::Pipeline(_) => true,
    }
}

/// Picks the constructor activation will call.
///
/// With a directive, the first constructor whose parameters fit the
/// configured arguments wins. Without one, the type's default constructor.
pub(crate) fn select_constructor<'i>(
    info: &'i TypeInfo,
    directive: Option<&[InjectionData]>,
    contract: Contract,
) -> Result<&'i ConstructorInfo> {
    let Some(arguments) = directive else {
        return info
            .default_constructor()
            .ok_or_else(|| ResolveError::ConstructorNotFound {
                contract,
                reason: format!("{} declares no constructors", info.type_name()),
            });
    };

    info.constructors()
        .iter()
        .find(|constructor| {
            constructor.arity() == arguments.len()
                && constructor
                    .parameters()
                    .iter()
                    .zip(arguments)
                    .all(|(parameter, data)| fits(parameter, data))
        })
        .ok_or_else(|| ResolveError::ConstructorNotFound {
            contract,
            reason: format!(
                "{} has no constructor taking {} argument(s) of the configured types",
                info.type_name(),
                arguments.len()
            ),
        })
}

/// Compiled resolution of one member.
#[derive(Clone)]
pub(crate) struct ImportPlan {
    target: MemberTarget,
    import: Import,
    source: ImportSource,
    default: Option<DefaultFn>,
}

impl ImportPlan {
    pub fn new(
        target: MemberTarget,
        import: &Import,
        data: Option<&InjectionData>,
        default: Option<DefaultFn>,
    ) -> Self {
        Self {
            target,
            import: import.clone(),
            source: classify(data, import),
            default,
        }
    }

    pub fn resolve(&self, ctx: &mut ResolutionContext<'_>) -> Result<Value> {
        if let Some(found) = find_override(ctx.overrides(), &self.target) {
            trace!(member = self.target.name, "Using resolve-time override");
            let source = classify(Some(found.data()), &self.import);
            return self.execute(&source, ctx);
        }
        self.execute(&self.source, ctx)
    }

    fn execute(&self, source: &ImportSource, ctx: &mut ResolutionContext<'_>) -> Result<Value> {
        let result = match source {
            ImportSource::Container(import) => ctx.resolve_import(import),
            ImportSource::Literal(value) => Ok(value.clone()),
            ImportSource::Pipeline(pipeline) => pipeline(ctx),
        };

        match result {
            Err(error) if error.is_resolution_failure() && self.allows_default(source) => {
                trace!(member = self.target.name, %error, "Substituting default");
                Ok(self.default.map_or_else(Value::null, |default| default()))
            }
            other => other,
        }
    }

    fn allows_default(&self, source: &ImportSource) -> bool {
        self.default.is_some()
            || self.import.is_optional()
            || matches!(source, ImportSource::Container(import) if import.is_optional())
    }
}
