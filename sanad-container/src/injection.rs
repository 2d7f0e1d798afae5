//! Injection directives attached to registrations.
//!
//! An [`InjectionMember`] tells the pipeline builder which constructor to
//! pick, which fields and properties to set, and which methods to call.
//! [`InjectionData`] configures where one value comes from.

use std::fmt;
use std::sync::Arc;

use crate::context::ResolutionContext;
use crate::contract::Contract;
use crate::dependency::Dependency;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::value::Value;

/// Computes a value at resolve time.
pub trait ValueProvider: Send + Sync {
    fn provide(&self, ctx: &mut ResolutionContext<'_>) -> Result<Value>;
}

impl<F> ValueProvider for F
where
    F: Fn(&mut ResolutionContext<'_>) -> Result<Value> + Send + Sync,
{
    fn provide(&self, ctx: &mut ResolutionContext<'_>) -> Result<Value> {
        self(ctx)
    }
}

/// Where one injected value comes from.
#[derive(Clone)]
pub enum InjectionData {
    /// Used as-is. A [`Contract`] stored here redirects the lookup to that
    /// contract, unless the member itself expects a `Contract`.
    Value(Value),
    /// Resolve this contract instead of the declared one.
    Redirect(Contract),
    /// Resolve the declared type under `name`.
    Dependency {
        name: Option<&'static str>,
        optional: bool,
    },
    /// Computed by a provider on every resolve.
    Provider(Arc<dyn ValueProvider>),
    /// A prebuilt pipeline.
    Pipeline(Pipeline),
}

impl InjectionData {
    pub fn value<D: Dependency>(value: D) -> Self {
        InjectionData::Value(value.into_value())
    }

    pub fn redirect(contract: Contract) -> Self {
        InjectionData::Redirect(contract)
    }

    pub fn named(name: &'static str) -> Self {
        InjectionData::Dependency {
            name: Some(name),
            optional: false,
        }
    }

    pub fn optional() -> Self {
        InjectionData::Dependency {
            name: None,
            optional: true,
        }
    }

    pub fn provider(provider: impl ValueProvider + 'static) -> Self {
        InjectionData::Provider(Arc::new(provider))
    }

    /// Computes the value with a closure on every resolve.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&mut ResolutionContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        InjectionData::Provider(Arc::new(factory))
    }
}

impl From<Value> for InjectionData {
    fn from(value: Value) -> Self {
        InjectionData::Value(value)
    }
}

impl fmt::Debug for InjectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionData::Value(value) => f.debug_tuple("Value").field(value).finish(),
            InjectionData::Redirect(contract) => f.debug_tuple("Redirect").field(contract).finish(),
            InjectionData::Dependency { name, optional } => f
                .debug_struct("Dependency")
                .field("name", name)
                .field("optional", optional)
                .finish(),
            InjectionData::Provider(_) => f.write_str("Provider(..)"),
            InjectionData::Pipeline(_) => f.write_str("Pipeline(..)"),
        }
    }
}

/// A directive on a registration.
#[derive(Debug, Clone)]
pub enum InjectionMember {
    /// Select the constructor whose parameters fit these arguments.
    Constructor(Vec<InjectionData>),
    Field {
        name: &'static str,
        data: Option<InjectionData>,
    },
    Property {
        name: &'static str,
        data: Option<InjectionData>,
    },
    /// Call a method after construction.
    Method {
        name: &'static str,
        arguments: Option<Vec<InjectionData>>,
    },
}

impl InjectionMember {
    pub fn constructor(arguments: impl IntoIterator<Item = InjectionData>) -> Self {
        InjectionMember::Constructor(arguments.into_iter().collect())
    }

    /// Selects the parameterless constructor.
    pub fn default_constructor() -> Self {
        InjectionMember::Constructor(Vec::new())
    }

    pub fn field(name: &'static str) -> Self {
        InjectionMember::Field { name, data: None }
    }

    pub fn field_with(name: &'static str, data: impl Into<InjectionData>) -> Self {
        InjectionMember::Field {
            name,
            data: Some(data.into()),
        }
    }

    pub fn property(name: &'static str) -> Self {
        InjectionMember::Property { name, data: None }
    }

    pub fn property_with(name: &'static str, data: impl Into<InjectionData>) -> Self {
        InjectionMember::Property {
            name,
            data: Some(data.into()),
        }
    }

    /// Calls `name`, resolving its declared parameters.
    pub fn method(name: &'static str) -> Self {
        InjectionMember::Method {
            name,
            arguments: None,
        }
    }

    pub fn method_with(name: &'static str, arguments: impl IntoIterator<Item = InjectionData>) -> Self {
        InjectionMember::Method {
            name,
            arguments: Some(arguments.into_iter().collect()),
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self, InjectionMember::Constructor(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_data_wraps_dependency() {
        let InjectionData::Value(value) = InjectionData::value(42u32) else {
            panic!("expected a literal");
        };
        assert_eq!(*value.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn constructor_directive_is_recognised() {
        assert!(InjectionMember::default_constructor().is_constructor());
        assert!(!InjectionMember::field("logger").is_constructor());
        let InjectionMember::Constructor(args) =
            InjectionMember::constructor([InjectionData::named("primary"), InjectionData::optional()])
        else {
            unreachable!()
        };
        assert_eq!(args.len(), 2);
    }

    fn null_provider(_: &mut ResolutionContext<'_>) -> Result<Value> {
        Ok(Value::null())
    }

    #[test]
    fn debug_hides_closures() {
        assert_eq!(format!("{:?}", InjectionData::provider(null_provider)), "Provider(..)");
        let data = InjectionData::factory(|_| Ok(Value::new(1u8)));
        assert_eq!(format!("{data:?}"), "Provider(..)");
    }
}
