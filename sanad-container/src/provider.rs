//! Provider trait: a module of related registrations.
//!
//! # Examples
//! ```rust,ignore
//! struct DatabaseProvider;
//!
//! impl Provider for DatabaseProvider {
//!     fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
//!         registry.register(Registration::of::<Database>().lifetime(Lifetime::Singleton))?;
//!         registry.register(Registration::map::<dyn Repository, PostgresRepository, _>(|repo| repo))
//!     }
//! }
//!
//! let container = Container::builder().add_provider(&DatabaseProvider).build()?;
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::pipeline::BuilderStrategy;
use crate::registration::RegistrationBuilder;

/// A module that registers related dependencies.
///
/// Split registrations by domain instead of one giant block:
///
/// ```rust,ignore
/// container.add_provider(&DatabaseProvider)?;
/// container.add_provider(&AuthProvider)?;
/// ```
pub trait Provider: Send + Sync {
    fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// What providers register into: a [`ContainerBuilder`](crate::ContainerBuilder)
/// or a live [`Container`](crate::Container).
pub trait ProviderRegistry {
    fn register(&mut self, registration: RegistrationBuilder) -> Result<()>;

    fn add_strategy(&mut self, strategy: Arc<dyn BuilderStrategy>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Contract;
    use crate::lifetime::Lifetime;
    use crate::pipeline::Stage;
    use crate::registration::Registration;

    // Mock registry for testing providers
    #[derive(Default)]
    struct MockRegistry {
        contracts: Vec<Contract>,
        strategies: usize,
    }

    impl ProviderRegistry for MockRegistry {
        fn register(&mut self, registration: RegistrationBuilder) -> Result<()> {
            self.contracts.push(registration.contract());
            Ok(())
        }

        fn add_strategy(&mut self, _strategy: Arc<dyn BuilderStrategy>) {
            self.strategies += 1;
        }
    }

    #[derive(Debug)]
    struct Noop;

    impl BuilderStrategy for Noop {
        fn stage(&self) -> Stage {
            Stage::Setup
        }
    }

    struct TestProvider;

    impl Provider for TestProvider {
        fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
            registry.register(Registration::value(String::from("hello")))?;
            registry.register(
                Registration::factory(|_| Ok(42i32))
                    .named("answer")
                    .lifetime(Lifetime::Singleton),
            )?;
            registry.add_strategy(Arc::new(Noop));
            Ok(())
        }
    }

    #[test]
    fn provider_registers_dependencies() {
        let mut registry = MockRegistry::default();
        TestProvider.register(&mut registry).unwrap();

        assert_eq!(
            registry.contracts,
            vec![Contract::of::<String>(), Contract::named::<i32>("answer")]
        );
        assert_eq!(registry.strategies, 1);
    }

    struct MisconfiguredProvider;

    impl Provider for MisconfiguredProvider {
        fn register(&self, registry: &mut dyn ProviderRegistry) -> Result<()> {
            registry.register(Registration::value(1u8))?;
            Err(crate::error::ResolveError::invalid(
                Contract::of::<String>(),
                "missing connection string",
            ))
        }
    }

    #[test]
    fn failing_provider_fails_build() {
        let result = crate::Container::builder()
            .add_provider(&TestProvider)
            .add_provider(&MisconfiguredProvider)
            .build();

        match result {
            Err(crate::error::ResolveError::InvalidRegistration { contract, reason }) => {
                assert_eq!(contract, Contract::of::<String>());
                assert_eq!(reason, "missing connection string");
            }
            other => panic!("Expected InvalidRegistration, got: {:?}", other.map(|c| c.id())),
        }
    }

    #[test]
    fn provider_has_name() {
        assert!(TestProvider.name().contains("TestProvider"));
    }

    #[test]
    fn provider_into_container() {
        let container = crate::Container::new();
        let before = container.strategies().version();
        container.add_provider(&TestProvider).unwrap();

        assert_eq!(*container.resolve_named::<i32>("answer").unwrap(), 42);
        assert_eq!(*container.resolve::<String>().unwrap(), "hello");
        assert!(container.strategies().version() > before);
    }
}
