use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sanad::prelude::*;
use sanad::{Injectable, ResolveError};

trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Injectable)]
struct Alpha;

impl Plugin for Alpha {
    fn name(&self) -> &'static str {
        "alpha"
    }
}

#[derive(Injectable)]
struct Beta;

impl Plugin for Beta {
    fn name(&self) -> &'static str {
        "beta"
    }
}

#[derive(Injectable)]
struct Broken;

#[derive(Injectable)]
struct Greeter {
    #[inject(name = "formal")]
    greeting: String,
}

#[derive(Injectable)]
struct Chicken {
    _egg: Arc<Egg>,
}

#[derive(Injectable)]
struct Egg {
    _chicken: Arc<Chicken>,
}

struct Cache;

fn plugins() -> ContainerBuilder {
    Container::builder()
        .register(Registration::map::<dyn Plugin, Alpha, _>(|plugin| plugin))
        .register(Registration::map::<dyn Plugin, Alpha, _>(|plugin| plugin).named("alpha"))
        .register(Registration::map::<dyn Plugin, Beta, _>(|plugin| plugin).named("beta"))
        .register(Registration::try_map::<dyn Plugin, Broken, _>(|_| None).named("broken"))
}

#[test]
fn array_holds_named_registrations_and_skips_unloadable() {
    let container = plugins().build().unwrap();

    let all = container.resolve_all::<dyn Plugin>().unwrap();
    let names: Vec<&str> = all.iter().map(|plugin| plugin.name()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"alpha"));
    assert!(names.contains(&"beta"));
}

#[test]
fn unloadable_named_registration_fails_alone() {
    let container = plugins().build().unwrap();
    match container.resolve_named::<dyn Plugin>("broken") {
        Err(error) => assert!(error.is_type_load()),
        Ok(_) => panic!("cast should have failed"),
    }
}

#[test]
fn enumerable_includes_default_registration() {
    let container = plugins().build().unwrap();
    let many: Many<Arc<dyn Plugin>> = container.resolve_as().unwrap();
    assert_eq!(many.len(), 3);
    assert_eq!(many[0].name(), "alpha");
}

#[test]
fn enumerable_of_unregistered_element_is_empty() {
    let container = Container::new();
    let many: Many<Arc<dyn Plugin>> = container.resolve_as().unwrap();
    assert!(many.is_empty());
}

#[test]
fn array_sees_later_registrations() {
    let container = plugins().build().unwrap();
    assert_eq!(container.resolve_all::<dyn Plugin>().unwrap().len(), 2);

    container
        .register(Registration::map::<dyn Plugin, Beta, _>(|plugin| plugin).named("gamma"))
        .unwrap();
    assert_eq!(container.resolve_all::<dyn Plugin>().unwrap().len(), 3);
}

#[test]
fn default_mapping_is_transient() {
    let container = plugins().build().unwrap();
    let a = container.resolve::<dyn Plugin>().unwrap();
    let b = container.resolve::<dyn Plugin>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn stored_null_differs_from_absent() {
    let container = Container::builder()
        .register(Registration::instance_value(Contract::named::<Cache>("disabled"), Value::null()))
        .build()
        .unwrap();

    let stored = container
        .resolve_contract(&Contract::named::<Cache>("disabled"), &[])
        .unwrap();
    assert!(stored.is_null());

    let absent = container.resolve_contract(&Contract::of::<Cache>(), &[]);
    assert!(matches!(absent, Err(ResolveError::NotRegistered(_))));

    let optional: Option<Arc<Cache>> = container.resolve_as().unwrap();
    assert!(optional.is_none());
}

#[test]
fn exact_override_beats_newer_compatible_one() {
    let container = Container::builder()
        .register(Registration::value(String::from("Good day")).named("formal"))
        .transient::<Greeter>()
        .build()
        .unwrap();

    assert_eq!(container.resolve::<Greeter>().unwrap().greeting, "Good day");

    let overrides = [
        Override::contract(Contract::named::<String>("formal"), InjectionData::value(String::from("exact"))),
        Override::dependency::<String>(InjectionData::value(String::from("compatible"))),
    ];
    let greeter = container.resolve_with::<Greeter>(None, &overrides).unwrap();
    assert_eq!(greeter.greeting, "exact");

    let overrides = [Override::dependency::<String>(InjectionData::value(String::from("compatible")))];
    let greeter = container.resolve_with::<Greeter>(None, &overrides).unwrap();
    assert_eq!(greeter.greeting, "compatible");
}

#[test]
fn newest_parameter_override_wins() {
    let container = Container::builder()
        .register(Registration::value(String::from("Good day")).named("formal"))
        .transient::<Greeter>()
        .build()
        .unwrap();

    let overrides = [
        Override::parameter("greeting", InjectionData::value(String::from("older"))),
        Override::parameter("greeting", InjectionData::value(String::from("newer"))),
    ];
    let greeter = container.resolve_with::<Greeter>(None, &overrides).unwrap();
    assert_eq!(greeter.greeting, "newer");
}

#[test]
fn lazy_resolves_current_registration_when_forced() {
    let container = Container::new();
    container.register(Registration::value(String::from("first"))).unwrap();

    let lazy: Lazy<String> = container.resolve_as().unwrap();
    assert!(!lazy.is_forced());

    container.register(Registration::value(String::from("second"))).unwrap();
    assert_eq!(*lazy.get().unwrap(), "second");
    assert!(lazy.is_forced());
}

#[test]
fn func_resolves_on_every_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let container = Container::builder()
        .factory(Lifetime::Transient, move |_| Ok(counter.fetch_add(1, Ordering::SeqCst)))
        .build()
        .unwrap();

    let next: Func<usize> = container.resolve_as().unwrap();
    assert_eq!(*next.call().unwrap(), 0);
    assert_eq!(*next.call().unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn deferred_resolver_outliving_container_fails() {
    let container = Container::new();
    container.register(Registration::value(7u8)).unwrap();
    let next: Func<u8> = container.resolve_as().unwrap();
    drop(container);

    assert!(matches!(next.call(), Err(ResolveError::ContainerDropped { .. })));
}

#[test]
fn cycle_is_reported_with_chain() {
    let container = Container::builder()
        .transient::<Chicken>()
        .transient::<Egg>()
        .build()
        .unwrap();

    match container.resolve::<Chicken>() {
        Err(ResolveError::CircularDependency(cycle)) => {
            assert_eq!(cycle.chain.first(), cycle.chain.last());
            assert!(cycle.chain.contains(&Contract::of::<Egg>()));
        }
        other => panic!("expected a cycle, got {:?}", other.err()),
    }
    assert!(matches!(container.validate(), Err(ResolveError::CircularDependency(_))));
}

#[test]
fn factory_errors_are_captured_once() {
    #[derive(Debug)]
    struct Offline;

    impl fmt::Display for Offline {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("backend offline")
        }
    }

    impl std::error::Error for Offline {}

    let container = Container::builder()
        .factory(Lifetime::Transient, |_| Err::<Cache, BoxError>(Box::new(Offline)))
        .build()
        .unwrap();

    let error = container.resolve::<Cache>().err().unwrap();
    assert!(matches!(error, ResolveError::Captured { .. }));
    assert!(error.captured_source().unwrap().downcast_ref::<Offline>().is_some());
}
