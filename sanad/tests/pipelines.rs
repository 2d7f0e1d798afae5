use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sanad::prelude::*;
use sanad::{BuilderStrategy, Pipeline, PipelineBuilder, Stage};

struct Server {
    port: u16,
    label: String,
    started: bool,
    warmed: bool,
}

impl Injectable for Server {
    fn type_info() -> TypeInfo {
        TypeInfo::builder::<Server>()
            .constructor([], |_| {
                Ok(Server {
                    port: 0,
                    label: String::new(),
                    started: false,
                    warmed: false,
                })
            })
            .method("listen", [ParameterInfo::of::<u16>("port")], |server, args| {
                server.port = args.next()?;
                server.started = true;
                Ok(())
            })
            .method("label", [ParameterInfo::of::<String>("label")], |server, args| {
                server.label = args.next()?;
                Ok(())
            })
            .inject_method("warm", [], |server, _| {
                server.warmed = true;
                Ok(())
            })
            .build()
    }
}

/// Counts how often pipelines for `Server` are compiled.
#[derive(Debug, Default)]
struct CompileCounter {
    compiled: AtomicUsize,
}

impl BuilderStrategy for CompileCounter {
    fn stage(&self) -> Stage {
        Stage::Setup
    }

    fn build(&self, builder: &PipelineBuilder<'_>, next: Option<Pipeline>) -> Result<Option<Pipeline>> {
        if builder.contract() == Contract::of::<Server>() {
            self.compiled.fetch_add(1, Ordering::SeqCst);
        }
        Ok(next)
    }
}

#[derive(Debug)]
struct Passthrough;

impl BuilderStrategy for Passthrough {
    fn stage(&self) -> Stage {
        Stage::Initialization
    }
}

fn server_registration(container: &Container) -> Arc<Registration> {
    container
        .registrations()
        .into_iter()
        .find(|registration| registration.contract() == Contract::of::<Server>())
        .unwrap()
}

#[test]
fn attributed_method_runs_without_directive() {
    let container = Container::builder()
        .instance(7u16)
        .register(Registration::of::<Server>())
        .build()
        .unwrap();

    let server = container.resolve::<Server>().unwrap();
    assert!(server.warmed);
    assert!(!server.started);
}

#[test]
fn method_directive_resolves_declared_parameters() {
    let container = Container::builder()
        .instance(7u16)
        .register(Registration::of::<Server>().inject(InjectionMember::method("listen")))
        .build()
        .unwrap();

    let server = container.resolve::<Server>().unwrap();
    assert!(server.started);
    assert_eq!(server.port, 7);
}

#[test]
fn method_directive_with_literal_arguments() {
    let container = Container::builder()
        .register(
            Registration::of::<Server>()
                .inject(InjectionMember::method_with("label", [InjectionData::value(String::from("edge"))]))
                .inject(InjectionMember::method_with("listen", [InjectionData::value(9000u16)])),
        )
        .build()
        .unwrap();

    let server = container.resolve::<Server>().unwrap();
    assert_eq!(server.label, "edge");
    assert_eq!(server.port, 9000);
}

#[test]
fn unknown_method_directive_is_invalid() {
    let container = Container::builder()
        .register(Registration::of::<Server>().inject(InjectionMember::method("shutdown")))
        .build()
        .unwrap();

    assert!(matches!(
        container.resolve::<Server>(),
        Err(ResolveError::InvalidRegistration { .. })
    ));
}

#[test]
fn compiled_pipeline_is_reused_until_something_changes() {
    let counter = Arc::new(CompileCounter::default());
    let container = Container::builder()
        .instance(7u16)
        .register(Registration::of::<Server>())
        .strategy(counter.clone())
        .build()
        .unwrap();

    container.resolve::<Server>().unwrap();
    container.resolve::<Server>().unwrap();
    assert_eq!(counter.compiled.load(Ordering::SeqCst), 1);

    server_registration(&container)
        .add_member(InjectionMember::method("listen"))
        .unwrap();
    let server = container.resolve::<Server>().unwrap();
    assert!(server.started);
    assert_eq!(server.port, 7);
    assert_eq!(counter.compiled.load(Ordering::SeqCst), 2);

    container.resolve::<Server>().unwrap();
    assert_eq!(counter.compiled.load(Ordering::SeqCst), 2);

    container.add_strategy(Arc::new(Passthrough));
    container.resolve::<Server>().unwrap();
    assert_eq!(counter.compiled.load(Ordering::SeqCst), 3);
}

#[test]
fn cleared_directives_stop_method_calls() {
    let container = Container::builder()
        .instance(7u16)
        .register(Registration::of::<Server>().inject(InjectionMember::method("listen")))
        .build()
        .unwrap();
    assert!(container.resolve::<Server>().unwrap().started);

    server_registration(&container).clear_members();
    let server = container.resolve::<Server>().unwrap();
    assert!(!server.started);
    assert!(server.warmed);
}
