use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sanad::prelude::*;
use sanad::{Injectable, MemberKind};

struct Audit {
    channel: &'static str,
}

struct Clock;

#[derive(Injectable)]
struct Report {
    title: String,
    #[inject(name = "footer")]
    footer: String,
    #[inject(default)]
    copies: u32,
    #[inject(field)]
    audit: Option<Arc<Audit>>,
    #[inject(setter = "set_clock")]
    clock: Option<Arc<Clock>>,
    #[inject(skip)]
    renders: AtomicUsize,
}

impl Report {
    fn set_clock(&mut self, clock: Option<Arc<Clock>>) {
        self.clock = clock;
    }
}

#[derive(Injectable)]
struct Port(u16);

#[derive(Injectable, Default)]
struct Widget {
    #[inject(field)]
    audit: Option<Arc<Audit>>,
}

#[derive(Injectable)]
#[injectable(catalog = false)]
struct Hidden;

#[derive(Injectable)]
struct Visible;

#[derive(Injectable)]
struct Dashboard {
    #[inject(name = "primary")]
    panel: Arc<Visible>,
}

fn container() -> Container {
    Container::builder()
        .instance(String::from("Quarterly"))
        .register(Registration::value(String::from("page 1")).named("footer"))
        .instance(Audit { channel: "stdout" })
        .instance(Clock)
        .instance(8080u16)
        .build()
        .unwrap()
}

#[test]
fn derived_metadata_describes_members() {
    let info = Report::type_info();
    let constructor = info.default_constructor().unwrap();
    let names: Vec<&str> = constructor.parameters().iter().map(|p| p.name()).collect();
    assert_eq!(names, ["title", "footer", "copies"]);
    assert!(constructor.parameters()[2].has_default());

    assert!(info.member("audit", MemberKind::Field).unwrap().is_attributed());
    assert!(info.member("clock", MemberKind::Property).is_some());
    assert!(info.member("renders", MemberKind::Field).is_none());
}

#[test]
fn derived_type_resolves_every_member() {
    let report = container().resolve::<Report>().unwrap();

    assert_eq!(report.title, "Quarterly");
    assert_eq!(report.footer, "page 1");
    assert_eq!(report.copies, 0);
    assert_eq!(report.audit.as_ref().unwrap().channel, "stdout");
    assert!(report.clock.is_some());
    assert_eq!(report.renders.load(Ordering::SeqCst), 0);
}

#[test]
fn optional_member_left_empty_when_unregistered() {
    let container = Container::new();
    let widget = container.resolve::<Widget>().unwrap();
    assert!(widget.audit.is_none());
}

#[test]
fn tuple_struct_takes_positional_parameters() {
    assert_eq!(container().resolve::<Port>().unwrap().0, 8080);
}

#[test]
fn build_up_injects_existing_instance() {
    let widget = container().build_up(Widget::default()).unwrap();
    assert_eq!(widget.audit.unwrap().channel, "stdout");
}

#[test]
fn catalog_submission_can_be_disabled() {
    let container = Container::new();
    assert!(container.resolve::<Visible>().is_ok());
    assert!(container.resolve::<Hidden>().is_err());

    container.register_type_info(Hidden::type_info());
    assert!(container.resolve::<Hidden>().is_ok());
}

#[test]
fn named_import_of_unregistered_concrete_type_is_built() {
    let container = Container::new();
    assert!(container.resolve_named::<Visible>("primary").is_ok());
    assert!(!container.is_registered_named::<Visible>("primary"));

    let dashboard = container.resolve::<Dashboard>().unwrap();
    let _panel: &Visible = &dashboard.panel;

    let validated = Container::builder()
        .validate_on_build(true)
        .transient::<Dashboard>()
        .build();
    assert!(validated.is_ok());
}
