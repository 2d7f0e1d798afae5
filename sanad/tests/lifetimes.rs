use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use sanad::prelude::*;
use sanad::{Injectable, ResolveError};

#[derive(Injectable)]
struct Clock {
    #[inject(skip)]
    ticks: AtomicUsize,
}

#[derive(Injectable)]
struct Session {
    #[inject(skip)]
    _id: u64,
}

#[derive(Injectable)]
struct Cart {
    session: Arc<Session>,
}

#[derive(Injectable)]
struct Checkout {
    session: Arc<Session>,
}

#[derive(Injectable)]
struct Page {
    cart: Arc<Cart>,
    checkout: Arc<Checkout>,
}

#[derive(Injectable)]
struct Pair {
    first: Arc<Session>,
    second: Arc<Session>,
}

struct Slow;

#[test]
fn singleton_is_shared_across_threads() {
    let container = Container::builder().singleton::<Clock>().build().unwrap();
    let first = container.resolve::<Clock>().unwrap();
    first.ticks.fetch_add(1, Ordering::SeqCst);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || container.resolve::<Clock>().unwrap())
        })
        .collect();

    for handle in handles {
        let clock = handle.join().unwrap();
        assert!(Arc::ptr_eq(&first, &clock));
        assert_eq!(clock.ticks.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn transient_values_are_distinct() {
    let container = Container::builder().transient::<Clock>().build().unwrap();
    let a = container.resolve::<Clock>().unwrap();
    let b = container.resolve::<Clock>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn per_resolve_shared_inside_one_graph_only() {
    let container = Container::builder()
        .per_resolve::<Session>()
        .transient::<Cart>()
        .transient::<Checkout>()
        .transient::<Page>()
        .build()
        .unwrap();

    let first = container.resolve::<Page>().unwrap();
    assert!(Arc::ptr_eq(&first.cart.session, &first.checkout.session));

    let second = container.resolve::<Page>().unwrap();
    assert!(!Arc::ptr_eq(&first.cart.session, &second.cart.session));
}

#[test]
fn per_resolve_shared_between_parameters() {
    let container = Container::builder()
        .per_resolve::<Session>()
        .transient::<Pair>()
        .build()
        .unwrap();

    let one = container.resolve::<Pair>().unwrap();
    assert!(Arc::ptr_eq(&one.first, &one.second));

    let two = container.resolve::<Pair>().unwrap();
    assert!(!Arc::ptr_eq(&one.first, &two.first));
}

#[test]
fn concurrent_singleton_constructed_once() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let container = Container::builder()
        .factory(Lifetime::Singleton, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Slow)
        })
        .build()
        .unwrap();

    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.resolve::<Slow>().unwrap()
            })
        })
        .collect();
    let values: Vec<Arc<Slow>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(values.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn failed_singleton_build_releases_the_slot() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let container = Container::builder()
        .resolve_timeout(Duration::from_secs(2))
        .factory(Lifetime::Singleton, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("warming up".into());
            }
            Ok(Slow)
        })
        .build()
        .unwrap();

    let error = container.resolve::<Slow>().err().unwrap();
    assert_eq!(error.captured_source().unwrap().to_string(), "warming up");

    let retry = {
        let container = container.clone();
        thread::spawn(move || container.resolve::<Slow>().is_ok())
    };
    assert!(retry.join().unwrap());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn named_registrations_keep_their_own_lifetimes() {
    let container = Container::builder()
        .register(Registration::of::<Clock>().named("a"))
        .register(Registration::of::<Clock>().named("b").lifetime(Lifetime::Singleton))
        .build()
        .unwrap();

    let a1 = container.resolve_named::<Clock>("a").unwrap();
    let a2 = container.resolve_named::<Clock>("a").unwrap();
    assert!(!Arc::ptr_eq(&a1, &a2));

    let b1 = container.resolve_named::<Clock>("b").unwrap();
    let b2 = container.resolve_named::<Clock>("b").unwrap();
    assert!(Arc::ptr_eq(&b1, &b2));
}

#[test]
fn hierarchical_value_per_child() {
    let root = Container::builder()
        .register(Registration::of::<Clock>().lifetime(Lifetime::Hierarchical))
        .build()
        .unwrap();
    let left = root.create_child();
    let right = root.create_child();

    let l1 = left.resolve::<Clock>().unwrap();
    let l2 = left.resolve::<Clock>().unwrap();
    let r = right.resolve::<Clock>().unwrap();

    assert!(Arc::ptr_eq(&l1, &l2));
    assert!(!Arc::ptr_eq(&l1, &r));
}

#[test]
fn hierarchical_value_released_with_its_child() {
    let root = Container::builder()
        .register(Registration::of::<Clock>().lifetime(Lifetime::Hierarchical))
        .build()
        .unwrap();
    let child = root.create_child();

    let clock = child.resolve::<Clock>().unwrap();
    let weak = Arc::downgrade(&clock);
    drop(clock);
    assert!(weak.upgrade().is_some());

    drop(child);
    assert!(weak.upgrade().is_none());
    assert!(root.resolve::<Clock>().is_ok());
}

#[test]
fn waiter_times_out_on_slow_singleton() {
    let building = Arc::new(Barrier::new(2));
    let signal = building.clone();
    let container = Container::builder()
        .resolve_timeout(Duration::from_millis(50))
        .factory(Lifetime::Singleton, move |_| {
            signal.wait();
            thread::sleep(Duration::from_millis(400));
            Ok(Slow)
        })
        .build()
        .unwrap();

    let builder = {
        let container = container.clone();
        thread::spawn(move || container.resolve::<Slow>().is_ok())
    };
    building.wait();

    match container.resolve::<Slow>() {
        Err(ResolveError::Timeout { contract, waited }) => {
            assert_eq!(contract, Contract::of::<Slow>());
            assert!(waited >= Duration::from_millis(50));
        }
        other => panic!("expected a timeout, got {:?}", other.err()),
    }
    assert!(builder.join().unwrap());
    assert!(container.resolve::<Slow>().is_ok());
}

#[test]
fn external_value_lives_while_caller_holds_it() {
    let container = Container::builder()
        .register(Registration::of::<Clock>().lifetime(Lifetime::External))
        .build()
        .unwrap();

    let first = container.resolve::<Clock>().unwrap();
    first.ticks.fetch_add(1, Ordering::SeqCst);
    let again = container.resolve::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let weak = Arc::downgrade(&first);
    drop(first);
    drop(again);
    assert!(weak.upgrade().is_none());

    let rebuilt = container.resolve::<Clock>().unwrap();
    assert_eq!(rebuilt.ticks.load(Ordering::SeqCst), 0);
}

#[test]
fn per_thread_value_per_thread() {
    let container = Container::builder()
        .register(Registration::of::<Clock>().lifetime(Lifetime::PerThread))
        .build()
        .unwrap();

    let here = container.resolve::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&here, &container.resolve::<Clock>().unwrap()));

    let other = {
        let container = container.clone();
        thread::spawn(move || container.resolve::<Clock>().unwrap())
    };
    assert!(!Arc::ptr_eq(&here, &other.join().unwrap()));
}
