//! Injection tests: implementation chains, constructor selection, singleton
//! scope and failure reporting

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tether_di::{
    ClassSchema, ConfigurationBuilder, DIError, DIResult, ErrorCategory, ExternalConstructor, Injected,
    Injector, Instance, NamedParameterSchema, TypeCatalog, Value, ValueType,
};

struct EnglishGreeter {
    name: String,
}

struct FrenchGreeter;

struct A {
    serial: usize,
}

struct Counter {
    start: i64,
}

struct Service {
    greeter: Arc<EnglishGreeter>,
    counter: Arc<Counter>,
}

struct Time(u64);

struct TimeFactory {
    epoch: u64,
}

impl ExternalConstructor for TimeFactory {
    type Output = Time;

    fn new_instance(&self) -> DIResult<Time> {
        Ok(Time(self.epoch))
    }
}

struct Legacy {
    user: String,
}

fn catalog(constructions: Arc<AtomicUsize>) -> Arc<TypeCatalog> {
    let built = constructions.clone();
    Arc::new(
        TypeCatalog::new()
            .with(ClassSchema::new("com.example.Greeter"))
            .with(
                ClassSchema::new("com.example.EnglishGreeter")
                    .implements("com.example.Greeter")
                    .inject(&["com.example.UserName"], |args| {
                        Ok(EnglishGreeter {
                            name: args.string(0)?,
                        })
                    }),
            )
            .with(
                ClassSchema::new("com.example.FrenchGreeter")
                    .implements("com.example.Greeter")
                    .inject(&[], |_| Ok(FrenchGreeter)),
            )
            .with(
                NamedParameterSchema::new("com.example.UserName", ValueType::String)
                    .short_name("user")
                    .default_value("world"),
            )
            .with(NamedParameterSchema::new("com.example.Foo", ValueType::String))
            .with(
                NamedParameterSchema::new("com.example.Start", ValueType::Integer).default_value("1"),
            )
            .with(
                NamedParameterSchema::new(
                    "com.example.GreeterChoice",
                    ValueType::Class("com.example.Greeter".into()),
                )
                .default_class("com.example.FrenchGreeter"),
            )
            .with(ClassSchema::new("com.example.A").inject(&[], move |_| {
                Ok(A {
                    serial: built.fetch_add(1, Ordering::SeqCst),
                })
            }))
            .with(
                ClassSchema::new("com.example.B")
                    .implements("com.example.A")
                    .inject(&[], move |_| {
                        Ok(A {
                            serial: constructions.fetch_add(1, Ordering::SeqCst),
                        })
                    }),
            )
            .with(
                ClassSchema::new("com.example.Counter").inject(&["com.example.Start"], |args| {
                    Ok(Counter {
                        start: args.integer(0)?,
                    })
                }),
            )
            .with(ClassSchema::new("com.example.Service").inject(
                &["com.example.EnglishGreeter", "com.example.Counter"],
                |args| {
                    Ok(Service {
                        greeter: args.get(0)?,
                        counter: args.get(1)?,
                    })
                },
            ))
            .with(ClassSchema::new("com.example.NeedsFoo").inject(&["com.example.Foo"], |_| Ok(())))
            .with(ClassSchema::new("com.example.Ping").inject(&["com.example.Pong"], |_| Ok(())))
            .with(ClassSchema::new("com.example.Pong").inject(&["com.example.Ping"], |_| Ok(())))
            .with(ClassSchema::new("com.example.UsesPing").inject(&["com.example.Ping"], |_| Ok(())))
            .with(ClassSchema::new("com.example.Time"))
            .with(
                ClassSchema::new("com.example.TimeFactory")
                    .inject(&[], |_| Ok(TimeFactory { epoch: 42 }))
                    .external_constructor::<TimeFactory>("com.example.Time"),
            )
            .with(
                ClassSchema::new("com.example.Legacy").constructor(&["com.example.UserName"], |args| {
                    Ok(Legacy {
                        user: args.string(0)?,
                    })
                }),
            )
            .with(
                ClassSchema::new("com.example.Fallible")
                    .inject(&[], |_| -> DIResult<()> {
                        Err(DIError::Construction {
                            type_name: "com.example.Fallible".into(),
                            message: "refused".into(),
                        })
                    }),
            ),
    )
}

fn builder() -> ConfigurationBuilder {
    ConfigurationBuilder::new(catalog(Arc::new(AtomicUsize::new(0))))
}

#[test]
fn test_interface_resolves_to_bound_implementation() {
    let mut builder = builder();
    builder
        .bind("com.example.Greeter", "com.example.EnglishGreeter")
        .unwrap();
    let injector = Injector::new(&builder.build());

    let greeter = injector
        .get_instance::<EnglishGreeter>("com.example.Greeter")
        .unwrap();
    assert_eq!(greeter.name, "world");
}

#[test]
fn test_bound_named_parameter_overrides_default() {
    let mut builder = builder();
    builder.bind("com.example.UserName", "tether").unwrap();
    let injector = Injector::new(&builder.build());

    let greeter = injector
        .get_instance::<EnglishGreeter>("com.example.EnglishGreeter")
        .unwrap();
    assert_eq!(greeter.name, "tether");
}

#[test]
fn test_named_instance_and_parameter_set() {
    let mut builder = builder();
    builder.bind("com.example.Foo", "woot").unwrap();
    let injector = Injector::new(&builder.build());

    assert!(injector.is_parameter_set("com.example.Foo").unwrap());
    let value = injector.get_named_instance("com.example.Foo").unwrap();
    assert_eq!(value.as_str(), Some("woot"));
}

#[test]
fn test_unset_parameter_without_default() {
    let injector = Injector::new(&builder().build());
    assert!(!injector.is_parameter_set("com.example.Foo").unwrap());
    assert!(injector.is_parameter_set("com.example.UserName").unwrap());
    assert!(matches!(
        injector.get_named_instance("com.example.Foo"),
        Err(DIError::ParameterNotSet { .. })
    ));
}

#[test]
fn test_unsatisfiable_dependency_names_parameter() {
    let injector = Injector::new(&builder().build());
    let err = injector.new_instance("com.example.NeedsFoo").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Resolution);
    match err {
        DIError::UnsatisfiableDependency {
            type_name,
            parameter,
            source,
        } => {
            assert_eq!(type_name, "com.example.NeedsFoo");
            assert_eq!(parameter, "com.example.Foo");
            assert!(matches!(*source, DIError::ParameterNotSet { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failed_resolution_leaves_injector_usable() {
    let injector = Injector::new(&builder().build());
    assert!(injector.new_instance("com.example.NeedsFoo").is_err());
    assert_eq!(
        injector
            .get_instance::<Counter>("com.example.Counter")
            .unwrap()
            .start,
        1
    );
}

#[test]
fn test_constructor_cycle_is_reported() {
    let injector = Injector::new(&builder().build());
    match injector.new_instance("com.example.UsesPing").unwrap_err() {
        DIError::ResolutionCycle { chain } => {
            assert_eq!(
                chain,
                vec!["com.example.Ping", "com.example.Pong", "com.example.Ping"]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_nested_graph() {
    let injector = Injector::new(&builder().build());
    let service = injector.get_instance::<Service>("com.example.Service").unwrap();
    assert_eq!(service.greeter.name, "world");
    assert_eq!(service.counter.start, 1);
}

#[test]
fn test_singleton_is_constructed_once_per_injector() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let mut builder = ConfigurationBuilder::new(catalog(constructions.clone()));
    builder.bind_singleton("com.example.A").unwrap();
    let conf = builder.build();

    let first = Injector::new(&conf);
    let a1 = first.new_instance("com.example.A").unwrap();
    let a2 = first.new_instance("com.example.A").unwrap();
    assert!(Arc::ptr_eq(&a1, &a2));
    assert_eq!(constructions.load(Ordering::SeqCst), 1);

    let second = Injector::new(&conf);
    let a3 = second.new_instance("com.example.A").unwrap();
    assert!(!Arc::ptr_eq(&a1, &a3));
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
}

#[test]
fn test_non_singleton_is_fresh_each_time() {
    let injector = Injector::new(&builder().build());
    let a1 = injector.get_instance::<A>("com.example.A").unwrap();
    let a2 = injector.get_instance::<A>("com.example.A").unwrap();
    assert_ne!(a1.serial, a2.serial);
}

#[test]
fn test_singleton_scope_follows_implementation_chain() {
    let mut builder = builder();
    builder.bind_singleton("com.example.A").unwrap();
    builder.bind("com.example.A", "com.example.B").unwrap();
    let injector = Injector::new(&builder.build());

    let a1 = injector.new_instance("com.example.A").unwrap();
    let a2 = injector.new_instance("com.example.A").unwrap();
    assert!(Arc::ptr_eq(&a1, &a2));
    assert_eq!(injector.singleton_count(), 1);
}

#[test]
fn test_pre_supplied_singleton_is_returned() {
    let supplied: Instance = Arc::new(A { serial: 99 });
    let mut builder = builder();
    builder
        .bind_singleton_instance("com.example.A", supplied.clone())
        .unwrap();
    let injector = Injector::new(&builder.build());

    let resolved = injector.new_instance("com.example.A").unwrap();
    assert!(Arc::ptr_eq(&resolved, &supplied));
}

#[test]
fn test_merge_preserves_singleton_identity() {
    let mut builder = builder();
    builder.bind_singleton("com.example.A").unwrap();
    let injector = Injector::new(&builder.build());
    let original = injector.new_instance("com.example.A").unwrap();

    let snapshot = injector.configuration();
    assert!(!snapshot.is_dirty());
    let merged = ConfigurationBuilder::from_configuration(&snapshot)
        .unwrap()
        .build();
    let resolved = Injector::new(&merged).new_instance("com.example.A").unwrap();
    assert!(Arc::ptr_eq(&original, &resolved));
}

#[test]
fn test_external_constructor_produces_target() {
    let mut builder = builder();
    builder
        .bind("com.example.Time", "com.example.TimeFactory")
        .unwrap();
    let injector = Injector::new(&builder.build());

    let time = injector.get_instance::<Time>("com.example.Time").unwrap();
    assert_eq!(time.0, 42);
}

#[test]
fn test_legacy_constructor_is_used_when_registered() {
    let mut builder = builder();
    assert!(matches!(
        Injector::new(&builder.build()).new_instance("com.example.Legacy"),
        Err(DIError::NoInjectableConstructor { .. })
    ));

    builder
        .register_legacy_constructor("com.example.Legacy", &["com.example.UserName"])
        .unwrap();
    let legacy = Injector::new(&builder.build())
        .get_instance::<Legacy>("com.example.Legacy")
        .unwrap();
    assert_eq!(legacy.user, "world");
}

#[test]
fn test_class_valued_parameter_default_and_binding() {
    let injector = Injector::new(&builder().build());
    let chosen = injector.get_named_instance("com.example.GreeterChoice").unwrap();
    assert!(chosen.downcast::<FrenchGreeter>().is_some());

    let mut builder = builder();
    builder
        .bind("com.example.GreeterChoice", "com.example.EnglishGreeter")
        .unwrap();
    let injector = Injector::new(&builder.build());
    let chosen = injector.get_named_instance("com.example.GreeterChoice").unwrap();
    assert_eq!(chosen.downcast::<EnglishGreeter>().unwrap().name, "world");
}

#[test]
fn test_constructor_error_is_propagated() {
    let injector = Injector::new(&builder().build());
    assert!(matches!(
        injector.new_instance("com.example.Fallible"),
        Err(DIError::Construction { ref message, .. }) if message == "refused"
    ));
}

#[test]
fn test_downcast_mismatch() {
    let injector = Injector::new(&builder().build());
    assert!(matches!(
        injector.get_instance::<Counter>("com.example.FrenchGreeter"),
        Err(DIError::InvalidServiceType { .. })
    ));
}

#[test]
fn test_unknown_and_mismatched_names() {
    let injector = Injector::new(&builder().build());
    assert!(matches!(
        injector.new_instance("com.example.Missing"),
        Err(DIError::NameResolution { .. })
    ));
    assert!(matches!(
        injector.new_instance("com.example.Foo"),
        Err(DIError::KindMismatch { .. })
    ));
}

#[test]
fn test_volatile_instance_is_injected_and_dirties_snapshot() {
    let injector = Injector::new(&builder().build());
    let supplied: Instance = Arc::new(Counter { start: 5 });
    injector
        .bind_volatile_instance("com.example.Counter", supplied.clone())
        .unwrap();

    let service = injector.get_instance::<Service>("com.example.Service").unwrap();
    assert_eq!(service.counter.start, 5);

    let snapshot = injector.configuration();
    assert!(snapshot.is_dirty());
    assert!(matches!(
        ConfigurationBuilder::from_configuration(&snapshot),
        Err(DIError::DirtyConfiguration)
    ));
}

#[test]
fn test_volatile_parameter_value() {
    let injector = Injector::new(&builder().build());
    injector
        .bind_volatile_parameter("com.example.Foo", Value::from("volatile"))
        .unwrap();
    match injector.get_named_instance("com.example.Foo").unwrap() {
        Injected::Value(Value::String(s)) => assert_eq!(s, "volatile"),
        other => panic!("unexpected value: {other:?}"),
    }
}

#[test]
fn test_concurrent_singleton_resolution_yields_one_instance() {
    let mut builder = builder();
    builder.bind_singleton("com.example.A").unwrap();
    let injector = Arc::new(Injector::new(&builder.build()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let injector = injector.clone();
            std::thread::spawn(move || injector.new_instance("com.example.A").unwrap())
        })
        .collect();
    let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}
