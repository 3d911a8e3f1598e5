//! Object-graph construction from a sealed configuration
//!
//! Every request runs in two phases. Planning walks implementation chains,
//! picks a constructor for each type and resolves named parameters without
//! constructing anything, so ambiguity and cycles are reported before any
//! user code runs. Execution then calls constructors bottom-up and memoizes
//! singletons.
//!
//! An [`Injector`] is `Send + Sync`. The singleton cache is guarded by a
//! mutex that is never held while a constructor runs; if two threads race
//! to build the same singleton, the first instance stored wins and both
//! callers receive it.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::configuration::{BindingKind, Configuration, NamedParameterBinding};
use crate::namespace::{ClassNode, NamedParameterNode, Node};
use crate::schema::{Args, ConstructorDef, Injected, Instance};
use crate::value::{self, Value, ValueType};
use crate::{DIError, DIResult};

/// A fully resolved recipe for one value in the graph
enum Plan {
    Cached(Instance),
    Value(Value),
    Construct {
        class: Arc<ClassNode>,
        constructor: ConstructorDef,
        args: Vec<Plan>,
        memoize: Vec<String>,
    },
    External {
        factory: Box<Plan>,
        producer: Arc<ClassNode>,
        memoize: Vec<String>,
    },
}

#[derive(Default)]
struct InjectorState {
    singletons: IndexMap<String, Instance>,
    parameters: IndexMap<String, Value>,
    dirty: bool,
}

/// Builds instances from a [`Configuration`]
pub struct Injector {
    conf: Configuration,
    state: Mutex<InjectorState>,
}

impl Injector {
    pub fn new(conf: &Configuration) -> Self {
        let mut state = InjectorState {
            dirty: conf.is_dirty(),
            ..InjectorState::default()
        };
        for (name, instance) in &conf.state().singletons {
            if let Some(instance) = instance {
                state.singletons.insert(name.clone(), instance.clone());
            }
        }
        info!(
            "Created injector with {} pre-supplied singletons",
            state.singletons.len()
        );
        Self {
            conf: conf.clone(),
            state: Mutex::new(state),
        }
    }

    /// Build (or fetch the memoized singleton of) the named type
    pub fn new_instance(&self, name: &str) -> DIResult<Instance> {
        let mut stack = Vec::new();
        let plan = self.plan_class(name, &mut stack)?;
        match self.execute(&plan)? {
            Injected::Object(instance) => Ok(instance),
            Injected::Value(_) => Err(DIError::InvalidServiceType {
                message: format!("{} resolved to a value, not an object", name),
            }),
        }
    }

    /// [`Injector::new_instance`] followed by a downcast to `T`
    pub fn get_instance<T: Send + Sync + 'static>(&self, name: &str) -> DIResult<Arc<T>> {
        self.new_instance(name)?
            .downcast::<T>()
            .map_err(|_| DIError::InvalidServiceType {
                message: format!("{} is not a {}", name, std::any::type_name::<T>()),
            })
    }

    /// The value of a named parameter: volatile, bound, default value or
    /// default class, in that order
    pub fn get_named_instance(&self, marker: &str) -> DIResult<Injected> {
        let node = self.node(marker)?;
        let param = node.expect_named_parameter()?;
        let mut stack = Vec::new();
        let plan = self.plan_named_parameter(param, &mut stack)?;
        self.execute(&plan)
    }

    /// Whether the parameter has a bound value or a usable default
    pub fn is_parameter_set(&self, marker: &str) -> DIResult<bool> {
        let node = self.node(marker)?;
        let param = node.expect_named_parameter()?;
        Ok(self.state.lock().parameters.contains_key(marker)
            || self.conf.named_parameter(marker).is_some()
            || param.has_default())
    }

    /// Supply the instance of `name` for this injector only
    pub fn bind_volatile_instance(&self, name: &str, instance: Instance) -> DIResult<()> {
        let node = self.node(name)?;
        node.expect_class()?;
        let mut state = self.state.lock();
        if let Some(existing) = state.singletons.get(name) {
            if !Arc::ptr_eq(existing, &instance) {
                return Err(DIError::AlreadyBound {
                    name: name.to_string(),
                });
            }
        }
        debug!("Bound volatile instance {}", name);
        state.singletons.insert(name.to_string(), instance);
        state.dirty = true;
        Ok(())
    }

    /// Set a named parameter for this injector only
    pub fn bind_volatile_parameter(&self, marker: &str, value: impl Into<Value>) -> DIResult<()> {
        let value = value.into();
        let node = self.node(marker)?;
        let param = node.expect_named_parameter()?;
        if !value.conforms_to(param.value_type()) {
            return Err(DIError::InvalidValue {
                parameter: marker.to_string(),
                value: value.to_raw(),
                expected: param.value_type().to_string(),
            });
        }
        if let Value::Class(class) = &value {
            let catalog = self.conf.catalog();
            if let ValueType::Class(interface) = param.value_type() {
                if !catalog.is_assignable(interface, class) {
                    return Err(DIError::TypeMismatch {
                        interface: interface.clone(),
                        implementation: class.clone(),
                    });
                }
            }
            self.node(class)?;
        }

        let mut state = self.state.lock();
        if self.conf.named_parameter(marker).is_some() || state.parameters.contains_key(marker) {
            return Err(DIError::AlreadyBound {
                name: marker.to_string(),
            });
        }
        debug!("Bound volatile parameter {} = {}", marker, value);
        state.parameters.insert(marker.to_string(), value);
        state.dirty = true;
        Ok(())
    }

    /// Snapshot of the configuration with this injector's singletons
    /// attached as pre-supplied instances
    pub fn configuration(&self) -> Configuration {
        let mut snapshot = self.conf.state().clone();
        let state = self.state.lock();
        for (name, instance) in &state.singletons {
            snapshot
                .singletons
                .insert(name.clone(), Some(instance.clone()));
            snapshot.record(BindingKind::Singleton, name);
        }
        for (name, value) in &state.parameters {
            snapshot.named_parameters.insert(
                name.clone(),
                NamedParameterBinding {
                    raw: None,
                    value: value.clone(),
                },
            );
            snapshot.record(BindingKind::NamedParameter, name);
        }
        snapshot.dirty = state.dirty;
        Configuration::from_state(snapshot)
    }

    pub fn singleton_count(&self) -> usize {
        self.state.lock().singletons.len()
    }

    fn node(&self, name: &str) -> DIResult<Node> {
        self.conf.namespace().register(name)
    }

    fn cached(&self, name: &str) -> Option<Instance> {
        self.state.lock().singletons.get(name).cloned()
    }

    fn plan_class(&self, name: &str, stack: &mut Vec<String>) -> DIResult<Plan> {
        let mut current = name.to_string();
        let mut chain: Vec<String> = Vec::new();
        let mut memoize = Vec::new();
        loop {
            if let Some(instance) = self.cached(&current) {
                return Ok(Plan::Cached(instance));
            }
            if chain.contains(&current) {
                chain.push(current);
                return Err(DIError::ResolutionCycle { chain });
            }
            chain.push(current.clone());
            if self.conf.is_singleton(&current) {
                memoize.push(current.clone());
            }
            match self.conf.bound_implementation(&current) {
                Some(next) if next != current => current = next.to_string(),
                _ => break,
            }
        }

        if let Some(pos) = stack.iter().position(|n| *n == current) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(current);
            return Err(DIError::ResolutionCycle { chain: cycle });
        }

        stack.push(current.clone());
        let plan = self.plan_concrete(&current, memoize, stack);
        stack.pop();
        plan
    }

    fn plan_concrete(&self, name: &str, memoize: Vec<String>, stack: &mut Vec<String>) -> DIResult<Plan> {
        let node = self.node(name)?;
        let class = node.expect_class()?.clone();

        if let Some(factory) = self.conf.bound_constructor(name) {
            debug!("Planning {} through external constructor {}", name, factory);
            let producer = self.node(factory)?.expect_class()?.clone();
            let factory = self.plan_class(factory, stack)?;
            return Ok(Plan::External {
                factory: Box::new(factory),
                producer,
                memoize,
            });
        }

        let candidates: Vec<ConstructorDef> = match self.conf.legacy_constructor(name) {
            Some(params) => {
                let ctor = class.find_constructor(params).ok_or_else(|| DIError::NoSuchConstructor {
                    type_name: name.to_string(),
                    params: params.join(", "),
                })?;
                vec![ctor.clone()]
            }
            None => class.injectable_constructors().cloned().collect(),
        };
        if candidates.is_empty() {
            return Err(DIError::NoInjectableConstructor {
                type_name: name.to_string(),
            });
        }

        let mut satisfied: Vec<(ConstructorDef, Vec<Plan>)> = Vec::new();
        let mut first_failure: Option<(String, DIError)> = None;
        'candidates: for ctor in candidates {
            let mut args = Vec::with_capacity(ctor.params().len());
            for param in ctor.params() {
                match self.plan_parameter(param, stack) {
                    Ok(plan) => args.push(plan),
                    Err(err @ DIError::ResolutionCycle { .. }) => return Err(err),
                    Err(err) => {
                        if first_failure.is_none() {
                            first_failure = Some((param.clone(), err));
                        }
                        continue 'candidates;
                    }
                }
            }
            satisfied.push((ctor, args));
        }

        match satisfied.len() {
            0 => {
                let (parameter, source) = first_failure.ok_or_else(|| DIError::NoInjectableConstructor {
                    type_name: name.to_string(),
                })?;
                Err(DIError::UnsatisfiableDependency {
                    type_name: name.to_string(),
                    parameter,
                    source: Box::new(source),
                })
            }
            1 => {
                let (constructor, args) = satisfied.remove(0);
                debug!("Planning {}({})", name, constructor.params().join(", "));
                Ok(Plan::Construct {
                    class,
                    constructor,
                    args,
                    memoize,
                })
            }
            n => Err(DIError::AmbiguousConstructor {
                type_name: name.to_string(),
                candidates: n,
            }),
        }
    }

    fn plan_parameter(&self, name: &str, stack: &mut Vec<String>) -> DIResult<Plan> {
        match self.node(name)? {
            Node::Class(_) => self.plan_class(name, stack),
            Node::NamedParameter(param) => self.plan_named_parameter(&param, stack),
        }
    }

    fn plan_named_parameter(&self, param: &NamedParameterNode, stack: &mut Vec<String>) -> DIResult<Plan> {
        let name = param.name();
        let volatile = self.state.lock().parameters.get(name).cloned();
        let value = match volatile.or_else(|| self.conf.named_parameter(name).cloned()) {
            Some(value) => Some(value),
            None => match param.default_value() {
                Some(default) => Some(value::parse(name, param.value_type(), default)?),
                None => None,
            },
        };

        match (value, param.default_class()) {
            (Some(Value::Class(class)), _) => self.plan_class(&class, stack),
            (Some(value), _) => Ok(Plan::Value(value)),
            (None, Some(class)) => self.plan_class(class, stack),
            (None, None) => Err(DIError::ParameterNotSet {
                parameter: name.to_string(),
            }),
        }
    }

    fn execute(&self, plan: &Plan) -> DIResult<Injected> {
        match plan {
            Plan::Cached(instance) => Ok(Injected::Object(instance.clone())),
            Plan::Value(value) => Ok(Injected::Value(value.clone())),
            Plan::Construct {
                class,
                constructor,
                args,
                memoize,
            } => {
                if let Some(instance) = self.memoized(memoize) {
                    return Ok(Injected::Object(instance));
                }
                let values = args
                    .iter()
                    .map(|arg| self.execute(arg))
                    .collect::<DIResult<Vec<_>>>()?;
                let instance = constructor.construct(&Args::new(class.name(), values))?;
                debug!("Constructed {}", class.name());
                Ok(Injected::Object(self.memoize(memoize, instance)))
            }
            Plan::External {
                factory,
                producer,
                memoize,
            } => {
                if let Some(instance) = self.memoized(memoize) {
                    return Ok(Injected::Object(instance));
                }
                let factory = match self.execute(factory)? {
                    Injected::Object(instance) => instance,
                    Injected::Value(_) => {
                        return Err(DIError::construction(
                            producer.name(),
                            "external constructor resolved to a value",
                        ))
                    }
                };
                let external = producer.schema().external().ok_or_else(|| {
                    DIError::construction(producer.name(), "not an external constructor")
                })?;
                let instance = external.produce(&factory)?;
                debug!("Produced {} via {}", external.produces, producer.name());
                Ok(Injected::Object(self.memoize(memoize, instance)))
            }
        }
    }

    fn memoized(&self, keys: &[String]) -> Option<Instance> {
        let state = self.state.lock();
        keys.iter().find_map(|k| state.singletons.get(k).cloned())
    }

    /// Store `instance` under every key unless another thread got there first
    fn memoize(&self, keys: &[String], instance: Instance) -> Instance {
        if keys.is_empty() {
            return instance;
        }
        let mut state = self.state.lock();
        if let Some(existing) = keys.iter().find_map(|k| state.singletons.get(k).cloned()) {
            return existing;
        }
        for key in keys {
            state.singletons.insert(key.clone(), instance.clone());
        }
        instance
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Injector")
            .field("singletons", &state.singletons.keys().collect::<Vec<_>>())
            .field("parameters", &state.parameters)
            .field("dirty", &state.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ConfigurationBuilder;
    use crate::catalog::TypeCatalog;
    use crate::schema::{ClassSchema, NamedParameterSchema};

    struct Counter(i64);

    fn catalog() -> Arc<TypeCatalog> {
        Arc::new(
            TypeCatalog::new()
                .with(NamedParameterSchema::new("t.Start", ValueType::Integer).default_value("7"))
                .with(ClassSchema::new("t.Counter").inject(&["t.Start"], |args| {
                    Ok(Counter(args.integer(0)?))
                }))
                .with(ClassSchema::new("t.Both")
                    .inject(&[], |_| Ok(Counter(0)))
                    .inject(&["t.Start"], |args| Ok(Counter(args.integer(0)?))))
                .with(ClassSchema::new("t.Ping").inject(&["t.Pong"], |_| Ok(())))
                .with(ClassSchema::new("t.Pong").inject(&["t.Ping"], |_| Ok(()))),
        )
    }

    #[test]
    fn test_default_value_is_injected() {
        let conf = ConfigurationBuilder::new(catalog()).build();
        let injector = Injector::new(&conf);
        assert_eq!(injector.get_instance::<Counter>("t.Counter").unwrap().0, 7);
        assert!(injector.is_parameter_set("t.Start").unwrap());
    }

    #[test]
    fn test_two_satisfiable_constructors_are_ambiguous() {
        let conf = ConfigurationBuilder::new(catalog()).build();
        let err = Injector::new(&conf).new_instance("t.Both").unwrap_err();
        assert!(matches!(err, DIError::AmbiguousConstructor { candidates: 2, .. }));
    }

    #[test]
    fn test_cycle_is_reported_not_overflowed() {
        let conf = ConfigurationBuilder::new(catalog()).build();
        match Injector::new(&conf).new_instance("t.Ping").unwrap_err() {
            DIError::ResolutionCycle { chain } => {
                assert_eq!(chain, vec!["t.Ping", "t.Pong", "t.Ping"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_volatile_parameter_marks_snapshot_dirty() {
        let conf = ConfigurationBuilder::new(catalog()).build();
        let injector = Injector::new(&conf);
        injector.bind_volatile_parameter("t.Start", 3i64).unwrap();
        assert_eq!(injector.get_instance::<Counter>("t.Counter").unwrap().0, 3);
        assert!(matches!(
            injector.bind_volatile_parameter("t.Start", 4i64),
            Err(DIError::AlreadyBound { .. })
        ));
        assert!(injector.configuration().is_dirty());
        assert!(!conf.is_dirty());
    }

    #[test]
    fn test_volatile_parameter_type_is_checked() {
        let conf = ConfigurationBuilder::new(catalog()).build();
        let injector = Injector::new(&conf);
        assert!(matches!(
            injector.bind_volatile_parameter("t.Start", "seven"),
            Err(DIError::InvalidValue { .. })
        ));
    }
}
