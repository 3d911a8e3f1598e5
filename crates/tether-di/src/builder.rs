//! Mutable accumulator of bindings
//!
//! Every bind operation validates before it records anything, so a failed
//! call leaves the builder exactly as it was. Operations that touch several
//! bindings at once ([`ConfigurationBuilder::add_configuration`], text
//! parsing) run against a scratch copy and commit only on success.

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::TypeCatalog;
use crate::configuration::{Binding, BindingKind, Configuration, ConfigurationState, NamedParameterBinding};
use crate::namespace::{simple_name, Namespace, Node};
use crate::schema::{Instance, NamedParameterSchema, TypeSchema};
use crate::value::{self, Value, ValueType};
use crate::{DIError, DIResult};

/// Builder for [`Configuration`] snapshots
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    state: ConfigurationState,
}

impl ConfigurationBuilder {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            state: ConfigurationState::new(catalog),
        }
    }

    /// Start from a copy of an existing configuration
    pub fn from_configuration(conf: &Configuration) -> DIResult<Self> {
        let mut builder = Self::new(conf.catalog().clone());
        builder.add_configuration(conf)?;
        Ok(builder)
    }

    /// Start from several configurations, merged in order
    pub fn from_configurations(catalog: Arc<TypeCatalog>, confs: &[Configuration]) -> DIResult<Self> {
        let mut builder = Self::new(catalog);
        for conf in confs {
            builder.add_configuration(conf)?;
        }
        Ok(builder)
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        self.state.namespace.catalog()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.state.namespace
    }

    fn schema(&self, name: &str) -> DIResult<&TypeSchema> {
        self.catalog()
            .get(name)
            .ok_or_else(|| DIError::name_resolution(name))
    }

    fn named_schema(&self, name: &str) -> DIResult<&NamedParameterSchema> {
        match self.schema(name)? {
            TypeSchema::NamedParameter(p) => Ok(p),
            TypeSchema::Class(_) => Err(DIError::KindMismatch {
                name: name.to_string(),
                expected: "NamedParameterNode",
                found: "ClassNode",
            }),
        }
    }

    fn require_class(&self, name: &str) -> DIResult<()> {
        match self.schema(name)? {
            TypeSchema::Class(_) => Ok(()),
            TypeSchema::NamedParameter(_) => Err(DIError::KindMismatch {
                name: name.to_string(),
                expected: "ClassNode",
                found: "NamedParameterNode",
            }),
        }
    }

    /// Run `f` against a scratch copy; keep the result only if it succeeds
    pub(crate) fn atomically<F>(&mut self, f: F) -> DIResult<()>
    where
        F: FnOnce(&mut ConfigurationBuilder) -> DIResult<()>,
    {
        let mut scratch = self.clone();
        f(&mut scratch)?;
        *self = scratch;
        Ok(())
    }

    /// Make a type known without binding anything; idempotent
    pub fn register(&mut self, name: &str) -> DIResult<Node> {
        let node = self.state.namespace.register(name)?;
        self.state.registered.insert(name.to_string());
        self.state.record(BindingKind::Registered, name);
        Ok(node)
    }

    /// Record an explicit constructor signature for a type whose
    /// constructor is not marked injectable
    pub fn register_legacy_constructor(&mut self, name: &str, params: &[&str]) -> DIResult<()> {
        self.require_class(name)?;
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        for param in &params {
            if !self.catalog().contains(param) {
                return Err(DIError::name_resolution(param));
            }
        }

        let node = self.state.namespace.register(name)?;
        let class = node.expect_class()?;
        if class.find_constructor(&params).is_none() {
            return Err(DIError::NoSuchConstructor {
                type_name: name.to_string(),
                params: params.join(", "),
            });
        }
        for param in &params {
            self.state.namespace.register(param)?;
        }

        debug!("Registered legacy constructor {}({})", name, params.join(", "));
        self.state.legacy_constructors.insert(name.to_string(), params);
        self.state.record(BindingKind::LegacyConstructor, name);
        Ok(())
    }

    /// Bind `key` to `value`.
    ///
    /// A named-parameter key takes `value` as its raw string. A class key
    /// takes `value` as the name of an implementation, or of an external
    /// constructor when `value` is one and `key` is not.
    pub fn bind(&mut self, key: &str, value: &str) -> DIResult<()> {
        match self.schema(key)? {
            TypeSchema::NamedParameter(_) => self.bind_named_parameter(key, value),
            TypeSchema::Class(_) => {
                let catalog = self.catalog();
                if catalog.is_external_constructor(value) && !catalog.is_external_constructor(key) {
                    self.bind_constructor(key, value)
                } else {
                    self.bind_implementation(key, value)
                }
            }
        }
    }

    pub fn bind_implementation(&mut self, interface: &str, implementation: &str) -> DIResult<()> {
        self.require_class(interface)?;
        self.require_class(implementation)?;
        if !self.catalog().is_assignable(interface, implementation) {
            return Err(DIError::TypeMismatch {
                interface: interface.to_string(),
                implementation: implementation.to_string(),
            });
        }

        self.check_singleton_rebind(interface, Some(implementation), None)?;

        self.state.namespace.register(interface)?;
        self.state.namespace.register(implementation)?;
        debug!("Bound implementation {} -> {}", interface, implementation);
        self.state
            .implementations
            .insert(interface.to_string(), implementation.to_string());
        self.state.record(BindingKind::Implementation, interface);
        Ok(())
    }

    /// A singleton keeps the one implementation or constructor it was
    /// first bound to
    fn check_singleton_rebind(
        &self,
        name: &str,
        implementation: Option<&str>,
        factory: Option<&str>,
    ) -> DIResult<()> {
        if !self.state.singletons.contains_key(name) {
            return Ok(());
        }
        let current_impl = self.state.implementations.get(name).map(String::as_str);
        let current_factory = self.state.constructors.get(name).map(String::as_str);
        let existing = match (current_impl, current_factory) {
            (Some(existing), _) if current_impl != implementation => existing,
            (_, Some(existing)) if current_factory != factory => existing,
            _ => return Ok(()),
        };
        Err(DIError::SingletonConflict {
            type_name: name.to_string(),
            message: format!(
                "already bound to {}, cannot rebind to {}",
                existing,
                implementation.or(factory).unwrap_or_default()
            ),
        })
    }

    /// Produce instances of `target` through the external constructor `factory`
    pub fn bind_constructor(&mut self, target: &str, factory: &str) -> DIResult<()> {
        self.require_class(target)?;
        let produces = match self.schema(factory)? {
            TypeSchema::Class(c) => c.produces().map(str::to_string),
            TypeSchema::NamedParameter(_) => None,
        };
        let assignable = produces
            .as_deref()
            .is_some_and(|p| self.catalog().is_assignable(target, p));
        if !assignable {
            return Err(DIError::TypeMismatch {
                interface: target.to_string(),
                implementation: factory.to_string(),
            });
        }

        self.check_singleton_rebind(target, None, Some(factory))?;

        self.state.namespace.register(target)?;
        self.state.namespace.register(factory)?;
        debug!("Bound constructor {} -> {}", target, factory);
        self.state
            .constructors
            .insert(target.to_string(), factory.to_string());
        self.state.record(BindingKind::Constructor, target);
        Ok(())
    }

    fn check_class_value(&self, schema: &NamedParameterSchema, value: &Value) -> DIResult<()> {
        if let (ValueType::Class(interface), Value::Class(class)) = (&schema.value_type, value) {
            self.require_class(class)?;
            if !self.catalog().is_assignable(interface, class) {
                return Err(DIError::TypeMismatch {
                    interface: interface.clone(),
                    implementation: class.clone(),
                });
            }
        }
        Ok(())
    }

    /// Bind a named parameter from its string form; the string is kept
    /// verbatim and parsed immediately
    pub fn bind_named_parameter(&mut self, marker: &str, raw: &str) -> DIResult<()> {
        let schema = self.named_schema(marker)?;
        let value = value::parse(marker, &schema.value_type, raw)?;
        self.check_class_value(schema, &value)?;

        self.state.namespace.register(marker)?;
        if let Value::Class(class) = &value {
            self.state.namespace.register(class)?;
        }
        debug!("Bound named parameter {} = {}", marker, raw);
        self.state.named_parameters.insert(
            marker.to_string(),
            NamedParameterBinding {
                raw: Some(raw.to_string()),
                value,
            },
        );
        self.state.record(BindingKind::NamedParameter, marker);
        Ok(())
    }

    /// Bind a named parameter to an already parsed value. Such bindings
    /// have no text form.
    pub fn bind_named_parameter_value(&mut self, marker: &str, value: impl Into<Value>) -> DIResult<()> {
        let value = value.into();
        let schema = self.named_schema(marker)?;
        if !value.conforms_to(&schema.value_type) {
            return Err(DIError::InvalidValue {
                parameter: marker.to_string(),
                value: value.to_raw(),
                expected: schema.value_type.to_string(),
            });
        }
        self.check_class_value(schema, &value)?;

        self.state.namespace.register(marker)?;
        if let Value::Class(class) = &value {
            self.state.namespace.register(class)?;
        }
        debug!("Bound named parameter value {} = {}", marker, value);
        self.state
            .named_parameters
            .insert(marker.to_string(), NamedParameterBinding { raw: None, value });
        self.state.record(BindingKind::NamedParameter, marker);
        Ok(())
    }

    pub fn bind_singleton(&mut self, name: &str) -> DIResult<()> {
        self.require_class(name)?;
        self.state.namespace.register(name)?;
        debug!("Bound singleton {}", name);
        self.state.singletons.entry(name.to_string()).or_insert(None);
        self.state.record(BindingKind::Singleton, name);
        Ok(())
    }

    pub fn bind_singleton_implementation(&mut self, interface: &str, implementation: &str) -> DIResult<()> {
        self.atomically(|b| {
            b.bind_singleton(interface)?;
            b.bind_implementation(interface, implementation)
        })
    }

    /// Pre-supply the one instance of a singleton type
    pub fn bind_singleton_instance(&mut self, name: &str, instance: Instance) -> DIResult<()> {
        self.require_class(name)?;
        if let Some(Some(existing)) = self.state.singletons.get(name) {
            if !Arc::ptr_eq(existing, &instance) {
                return Err(DIError::SingletonConflict {
                    type_name: name.to_string(),
                    message: "a different instance is already bound".to_string(),
                });
            }
        }
        self.state.namespace.register(name)?;
        debug!("Bound singleton instance {}", name);
        self.state.singletons.insert(name.to_string(), Some(instance));
        self.state.record(BindingKind::Singleton, name);
        Ok(())
    }

    /// Make the simple name of `name` (the part after the last `.` or `$`)
    /// usable as a key
    pub fn add_import(&mut self, name: &str) -> DIResult<()> {
        if !self.catalog().contains(name) {
            return Err(DIError::name_resolution(name));
        }
        let alias = simple_name(name);
        let conflict = |existing: &str| DIError::ShortNameConflict {
            short_name: alias.to_string(),
            existing: existing.to_string(),
            conflicting: name.to_string(),
        };
        if let Some(existing) = self.state.imports.get(alias) {
            if existing != name {
                return Err(conflict(existing));
            }
        }
        if let Some(param) = self.state.namespace.node_from_short_name(alias) {
            if param.name() != name {
                return Err(conflict(param.name()));
            }
        }
        if alias != name && self.catalog().contains(alias) {
            return Err(conflict(alias));
        }

        self.state.namespace.register(name)?;
        debug!("Imported {} as {}", name, alias);
        self.state
            .imports
            .insert(alias.to_string(), name.to_string());
        self.state.record(BindingKind::Import, alias);
        Ok(())
    }

    /// Expand an imported short name; other keys are returned unchanged
    pub fn resolve_alias<'a>(&'a self, key: &'a str) -> &'a str {
        self.state
            .imports
            .get(key)
            .map(String::as_str)
            .unwrap_or(key)
    }

    /// Copy every binding of `conf` into this builder, re-validating each one
    pub fn add_configuration(&mut self, conf: &Configuration) -> DIResult<()> {
        self.atomically(|b| b.merge_state(conf.state()))
    }

    /// Copy every binding of another builder into this one
    pub fn add_builder(&mut self, other: &ConfigurationBuilder) -> DIResult<()> {
        self.atomically(|b| b.merge_state(&other.state))
    }

    fn merge_state(&mut self, old: &ConfigurationState) -> DIResult<()> {
        if old.dirty {
            return Err(DIError::DirtyConfiguration);
        }

        let theirs = old.namespace.catalog();
        if !Arc::ptr_eq(self.catalog(), theirs) {
            let merged = Arc::new(self.catalog().merged(theirs)?);
            self.state.namespace = self.state.namespace.rebased(merged)?;
        }

        let bindings = old.bindings();
        let count = bindings.len();
        for binding in bindings {
            match binding {
                Binding::Import { name, .. } => self.add_import(&name)?,
                Binding::Registered { name } => {
                    self.register(&name)?;
                }
                Binding::Implementation {
                    interface,
                    implementation,
                } => self.bind(&interface, &implementation)?,
                Binding::Constructor { target, factory } => self.bind(&target, &factory)?,
                Binding::Singleton {
                    name,
                    instance: Some(instance),
                } => self.bind_singleton_instance(&name, instance)?,
                Binding::Singleton { name, instance: None } => self.bind_singleton(&name)?,
                Binding::NamedParameter {
                    name,
                    raw: Some(raw),
                    ..
                } => self.bind(&name, &raw)?,
                Binding::NamedParameter {
                    name,
                    raw: None,
                    value,
                } => self.bind_named_parameter_value(&name, value)?,
                Binding::LegacyConstructor { name, params } => {
                    let params: Vec<&str> = params.iter().map(String::as_str).collect();
                    self.register_legacy_constructor(&name, &params)?
                }
            }
        }

        info!("Merged {} bindings into configuration builder", count);
        Ok(())
    }

    /// Snapshot the current bindings; the builder stays usable
    pub fn build(&self) -> Configuration {
        info!(
            "Built configuration: {} implementations, {} constructors, {} singletons, {} named parameters",
            self.state.implementations.len(),
            self.state.constructors.len(),
            self.state.singletons.len(),
            self.state.named_parameters.len()
        );
        Configuration::from_state(self.state.clone())
    }
}
