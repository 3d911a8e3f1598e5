//! Sealed binding sets
//!
//! A [`Configuration`] is produced by
//! [`ConfigurationBuilder::build`](crate::ConfigurationBuilder::build) and
//! never changes afterwards. It is cheap to clone and can be shared across
//! threads; every [`Injector`](crate::Injector) created from it only reads it.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::catalog::TypeCatalog;
use crate::namespace::Namespace;
use crate::schema::Instance;
use crate::value::Value;

/// A named-parameter binding: the verbatim string (if it came from text)
/// and its parsed value
#[derive(Debug, Clone)]
pub(crate) struct NamedParameterBinding {
    pub(crate) raw: Option<String>,
    pub(crate) value: Value,
}

/// Which group a recorded binding lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BindingKind {
    Import,
    Registered,
    Implementation,
    Constructor,
    Singleton,
    NamedParameter,
    LegacyConstructor,
}

#[derive(Debug, Clone)]
pub(crate) struct ConfigurationState {
    pub(crate) namespace: Namespace,
    /// First-insertion order across every group; re-binding keeps the
    /// original position
    order: IndexSet<(BindingKind, String)>,
    pub(crate) imports: IndexMap<String, String>,
    pub(crate) registered: IndexSet<String>,
    pub(crate) implementations: IndexMap<String, String>,
    pub(crate) constructors: IndexMap<String, String>,
    pub(crate) singletons: IndexMap<String, Option<Instance>>,
    pub(crate) named_parameters: IndexMap<String, NamedParameterBinding>,
    pub(crate) legacy_constructors: IndexMap<String, Vec<String>>,
    pub(crate) dirty: bool,
}

impl ConfigurationState {
    pub(crate) fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            namespace: Namespace::new(catalog),
            order: IndexSet::new(),
            imports: IndexMap::new(),
            registered: IndexSet::new(),
            implementations: IndexMap::new(),
            constructors: IndexMap::new(),
            singletons: IndexMap::new(),
            named_parameters: IndexMap::new(),
            legacy_constructors: IndexMap::new(),
            dirty: false,
        }
    }

    /// Note that `key` now has a binding of `kind`
    pub(crate) fn record(&mut self, kind: BindingKind, key: &str) {
        self.order.insert((kind, key.to_string()));
    }

    /// All bindings in the order they were first made
    pub(crate) fn bindings(&self) -> Vec<Binding> {
        self.order
            .iter()
            .filter_map(|(kind, key)| self.binding(*kind, key))
            .collect()
    }

    fn binding(&self, kind: BindingKind, key: &str) -> Option<Binding> {
        let binding = match kind {
            BindingKind::Import => Binding::Import {
                alias: key.to_string(),
                name: self.imports.get(key)?.clone(),
            },
            BindingKind::Registered => {
                self.registered.get(key)?;
                Binding::Registered {
                    name: key.to_string(),
                }
            }
            BindingKind::Implementation => Binding::Implementation {
                interface: key.to_string(),
                implementation: self.implementations.get(key)?.clone(),
            },
            BindingKind::Constructor => Binding::Constructor {
                target: key.to_string(),
                factory: self.constructors.get(key)?.clone(),
            },
            BindingKind::Singleton => Binding::Singleton {
                name: key.to_string(),
                instance: self.singletons.get(key)?.clone(),
            },
            BindingKind::NamedParameter => {
                let binding = self.named_parameters.get(key)?;
                Binding::NamedParameter {
                    name: key.to_string(),
                    raw: binding.raw.clone(),
                    value: binding.value.clone(),
                }
            }
            BindingKind::LegacyConstructor => Binding::LegacyConstructor {
                name: key.to_string(),
                params: self.legacy_constructors.get(key)?.clone(),
            },
        };
        Some(binding)
    }
}

/// One recorded association
#[derive(Debug, Clone)]
pub enum Binding {
    /// Short-name alias established by an `IMPORT` line
    Import { alias: String, name: String },
    /// Type made known without binding anything
    Registered { name: String },
    Implementation {
        interface: String,
        implementation: String,
    },
    /// Instances of `target` come from the external constructor `factory`
    Constructor { target: String, factory: String },
    /// At most one instance per injector, optionally pre-supplied
    Singleton {
        name: String,
        instance: Option<Instance>,
    },
    /// `raw` is absent for values supplied programmatically
    NamedParameter {
        name: String,
        raw: Option<String>,
        value: Value,
    },
    LegacyConstructor { name: String, params: Vec<String> },
}

/// An immutable, conflict-checked set of bindings
#[derive(Debug, Clone)]
pub struct Configuration {
    state: Arc<ConfigurationState>,
}

impl Configuration {
    pub(crate) fn from_state(state: ConfigurationState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub(crate) fn state(&self) -> &ConfigurationState {
        &self.state
    }

    pub fn namespace(&self) -> &Namespace {
        &self.state.namespace
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        self.state.namespace.catalog()
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.state.bindings()
    }

    pub fn bound_implementation(&self, name: &str) -> Option<&str> {
        self.state.implementations.get(name).map(String::as_str)
    }

    pub fn bound_constructor(&self, name: &str) -> Option<&str> {
        self.state.constructors.get(name).map(String::as_str)
    }

    pub fn is_singleton(&self, name: &str) -> bool {
        self.state.singletons.contains_key(name)
    }

    pub fn singleton_instance(&self, name: &str) -> Option<Instance> {
        self.state.singletons.get(name).cloned().flatten()
    }

    pub fn named_parameter(&self, name: &str) -> Option<&Value> {
        self.state.named_parameters.get(name).map(|b| &b.value)
    }

    /// The verbatim string a named parameter was bound from, if any
    pub fn named_parameter_raw(&self, name: &str) -> Option<&str> {
        self.state
            .named_parameters
            .get(name)
            .and_then(|b| b.raw.as_deref())
    }

    pub fn legacy_constructor(&self, name: &str) -> Option<&[String]> {
        self.state.legacy_constructors.get(name).map(Vec::as_slice)
    }

    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.state.registered.iter().map(String::as_str)
    }

    pub fn imports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.state
            .imports
            .iter()
            .map(|(alias, name)| (alias.as_str(), name.as_str()))
    }

    /// Whether this snapshot carries volatile bindings and must not be merged
    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_follow_first_insertion_order() {
        let mut state = ConfigurationState::new(Arc::new(TypeCatalog::new()));
        state.named_parameters.insert(
            "a.Port".into(),
            NamedParameterBinding {
                raw: Some("80".into()),
                value: Value::Integer(80),
            },
        );
        state.record(BindingKind::NamedParameter, "a.Port");
        state.singletons.insert("a.S".into(), None);
        state.record(BindingKind::Singleton, "a.S");
        state
            .implementations
            .insert("a.I".into(), "a.Impl".into());
        state.record(BindingKind::Implementation, "a.I");
        state.registered.insert("a.R".into());
        state.record(BindingKind::Registered, "a.R");
        state.imports.insert("Port".into(), "a.Port".into());
        state.record(BindingKind::Import, "Port");
        state.named_parameters.insert(
            "a.Port".into(),
            NamedParameterBinding {
                raw: Some("81".into()),
                value: Value::Integer(81),
            },
        );
        state.record(BindingKind::NamedParameter, "a.Port");

        let kinds: Vec<&str> = state
            .bindings()
            .iter()
            .map(|b| match b {
                Binding::Import { .. } => "import",
                Binding::Registered { .. } => "registered",
                Binding::Implementation { .. } => "implementation",
                Binding::Constructor { .. } => "constructor",
                Binding::Singleton { .. } => "singleton",
                Binding::NamedParameter { .. } => "named",
                Binding::LegacyConstructor { .. } => "legacy",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["named", "singleton", "implementation", "registered", "import"]
        );
        assert!(matches!(
            &state.bindings()[0],
            Binding::NamedParameter { raw: Some(raw), .. } if raw == "81"
        ));
    }

    #[test]
    fn test_empty_configuration() {
        let conf = Configuration::from_state(ConfigurationState::new(Arc::new(TypeCatalog::new())));
        assert!(!conf.is_dirty());
        assert!(conf.bindings().is_empty());
    }
}
