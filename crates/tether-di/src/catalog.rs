//! Catalog of declared type schemas
//!
//! The catalog plays the role of a class path: a fully-qualified name can
//! only be registered or bound if the catalog holds a schema for it.
//!
//! Schemas can be declared directly, or submitted from any linked crate
//! with the `inventory` crate and collected by [`TypeCatalog::discovered`]:
//!
//! ```rust,ignore
//! use tether_di::{ClassSchema, TypeRegistration};
//!
//! inventory::submit! {
//!     TypeRegistration::new("com.example.Clock", || {
//!         ClassSchema::new("com.example.Clock")
//!             .inject(&[], |_| Ok(Clock::default()))
//!             .into()
//!     })
//! }
//! ```

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::schema::{Injectable, TypeSchema};
use crate::{DIError, DIResult};

/// A schema registration that can be collected via inventory.
pub struct TypeRegistration {
    /// Fully-qualified name the schema declares
    pub name: &'static str,

    /// Builds the schema when the catalog is assembled
    pub schema_fn: fn() -> TypeSchema,

    /// Ordering among discovered registrations (lower = earlier, default = 100)
    pub priority: u32,
}

impl TypeRegistration {
    pub const fn new(name: &'static str, schema_fn: fn() -> TypeSchema) -> Self {
        Self {
            name,
            schema_fn,
            priority: 100,
        }
    }

    pub const fn with_priority(name: &'static str, schema_fn: fn() -> TypeSchema, priority: u32) -> Self {
        Self {
            name,
            schema_fn,
            priority,
        }
    }
}

inventory::collect!(TypeRegistration);

/// Get the count of discovered type registrations.
pub fn discovered_registration_count() -> usize {
    inventory::iter::<TypeRegistration>().count()
}

/// List all discovered type names.
pub fn list_discovered_types() -> Vec<&'static str> {
    inventory::iter::<TypeRegistration>().map(|r| r.name).collect()
}

/// Immutable set of type schemas keyed by fully-qualified name
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    schemas: IndexMap<String, TypeSchema>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every schema submitted through `inventory::submit!`
    pub fn discovered() -> DIResult<Self> {
        let mut registrations: Vec<&TypeRegistration> = inventory::iter::<TypeRegistration>().collect();
        registrations.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(b.name)));

        let mut catalog = Self::new();
        for registration in registrations {
            let schema = (registration.schema_fn)();
            if schema.name() != registration.name {
                return Err(DIError::DeclarationConflict {
                    name: registration.name.to_string(),
                    message: format!("registration builds schema for {}", schema.name()),
                });
            }
            catalog.declare(schema)?;
        }

        info!("Discovered {} type schemas via inventory", catalog.len());
        Ok(catalog)
    }

    /// Add a schema, replacing any earlier declaration of the same name
    pub fn with(mut self, schema: impl Into<TypeSchema>) -> Self {
        let schema = schema.into();
        self.schemas.insert(schema.name().to_string(), schema);
        self
    }

    /// Add a schema, rejecting a second declaration of the same name
    pub fn declare(&mut self, schema: impl Into<TypeSchema>) -> DIResult<()> {
        let schema = schema.into();
        let name = schema.name().to_string();
        if self.schemas.contains_key(&name) {
            return Err(DIError::DeclarationConflict {
                name,
                message: "declared twice".to_string(),
            });
        }
        debug!("Declared type schema: {}", name);
        self.schemas.insert(name, schema);
        Ok(())
    }

    pub fn declare_type<T: Injectable>(&mut self) -> DIResult<()> {
        self.declare(T::schema())
    }

    pub fn get(&self, name: &str) -> Option<&TypeSchema> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Whether `implementation` is `interface` or transitively declares it
    /// as a supertype
    pub fn is_assignable(&self, interface: &str, implementation: &str) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([implementation]);
        while let Some(name) = queue.pop_front() {
            if name == interface {
                return true;
            }
            if !seen.insert(name) {
                continue;
            }
            if let Some(TypeSchema::Class(class)) = self.schemas.get(name) {
                queue.extend(class.supertypes().iter().map(String::as_str));
            }
        }
        false
    }

    pub fn is_external_constructor(&self, name: &str) -> bool {
        matches!(self.schemas.get(name), Some(TypeSchema::Class(c)) if c.is_external_constructor())
    }

    /// Union of two catalogs. Schemas already present in `self` win, but a
    /// named parameter declared differently on both sides is a conflict.
    pub fn merged(&self, other: &TypeCatalog) -> DIResult<TypeCatalog> {
        let mut merged = self.clone();
        for (name, schema) in &other.schemas {
            match (merged.schemas.get(name), schema) {
                (None, _) => {
                    merged.schemas.insert(name.clone(), schema.clone());
                }
                (Some(TypeSchema::NamedParameter(ours)), TypeSchema::NamedParameter(theirs)) => {
                    if ours.conflicts_with(theirs) {
                        return Err(DIError::DeclarationConflict {
                            name: name.clone(),
                            message: format!(
                                "named parameter declared as {:?} and {:?}",
                                ours, theirs
                            ),
                        });
                    }
                }
                (Some(TypeSchema::Class(_)), TypeSchema::Class(_)) => {}
                (Some(_), _) => {
                    return Err(DIError::DeclarationConflict {
                        name: name.clone(),
                        message: "declared both as a class and as a named parameter".to_string(),
                    });
                }
            }
        }
        Ok(merged)
    }
}
