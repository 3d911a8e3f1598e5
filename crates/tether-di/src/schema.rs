//! Declared type schemas
//!
//! Types do not describe themselves at runtime, so every injectable type
//! declares its shape up front: the supertypes it can be bound to, the
//! constructors the injector may call, and for named parameters the value
//! type, short name and defaults.
//!
//! ```rust
//! use tether_di::{ClassSchema, NamedParameterSchema, ValueType};
//!
//! struct EnglishGreeter {
//!     name: String,
//! }
//!
//! let greeter = ClassSchema::new("com.example.EnglishGreeter")
//!     .implements("com.example.Greeter")
//!     .inject(&["com.example.UserName"], |args| {
//!         Ok(EnglishGreeter { name: args.string(0)? })
//!     });
//! let user = NamedParameterSchema::new("com.example.UserName", ValueType::String)
//!     .short_name("user")
//!     .default_value("world");
//!
//! assert_eq!(greeter.constructors().len(), 1);
//! assert_eq!(user.short_name.as_deref(), Some("user"));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::value::{Value, ValueType};
use crate::{DIError, DIResult};

/// A type-erased constructed object
pub type Instance = Arc<dyn Any + Send + Sync>;

type ConstructFn = Arc<dyn Fn(&Args) -> DIResult<Instance> + Send + Sync>;
type ProduceFn = Arc<dyn Fn(&Instance) -> DIResult<Instance> + Send + Sync>;

/// A resolved constructor argument or named-parameter value
#[derive(Clone)]
pub enum Injected {
    Value(Value),
    Object(Instance),
}

impl Injected {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Injected::Value(v) => Some(v),
            Injected::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Injected::Object(o) => Some(o),
            Injected::Value(_) => None,
        }
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.as_object().and_then(|o| o.clone().downcast::<T>().ok())
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Injected::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Injected::Object(_) => f.write_str("Object(..)"),
        }
    }
}

/// Resolved arguments handed to a constructor, in declaration order
pub struct Args {
    owner: String,
    values: Vec<Injected>,
}

impl Args {
    pub(crate) fn new(owner: impl Into<String>, values: Vec<Injected>) -> Self {
        Self {
            owner: owner.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn injected(&self, index: usize) -> DIResult<&Injected> {
        self.values.get(index).ok_or_else(|| {
            DIError::construction(&self.owner, format!("no argument at index {}", index))
        })
    }

    /// Downcast the object argument at `index`
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> DIResult<Arc<T>> {
        self.injected(index)?.downcast::<T>().ok_or_else(|| {
            DIError::construction(
                &self.owner,
                format!(
                    "argument {} is not a {}",
                    index,
                    std::any::type_name::<T>()
                ),
            )
        })
    }

    pub fn value(&self, index: usize) -> DIResult<&Value> {
        self.injected(index)?.as_value().ok_or_else(|| {
            DIError::construction(&self.owner, format!("argument {} is not a value", index))
        })
    }

    pub fn string(&self, index: usize) -> DIResult<String> {
        let value = self.value(index)?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            DIError::construction(&self.owner, format!("argument {} is not a string", index))
        })
    }

    pub fn integer(&self, index: usize) -> DIResult<i64> {
        self.value(index)?.as_integer().ok_or_else(|| {
            DIError::construction(&self.owner, format!("argument {} is not an integer", index))
        })
    }

    pub fn float(&self, index: usize) -> DIResult<f64> {
        self.value(index)?.as_float().ok_or_else(|| {
            DIError::construction(&self.owner, format!("argument {} is not a float", index))
        })
    }

    pub fn boolean(&self, index: usize) -> DIResult<bool> {
        self.value(index)?.as_boolean().ok_or_else(|| {
            DIError::construction(&self.owner, format!("argument {} is not a boolean", index))
        })
    }
}

/// One constructor of a class: its parameter types and how to call it
#[derive(Clone)]
pub struct ConstructorDef {
    params: Vec<String>,
    injectable: bool,
    construct: ConstructFn,
}

impl ConstructorDef {
    fn new<T, F>(params: &[&str], injectable: bool, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> DIResult<T> + Send + Sync + 'static,
    {
        Self {
            params: params.iter().map(|p| p.to_string()).collect(),
            injectable,
            construct: Arc::new(move |args| Ok(Arc::new(f(args)?) as Instance)),
        }
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Whether the injector may pick this constructor without a legacy signature
    pub fn is_injectable(&self) -> bool {
        self.injectable
    }

    pub fn matches(&self, params: &[String]) -> bool {
        self.params == params
    }

    pub(crate) fn construct(&self, args: &Args) -> DIResult<Instance> {
        (self.construct)(args)
    }
}

impl fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDef")
            .field("params", &self.params)
            .field("injectable", &self.injectable)
            .finish()
    }
}

/// A factory type that produces instances of another type.
///
/// The factory itself is built through its own injectable constructor,
/// then asked for the product.
pub trait ExternalConstructor: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn new_instance(&self) -> DIResult<Self::Output>;
}

#[derive(Clone)]
pub(crate) struct ExternalConstructorDef {
    pub(crate) produces: String,
    produce: ProduceFn,
}

impl ExternalConstructorDef {
    pub(crate) fn produce(&self, factory: &Instance) -> DIResult<Instance> {
        (self.produce)(factory)
    }
}

/// Declared shape of a class-like type
#[derive(Clone)]
pub struct ClassSchema {
    name: String,
    supertypes: Vec<String>,
    constructors: Vec<ConstructorDef>,
    external: Option<ExternalConstructorDef>,
}

impl ClassSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            constructors: Vec::new(),
            external: None,
        }
    }

    /// Declare an interface or base class this type can be bound to
    pub fn implements(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Add a constructor the injector may choose on its own
    pub fn inject<T, F>(mut self, params: &[&str], f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> DIResult<T> + Send + Sync + 'static,
    {
        self.constructors.push(ConstructorDef::new(params, true, f));
        self
    }

    /// Add a constructor usable only through a registered legacy signature
    pub fn constructor<T, F>(mut self, params: &[&str], f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> DIResult<T> + Send + Sync + 'static,
    {
        self.constructors.push(ConstructorDef::new(params, false, f));
        self
    }

    /// Mark this type as an external constructor producing `produces`.
    ///
    /// Instances of this schema must be of type `F`.
    pub fn external_constructor<F: ExternalConstructor>(mut self, produces: impl Into<String>) -> Self {
        let owner = self.name.clone();
        let produce: ProduceFn = Arc::new(move |factory: &Instance| {
            let factory = factory.clone().downcast::<F>().map_err(|_| {
                DIError::construction(&owner, "factory instance has an unexpected type")
            })?;
            Ok(Arc::new(factory.new_instance()?) as Instance)
        });
        self.external = Some(ExternalConstructorDef {
            produces: produces.into(),
            produce,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    pub fn constructors(&self) -> &[ConstructorDef] {
        &self.constructors
    }

    pub fn is_external_constructor(&self) -> bool {
        self.external.is_some()
    }

    /// Name of the type produced when this is an external constructor
    pub fn produces(&self) -> Option<&str> {
        self.external.as_ref().map(|e| e.produces.as_str())
    }

    pub(crate) fn external(&self) -> Option<&ExternalConstructorDef> {
        self.external.as_ref()
    }
}

impl fmt::Debug for ClassSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSchema")
            .field("name", &self.name)
            .field("supertypes", &self.supertypes)
            .field("constructors", &self.constructors)
            .field("produces", &self.produces())
            .finish()
    }
}

/// Declared shape of a named configuration slot
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParameterSchema {
    pub name: String,
    pub value_type: ValueType,
    pub short_name: Option<String>,
    pub default_value: Option<String>,
    pub default_class: Option<String>,
    pub doc: String,
}

impl NamedParameterSchema {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            short_name: None,
            default_value: None,
            default_class: None,
            doc: String::new(),
        }
    }

    pub fn short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Default implementation for a class-typed parameter
    pub fn default_class(mut self, class: impl Into<String>) -> Self {
        self.default_class = Some(class.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Whether two declarations of the same parameter disagree
    pub(crate) fn conflicts_with(&self, other: &NamedParameterSchema) -> bool {
        self.value_type != other.value_type
            || self.short_name != other.short_name
            || self.default_value != other.default_value
            || self.default_class != other.default_class
    }
}

/// Schema of any type the catalog knows about
#[derive(Debug, Clone)]
pub enum TypeSchema {
    Class(ClassSchema),
    NamedParameter(NamedParameterSchema),
}

impl TypeSchema {
    pub fn name(&self) -> &str {
        match self {
            TypeSchema::Class(c) => c.name(),
            TypeSchema::NamedParameter(p) => &p.name,
        }
    }

    /// Types that must be registered together with this one
    pub(crate) fn dependencies(&self) -> Vec<String> {
        match self {
            TypeSchema::Class(c) => {
                let mut deps: Vec<String> = c
                    .constructors
                    .iter()
                    .filter(|ctor| ctor.injectable)
                    .flat_map(|ctor| ctor.params.iter().cloned())
                    .collect();
                if let Some(produces) = c.produces() {
                    deps.push(produces.to_string());
                }
                deps
            }
            TypeSchema::NamedParameter(p) => {
                let mut deps = Vec::new();
                if let ValueType::Class(interface) = &p.value_type {
                    deps.push(interface.clone());
                }
                deps.extend(p.default_class.iter().cloned());
                deps
            }
        }
    }
}

impl From<ClassSchema> for TypeSchema {
    fn from(schema: ClassSchema) -> Self {
        TypeSchema::Class(schema)
    }
}

impl From<NamedParameterSchema> for TypeSchema {
    fn from(schema: NamedParameterSchema) -> Self {
        TypeSchema::NamedParameter(schema)
    }
}

/// Implemented by Rust types that declare their own schema
pub trait Injectable {
    fn schema() -> TypeSchema;
}
