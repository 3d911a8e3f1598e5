//! Type registry: cached descriptors for classes and named parameters
//!
//! Descriptors are created on first reference from the catalog and live as
//! long as the namespace. Registration is idempotent: asking for the same
//! name twice returns the same descriptor.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::catalog::TypeCatalog;
use crate::schema::{ClassSchema, ConstructorDef, NamedParameterSchema, TypeSchema};
use crate::value::{self, ValueType};
use crate::{DIError, DIResult};

/// Last segment of a fully-qualified name, split on `.` or `$`
pub fn simple_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '.' || c == '$').next().unwrap_or(name)
}

/// Descriptor of a class-like type
#[derive(Debug)]
pub struct ClassNode {
    schema: ClassSchema,
}

impl ClassNode {
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn simple_name(&self) -> &str {
        simple_name(self.name())
    }

    pub fn schema(&self) -> &ClassSchema {
        &self.schema
    }

    /// Constructors eligible without a legacy signature
    pub fn injectable_constructors(&self) -> impl Iterator<Item = &ConstructorDef> {
        self.schema.constructors().iter().filter(|c| c.is_injectable())
    }

    /// Find the declared constructor with exactly these parameter types
    pub fn find_constructor(&self, params: &[String]) -> Option<&ConstructorDef> {
        self.schema.constructors().iter().find(|c| c.matches(params))
    }

    pub fn is_external_constructor(&self) -> bool {
        self.schema.is_external_constructor()
    }
}

/// Descriptor of a named configuration slot
#[derive(Debug)]
pub struct NamedParameterNode {
    schema: NamedParameterSchema,
}

impl NamedParameterNode {
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn simple_name(&self) -> &str {
        simple_name(self.name())
    }

    pub fn value_type(&self) -> &ValueType {
        &self.schema.value_type
    }

    pub fn short_name(&self) -> Option<&str> {
        self.schema.short_name.as_deref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.schema.default_value.as_deref()
    }

    pub fn default_class(&self) -> Option<&str> {
        self.schema.default_class.as_deref()
    }

    pub fn doc(&self) -> &str {
        &self.schema.doc
    }

    pub fn schema(&self) -> &NamedParameterSchema {
        &self.schema
    }

    pub fn has_default(&self) -> bool {
        self.schema.default_value.is_some() || self.schema.default_class.is_some()
    }
}

/// A registered descriptor
#[derive(Debug, Clone)]
pub enum Node {
    Class(Arc<ClassNode>),
    NamedParameter(Arc<NamedParameterNode>),
}

impl Node {
    fn from_schema(schema: &TypeSchema) -> Self {
        match schema {
            TypeSchema::Class(c) => Node::Class(Arc::new(ClassNode { schema: c.clone() })),
            TypeSchema::NamedParameter(p) => {
                Node::NamedParameter(Arc::new(NamedParameterNode { schema: p.clone() }))
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Class(c) => c.name(),
            Node::NamedParameter(p) => p.name(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Class(_) => "ClassNode",
            Node::NamedParameter(_) => "NamedParameterNode",
        }
    }

    pub fn as_class(&self) -> Option<&Arc<ClassNode>> {
        match self {
            Node::Class(c) => Some(c),
            Node::NamedParameter(_) => None,
        }
    }

    pub fn as_named_parameter(&self) -> Option<&Arc<NamedParameterNode>> {
        match self {
            Node::NamedParameter(p) => Some(p),
            Node::Class(_) => None,
        }
    }

    /// Descriptor identity
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Class(a), Node::Class(b)) => Arc::ptr_eq(a, b),
            (Node::NamedParameter(a), Node::NamedParameter(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn expect_class(&self) -> DIResult<&Arc<ClassNode>> {
        self.as_class().ok_or_else(|| DIError::KindMismatch {
            name: self.name().to_string(),
            expected: "ClassNode",
            found: self.kind(),
        })
    }

    pub(crate) fn expect_named_parameter(&self) -> DIResult<&Arc<NamedParameterNode>> {
        self.as_named_parameter().ok_or_else(|| DIError::KindMismatch {
            name: self.name().to_string(),
            expected: "NamedParameterNode",
            found: self.kind(),
        })
    }
}

#[derive(Debug, Clone, Default)]
struct NamespaceInner {
    nodes: IndexMap<String, Node>,
    short_names: HashMap<String, String>,
}

/// Registry of descriptors over a catalog
#[derive(Debug)]
pub struct Namespace {
    catalog: Arc<TypeCatalog>,
    inner: RwLock<NamespaceInner>,
}

impl Clone for Namespace {
    fn clone(&self) -> Self {
        Self {
            catalog: self.catalog.clone(),
            inner: RwLock::new(self.inner.read().clone()),
        }
    }
}

impl Namespace {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            inner: RwLock::new(NamespaceInner::default()),
        }
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Register `name` and every type it depends on.
    ///
    /// Nothing is inserted unless the whole closure resolves and no short
    /// name collides.
    pub fn register(&self, name: &str) -> DIResult<Node> {
        if let Some(node) = self.inner.read().nodes.get(name) {
            return Ok(node.clone());
        }

        let mut pending: IndexMap<String, Node> = IndexMap::new();
        {
            let inner = self.inner.read();
            let mut stack = vec![name.to_string()];
            while let Some(next) = stack.pop() {
                if inner.nodes.contains_key(&next) || pending.contains_key(&next) {
                    continue;
                }
                let schema = self
                    .catalog
                    .get(&next)
                    .ok_or_else(|| DIError::name_resolution(&next))?;
                if let TypeSchema::NamedParameter(p) = schema {
                    self.check_defaults(p)?;
                }
                stack.extend(schema.dependencies());
                pending.insert(next, Node::from_schema(schema));
            }
        }

        let mut inner = self.inner.write();
        // Another thread may have registered part of the closure meanwhile.
        pending.retain(|n, _| !inner.nodes.contains_key(n));

        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for node in pending.values() {
            if let Some(short) = node.as_named_parameter().and_then(|p| p.short_name()) {
                let existing = inner
                    .short_names
                    .get(short)
                    .map(String::as_str)
                    .or_else(|| claimed.get(short).copied());
                if let Some(existing) = existing {
                    return Err(DIError::ShortNameConflict {
                        short_name: short.to_string(),
                        existing: existing.to_string(),
                        conflicting: node.name().to_string(),
                    });
                }
                claimed.insert(short, node.name());
            }
        }

        for (node_name, node) in pending {
            if let Some(short) = node.as_named_parameter().and_then(|p| p.short_name()) {
                inner.short_names.insert(short.to_string(), node_name.clone());
            }
            debug!("Registered {}: {}", node.kind(), node_name);
            inner.nodes.insert(node_name, node);
        }

        inner
            .nodes
            .get(name)
            .cloned()
            .ok_or_else(|| DIError::name_resolution(name))
    }

    /// Re-register every known name over a different catalog
    pub(crate) fn rebased(&self, catalog: Arc<TypeCatalog>) -> DIResult<Namespace> {
        let rebased = Namespace::new(catalog);
        let names: Vec<String> = self.inner.read().nodes.keys().cloned().collect();
        for name in names {
            rebased.register(&name)?;
        }
        Ok(rebased)
    }

    fn check_defaults(&self, param: &NamedParameterSchema) -> DIResult<()> {
        if let Some(default) = &param.default_value {
            value::parse(&param.name, &param.value_type, default)?;
        }
        if let Some(default_class) = &param.default_class {
            let assignable = match &param.value_type {
                ValueType::Class(interface) => self.catalog.is_assignable(interface, default_class),
                _ => false,
            };
            if !assignable {
                return Err(DIError::DeclarationConflict {
                    name: param.name.clone(),
                    message: format!(
                        "default class {} is not a {}",
                        default_class, param.value_type
                    ),
                });
            }
        }
        Ok(())
    }

    /// Look up an already registered descriptor
    pub fn get_node(&self, name: &str) -> DIResult<Node> {
        self.inner
            .read()
            .nodes
            .get(name)
            .cloned()
            .ok_or_else(|| DIError::name_resolution(name))
    }

    pub fn node_from_short_name(&self, short_name: &str) -> Option<Arc<NamedParameterNode>> {
        let inner = self.inner.read();
        let name = inner.short_names.get(short_name)?;
        inner
            .nodes
            .get(name)
            .and_then(Node::as_named_parameter)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().nodes.contains_key(name)
    }

    pub fn named_parameter_nodes(&self) -> Vec<Arc<NamedParameterNode>> {
        self.inner
            .read()
            .nodes
            .values()
            .filter_map(Node::as_named_parameter)
            .cloned()
            .collect()
    }

    pub fn class_nodes(&self) -> Vec<Arc<ClassNode>> {
        self.inner
            .read()
            .nodes
            .values()
            .filter_map(Node::as_class)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
