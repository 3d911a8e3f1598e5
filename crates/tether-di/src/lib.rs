//! Dependency injection and configuration resolution for Tether
//!
//! Types declare their shape in a [`TypeCatalog`]. A [`ConfigurationBuilder`]
//! records bindings against the catalog and validates each one as it is
//! made; [`ConfigurationBuilder::build`] seals them into an immutable
//! [`Configuration`]. An [`Injector`] then constructs object graphs from
//! that configuration.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tether_di::{
//!     ClassSchema, ConfigurationBuilder, Injector, NamedParameterSchema, TypeCatalog, ValueType,
//! };
//!
//! struct EnglishGreeter {
//!     name: String,
//! }
//!
//! let catalog = TypeCatalog::new()
//!     .with(ClassSchema::new("com.example.Greeter"))
//!     .with(
//!         ClassSchema::new("com.example.EnglishGreeter")
//!             .implements("com.example.Greeter")
//!             .inject(&["com.example.UserName"], |args| {
//!                 Ok(EnglishGreeter { name: args.string(0)? })
//!             }),
//!     )
//!     .with(NamedParameterSchema::new("com.example.UserName", ValueType::String).default_value("world"));
//!
//! let mut builder = ConfigurationBuilder::new(Arc::new(catalog));
//! builder.bind("com.example.Greeter", "com.example.EnglishGreeter").unwrap();
//!
//! let injector = Injector::new(&builder.build());
//! let greeter = injector.get_instance::<EnglishGreeter>("com.example.Greeter").unwrap();
//! assert_eq!(greeter.name, "world");
//! ```
//!
//! Configurations can also be read from text (see [`format`]), from the
//! command line (see [`command_line`]) and from property files or the
//! environment (see [`sources`]).

pub mod builder;
pub mod catalog;
pub mod command_line;
pub mod configuration;
pub mod error;
pub mod format;
pub mod injector;
pub mod module;
pub mod namespace;
pub mod schema;
pub mod sources;
pub mod value;

pub use builder::ConfigurationBuilder;
pub use catalog::{discovered_registration_count, list_discovered_types, TypeCatalog, TypeRegistration};
pub use command_line::{CommandLine, CommandLineOutcome};
pub use configuration::{Binding, Configuration};
pub use error::{DIError, DIResult, ErrorCategory};
pub use format::{
    add_configuration_file, add_configuration_text, to_configuration_string, write_configuration_file,
};
pub use injector::Injector;
pub use module::{BindingModule, ModuleRegistry};
pub use namespace::{ClassNode, NamedParameterNode, Namespace, Node};
pub use schema::{
    Args, ClassSchema, ConstructorDef, ExternalConstructor, Injectable, Injected, Instance,
    NamedParameterSchema, TypeSchema,
};
pub use sources::PropertySource;
pub use value::{Value, ValueType};

// Re-export for `inventory::submit!` in downstream crates
pub use inventory;
