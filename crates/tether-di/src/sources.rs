//! Named-parameter values from property files and the environment
//!
//! Sources are layered with the `config` crate: files first, in the order
//! added, then environment variables. Keys are matched against the short
//! names of the catalog's named parameters, ignoring case. Nested tables (ini
//! sections, toml tables) are flattened and matched on their leaf keys.

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, Source, ValueKind};
use tracing::{debug, info};

use crate::builder::ConfigurationBuilder;
use crate::catalog::TypeCatalog;
use crate::schema::TypeSchema;
use crate::{DIError, DIResult};

/// Layered property source
pub struct PropertySource {
    builder: ConfigBuilder<DefaultState>,
    ignore_unknown: bool,
}

impl PropertySource {
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            ignore_unknown: false,
        }
    }

    /// Add a file that must exist; the format follows the extension
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    pub fn optional_file(mut self, path: impl AsRef<Path>) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Read variables named `<PREFIX>_<SHORT_NAME>`
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.builder = self.builder.add_source(Environment::with_prefix(prefix));
        self
    }

    /// Set a single property, taking precedence over every other source
    pub fn set(mut self, key: &str, value: &str) -> DIResult<Self> {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Skip keys that name no registered short name instead of failing
    pub fn ignore_unknown(mut self, ignore: bool) -> Self {
        self.ignore_unknown = ignore;
        self
    }

    /// Bind every property to its named parameter. Returns the number of
    /// bindings made; nothing is bound on failure.
    pub fn apply(self, builder: &mut ConfigurationBuilder) -> DIResult<usize> {
        let config = self.builder.build()?;
        let mut properties = Vec::new();
        for (key, value) in config.collect()? {
            flatten(key, value, &mut properties)?;
        }

        let ignore_unknown = self.ignore_unknown;
        let mut bound = 0usize;
        builder.atomically(|b| {
            let short_names = short_names(b.catalog());
            for (key, value) in &properties {
                let param = short_names
                    .iter()
                    .find(|(short, _)| short.eq_ignore_ascii_case(key))
                    .map(|(_, name)| name);
                match param {
                    Some(name) => {
                        debug!("Property {} = {} -> {}", key, value, name);
                        b.bind_named_parameter(name, value)?;
                        bound += 1;
                    }
                    None if ignore_unknown => debug!("Ignoring unknown property {}", key),
                    None => return Err(DIError::name_resolution(key)),
                }
            }
            Ok(())
        })?;

        info!("Applied {} properties", bound);
        Ok(bound)
    }
}

impl Default for PropertySource {
    fn default() -> Self {
        Self::new()
    }
}

/// `(short name, parameter name)` for every named parameter in the catalog
fn short_names(catalog: &TypeCatalog) -> Vec<(String, String)> {
    catalog
        .names()
        .filter_map(|name| match catalog.get(name) {
            Some(TypeSchema::NamedParameter(p)) => {
                p.short_name.clone().map(|short| (short, p.name.clone()))
            }
            _ => None,
        })
        .collect()
}

fn flatten(key: String, value: config::Value, out: &mut Vec<(String, String)>) -> DIResult<()> {
    match value.kind {
        ValueKind::Table(table) => {
            for (key, value) in table {
                flatten(key, value, out)?;
            }
        }
        _ => out.push((key, value.into_string()?)),
    }
    Ok(())
}
