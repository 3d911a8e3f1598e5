//! Line-oriented text form of a configuration
//!
//! Each line is `key=value`, written in the order the bindings were first
//! made. Reserved values are `SINGLETON`, `REGISTERED` and `INIT(a-b-c)`;
//! the reserved key `IMPORT` makes the simple name of its value usable as a
//! key on later lines of the same text. Blank lines and lines starting with
//! `#` or `!` are ignored.
//!
//! ```text
//! # greeting setup
//! IMPORT=com.example.UserName
//! com.example.Greeter=com.example.EnglishGreeter
//! com.example.Clock=SINGLETON
//! UserName=world
//! ```

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::builder::ConfigurationBuilder;
use crate::configuration::{Binding, Configuration};
use crate::namespace::simple_name;
use crate::{DIError, DIResult};

pub const SINGLETON: &str = "SINGLETON";
pub const REGISTERED: &str = "REGISTERED";
pub const IMPORT: &str = "IMPORT";
pub const INIT: &str = "INIT";

/// One line per binding, in the order the bindings were made
pub fn to_configuration_lines(conf: &Configuration) -> Vec<String> {
    let state = conf.state();
    let has_binding = |name: &str| {
        state.implementations.contains_key(name)
            || state.constructors.contains_key(name)
            || state.singletons.contains_key(name)
            || state.named_parameters.contains_key(name)
            || state.legacy_constructors.contains_key(name)
    };

    let mut lines = Vec::new();
    for binding in conf.bindings() {
        match binding {
            Binding::Import { name, .. } => lines.push(format!("{}={}", IMPORT, name)),
            Binding::Registered { name } => {
                if !has_binding(&name) {
                    lines.push(format!("{}={}", name, REGISTERED));
                }
            }
            Binding::Implementation {
                interface,
                implementation,
            } => lines.push(format!("{}={}", interface, implementation)),
            Binding::Constructor { target, factory } => lines.push(format!("{}={}", target, factory)),
            Binding::Singleton { name, .. } => {
                // The implementation line carries the binding on its own.
                if !state.implementations.contains_key(&name) && !state.constructors.contains_key(&name) {
                    lines.push(format!("{}={}", name, SINGLETON));
                }
            }
            Binding::NamedParameter {
                name, raw: Some(raw), ..
            } => lines.push(format!("{}={}", name, raw)),
            Binding::NamedParameter {
                name, raw: None, value,
            } => {
                warn!("Skipping value-only named parameter {} = {}", name, value);
            }
            Binding::LegacyConstructor { name, params } => {
                lines.push(format!("{}={}({})", name, INIT, params.join("-")))
            }
        }
    }
    lines
}

/// Render a configuration as text; every line is newline-terminated
pub fn to_configuration_string(conf: &Configuration) -> String {
    let mut out = String::new();
    for line in to_configuration_lines(conf) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Apply every line of `text` to `builder`.
///
/// Either all lines are applied or, on the first failure, none are.
pub fn add_configuration_text(builder: &mut ConfigurationBuilder, text: &str) -> DIResult<()> {
    let mut applied = 0usize;
    builder.atomically(|b| {
        let mut short_names: HashMap<String, String> = HashMap::new();
        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| DIError::Parse {
                line: line_no,
                message: format!("expected key=value, found '{}'", line),
            })?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return Err(DIError::Parse {
                    line: line_no,
                    message: "empty key".to_string(),
                });
            }

            let key = short_names.get(key).map(String::as_str).unwrap_or(key).to_string();
            apply_line(b, &mut short_names, line_no, &key, value)?;
            applied += 1;
        }
        Ok(())
    })?;
    info!("Applied {} configuration lines", applied);
    Ok(())
}

fn apply_line(
    builder: &mut ConfigurationBuilder,
    short_names: &mut HashMap<String, String>,
    line_no: usize,
    key: &str,
    value: &str,
) -> DIResult<()> {
    if key == IMPORT {
        if value == SINGLETON {
            return Err(DIError::Parse {
                line: line_no,
                message: format!("{}={} makes no sense", IMPORT, SINGLETON),
            });
        }
        let alias = simple_name(value).to_string();
        if let Some(existing) = short_names.get(&alias) {
            return Err(DIError::ShortNameConflict {
                short_name: alias,
                existing: existing.clone(),
                conflicting: value.to_string(),
            });
        }
        builder.add_import(value)?;
        short_names.insert(alias, value.to_string());
        return Ok(());
    }

    match value {
        REGISTERED => {
            builder.register(key)?;
        }
        SINGLETON => builder.bind_singleton(key)?,
        _ => match init_arguments(value) {
            Some(params) => {
                let params: Vec<&str> = params.iter().map(String::as_str).collect();
                builder.register_legacy_constructor(key, &params)?;
            }
            None => builder.bind(key, value)?,
        },
    }
    debug!("Applied line {}: {}={}", line_no, key, value);
    Ok(())
}

/// Parameter names of an `INIT(...)` value, or `None` if `value` is not one
fn init_arguments(value: &str) -> Option<Vec<String>> {
    let rest = value.strip_prefix(INIT)?;
    if !rest.trim_start().starts_with('(') {
        return None;
    }
    let inner = rest
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .trim_end_matches(|c: char| c.is_whitespace() || c == ')');
    Some(
        inner
            .split(|c: char| c.is_whitespace() || c == '-')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Read a file and apply it with [`add_configuration_text`]
pub fn add_configuration_file(builder: &mut ConfigurationBuilder, path: impl AsRef<Path>) -> DIResult<()> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    add_configuration_text(builder, &text)?;
    info!("Loaded configuration from {}", path.display());
    Ok(())
}

pub fn write_configuration_file(conf: &Configuration, path: impl AsRef<Path>) -> DIResult<()> {
    let path = path.as_ref();
    std::fs::write(path, to_configuration_string(conf))?;
    info!("Wrote configuration to {}", path.display());
    Ok(())
}
