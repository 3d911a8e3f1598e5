//! Error types for binding, parsing and injection

use thiserror::Error;

/// Errors that can occur while building a configuration or injecting from it
#[derive(Debug, Error)]
pub enum DIError {
    #[error("Could not resolve type name: {name}")]
    NameResolution { name: String },

    #[error("{implementation} does not extend or implement {interface}")]
    TypeMismatch {
        interface: String,
        implementation: String,
    },

    #[error("Detected type mismatch for {name}: expected {expected}, but namespace contains {found}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Conflict on short name {short_name}: maps to {existing} and {conflicting}")]
    ShortNameConflict {
        short_name: String,
        existing: String,
        conflicting: String,
    },

    #[error("Singleton conflict for {type_name}: {message}")]
    SingletonConflict { type_name: String, message: String },

    #[error("Conflicting declarations for {name}: {message}")]
    DeclarationConflict { name: String, message: String },

    #[error("Attempt to re-bind {name}")]
    AlreadyBound { name: String },

    #[error("No constructor of {type_name} matches legacy signature ({params})")]
    NoSuchConstructor { type_name: String, params: String },

    #[error("Cannot copy a dirty configuration")]
    DirtyConfiguration,

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Could not parse '{value}' for {parameter} as {expected}")]
    InvalidValue {
        parameter: String,
        value: String,
        expected: String,
    },

    #[error("Cannot inject {type_name}: unsatisfiable parameter {parameter}")]
    UnsatisfiableDependency {
        type_name: String,
        parameter: String,
        #[source]
        source: Box<DIError>,
    },

    #[error("Cannot inject {type_name}: no injectable constructor")]
    NoInjectableConstructor { type_name: String },

    #[error("Cannot inject {type_name}: {candidates} constructors are satisfiable")]
    AmbiguousConstructor { type_name: String, candidates: usize },

    #[error("Resolution cycle: {}", chain.join(" -> "))]
    ResolutionCycle { chain: Vec<String> },

    #[error("Named parameter {parameter} is not set and has no default")]
    ParameterNotSet { parameter: String },

    #[error("Failed to construct {type_name}: {message}")]
    Construction { type_name: String, message: String },

    #[error("Invalid service type: {message}")]
    InvalidServiceType { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Property source error: {0}")]
    Source(String),
}

/// Coarse classification of a [`DIError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A referenced type or short name cannot be located
    NameResolution,
    /// Type mismatch or conflicting bindings
    Bind,
    /// Malformed text or an unparseable parameter value
    Parse,
    /// Failure while resolving or constructing an object graph
    Resolution,
    /// Failure reading or writing a configuration source
    Io,
}

impl DIError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DIError::NameResolution { .. } => ErrorCategory::NameResolution,
            DIError::TypeMismatch { .. }
            | DIError::KindMismatch { .. }
            | DIError::ShortNameConflict { .. }
            | DIError::SingletonConflict { .. }
            | DIError::DeclarationConflict { .. }
            | DIError::AlreadyBound { .. }
            | DIError::NoSuchConstructor { .. }
            | DIError::DirtyConfiguration => ErrorCategory::Bind,
            DIError::Parse { .. } | DIError::InvalidValue { .. } => ErrorCategory::Parse,
            DIError::UnsatisfiableDependency { .. }
            | DIError::NoInjectableConstructor { .. }
            | DIError::AmbiguousConstructor { .. }
            | DIError::ResolutionCycle { .. }
            | DIError::ParameterNotSet { .. }
            | DIError::Construction { .. }
            | DIError::InvalidServiceType { .. } => ErrorCategory::Resolution,
            DIError::Io(_) | DIError::Source(_) => ErrorCategory::Io,
        }
    }

    pub(crate) fn name_resolution(name: impl Into<String>) -> Self {
        DIError::NameResolution { name: name.into() }
    }

    pub(crate) fn construction(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        DIError::Construction {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for DIError {
    fn from(err: config::ConfigError) -> Self {
        DIError::Source(err.to_string())
    }
}

pub type DIResult<T> = Result<T, DIError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_chain() {
        let err = DIError::ResolutionCycle {
            chain: vec!["a.A".into(), "b.B".into(), "a.A".into()],
        };
        assert_eq!(err.to_string(), "Resolution cycle: a.A -> b.B -> a.A");
        assert_eq!(err.category(), ErrorCategory::Resolution);
    }

    #[test]
    fn test_unsatisfiable_keeps_source() {
        use std::error::Error;

        let err = DIError::UnsatisfiableDependency {
            type_name: "a.A".into(),
            parameter: "a.Port".into(),
            source: Box::new(DIError::ParameterNotSet {
                parameter: "a.Port".into(),
            }),
        };
        let source = err.source().map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Named parameter a.Port is not set and has no default")
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(DIError::DirtyConfiguration.category(), ErrorCategory::Bind);
        assert_eq!(
            DIError::name_resolution("x").category(),
            ErrorCategory::NameResolution
        );
        assert_eq!(
            DIError::Parse {
                line: 1,
                message: "bad".into()
            }
            .category(),
            ErrorCategory::Parse
        );
    }
}
