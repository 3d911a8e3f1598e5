//! Command-line binding surface
//!
//! Every registered named parameter that declares a short name becomes a
//! `--<short>` option. Supplied options are bound through
//! [`ConfigurationBuilder::bind_named_parameter`]; `-?`/`--help` renders
//! usage and binds nothing.

use std::collections::HashMap;
use std::ffi::OsString;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::debug;

use crate::builder::ConfigurationBuilder;
use crate::{DIError, DIResult};

const HELP: &str = "help";

type OptionCallback = Box<dyn Fn(&str) -> DIResult<()> + Send + Sync>;

/// An application option that is handed to a callback instead of bound
struct AppOption {
    name: String,
    help: String,
    callback: OptionCallback,
}

/// Result of [`CommandLine::process`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLineOutcome {
    /// Options were applied; `bound` named parameters were set
    Applied { bound: usize },
    /// Help was requested; carries the rendered usage
    Help(String),
}

pub struct CommandLine {
    program: String,
    options: Vec<AppOption>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            options: Vec::new(),
        }
    }

    /// Add a `--<name>` option whose value is passed to `callback`
    pub fn add_option<F>(mut self, name: impl Into<String>, help: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&str) -> DIResult<()> + Send + Sync + 'static,
    {
        self.options.push(AppOption {
            name: name.into(),
            help: help.into(),
            callback: Box::new(callback),
        });
        self
    }

    /// Build the clap command for the parameters currently registered in
    /// `builder`. Returns the command and `(short name, parameter)` pairs.
    ///
    /// Two options with the same name are a short-name conflict.
    fn command(&self, builder: &ConfigurationBuilder) -> DIResult<(Command, Vec<(String, String)>)> {
        let mut claimed: HashMap<String, String> = HashMap::new();
        claimed.insert(HELP.to_string(), "--help".to_string());
        let mut claim = |option: &str, owner: &str| match claimed.get(option) {
            Some(existing) => Err(DIError::ShortNameConflict {
                short_name: option.to_string(),
                existing: existing.clone(),
                conflicting: owner.to_string(),
            }),
            None => {
                claimed.insert(option.to_string(), owner.to_string());
                Ok(())
            }
        };

        let mut command = Command::new(self.program.clone())
            .disable_help_flag(true)
            .arg(
                Arg::new(HELP)
                    .short('?')
                    .long(HELP)
                    .help("Print usage")
                    .action(ArgAction::SetTrue),
            );

        let mut params = Vec::new();
        for node in builder.namespace().named_parameter_nodes() {
            let Some(short) = node.short_name() else {
                continue;
            };
            claim(short, node.name())?;
            let mut help = node.doc().to_string();
            if let Some(default) = node.default_value() {
                help = format!("{} [default={}]", help, default).trim_start().to_string();
            }
            command = command.arg(
                Arg::new(short.to_string())
                    .long(short.to_string())
                    .value_name(node.value_type().to_string())
                    .help(help)
                    .action(ArgAction::Set),
            );
            params.push((short.to_string(), node.name().to_string()));
        }

        for option in &self.options {
            claim(&option.name, &format!("{} option", self.program))?;
            command = command.arg(
                Arg::new(option.name.clone())
                    .long(option.name.clone())
                    .help(option.help.clone())
                    .action(ArgAction::Set),
            );
        }

        Ok((command, params))
    }

    /// Rendered usage for the parameters registered in `builder`
    pub fn usage(&self, builder: &ConfigurationBuilder) -> DIResult<String> {
        let (mut command, _) = self.command(builder)?;
        Ok(command.render_help().to_string())
    }

    /// Parse `args` (program name first) and bind every supplied option.
    ///
    /// Nothing is bound if any option fails to parse or bind.
    pub fn process<I, T>(&self, builder: &mut ConfigurationBuilder, args: I) -> DIResult<CommandLineOutcome>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let (mut command, params) = self.command(builder)?;
        let matches: ArgMatches = command
            .try_get_matches_from_mut(args)
            .map_err(|err| DIError::Parse {
                line: 0,
                message: err.to_string().trim_end().to_string(),
            })?;

        if matches.get_flag(HELP) {
            return Ok(CommandLineOutcome::Help(command.render_help().to_string()));
        }

        let mut bound = 0usize;
        builder.atomically(|b| {
            for (short, name) in &params {
                if let Some(value) = matches.get_one::<String>(short) {
                    debug!("Command line: --{} {} -> {}", short, value, name);
                    b.bind_named_parameter(name, value)?;
                    bound += 1;
                }
            }
            Ok(())
        })?;

        for option in &self.options {
            if let Some(value) = matches.get_one::<String>(&option.name) {
                (option.callback)(value)?;
            }
        }

        Ok(CommandLineOutcome::Applied { bound })
    }
}
