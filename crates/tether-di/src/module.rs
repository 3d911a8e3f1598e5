//! Binding modules
//!
//! A [`BindingModule`] groups related bindings so an application can
//! assemble its configuration from independent pieces:
//!
//! ```rust,ignore
//! use tether_di::{BindingModule, ConfigurationBuilder, DIResult};
//!
//! pub struct GreetingModule;
//!
//! impl BindingModule for GreetingModule {
//!     fn name(&self) -> &'static str {
//!         "greeting"
//!     }
//!
//!     fn configure(&self, builder: &mut ConfigurationBuilder) -> DIResult<()> {
//!         builder.bind("com.example.Greeter", "com.example.EnglishGreeter")?;
//!         builder.bind("com.example.UserName", "world")
//!     }
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::builder::ConfigurationBuilder;
use crate::configuration::Configuration;
use crate::{DIError, DIResult};

/// A reusable group of bindings
pub trait BindingModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower values are applied first. Default is 100.
    fn priority(&self) -> u32 {
        100
    }

    /// Modules that must be applied before this one
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    fn configure(&self, builder: &mut ConfigurationBuilder) -> DIResult<()>;

    /// Check the finished configuration, e.g. that required parameters are set
    #[allow(unused_variables)]
    fn validate(&self, conf: &Configuration) -> DIResult<()> {
        Ok(())
    }
}

/// Ordered collection of binding modules
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn BindingModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: BindingModule + 'static>(&mut self, module: M) -> &mut Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn add_shared(&mut self, module: Arc<dyn BindingModule>) -> &mut Self {
        self.modules.push(module);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Priority order, with each module's dependencies moved ahead of it
    fn ordered(&self) -> DIResult<Vec<&Arc<dyn BindingModule>>> {
        let mut sorted: Vec<&Arc<dyn BindingModule>> = self.modules.iter().collect();
        sorted.sort_by_key(|m| m.priority());

        let mut ordered = Vec::with_capacity(sorted.len());
        let mut done: HashSet<&'static str> = HashSet::new();
        for &module in &sorted {
            self.visit(module, &sorted, &mut done, &mut Vec::new(), &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit<'a>(
        &self,
        module: &'a Arc<dyn BindingModule>,
        all: &[&'a Arc<dyn BindingModule>],
        done: &mut HashSet<&'static str>,
        path: &mut Vec<&'static str>,
        ordered: &mut Vec<&'a Arc<dyn BindingModule>>,
    ) -> DIResult<()> {
        let name = module.name();
        if done.contains(name) {
            return Ok(());
        }
        if path.contains(&name) {
            let mut chain: Vec<String> = path.iter().map(|n| n.to_string()).collect();
            chain.push(name.to_string());
            return Err(DIError::ResolutionCycle { chain });
        }

        path.push(name);
        for dep in module.dependencies() {
            let dep_module = all
                .iter()
                .copied()
                .find(|m| m.name() == *dep)
                .ok_or_else(|| DIError::name_resolution(*dep))?;
            self.visit(dep_module, all, done, path, ordered)?;
        }
        path.pop();

        done.insert(name);
        ordered.push(module);
        Ok(())
    }

    /// Apply every module to `builder`; nothing is kept if one fails
    pub fn apply_all(&self, builder: &mut ConfigurationBuilder) -> DIResult<()> {
        let ordered = self.ordered()?;
        info!("Applying {} binding modules", ordered.len());
        builder.atomically(|b| {
            for module in &ordered {
                debug!(
                    "Applying module '{}' (priority: {})",
                    module.name(),
                    module.priority()
                );
                module.configure(b)?;
            }
            Ok(())
        })
    }

    /// Apply, build and validate
    pub fn build(&self, builder: &mut ConfigurationBuilder) -> DIResult<Configuration> {
        self.apply_all(builder)?;
        let conf = builder.build();
        for module in &self.modules {
            module.validate(&conf)?;
        }
        info!("All binding modules applied successfully");
        Ok(conf)
    }
}
