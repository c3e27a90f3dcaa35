//! Per-module host update adapters.
//!
//! The membership layer reports address changes one required module at a
//! time; each adapter forwards them to the supervisor under its module name.

use crate::supervisor::Supervisor;

#[derive(Debug, Clone)]
pub struct ModuleHostsUpgrader {
    module: String,
    supervisor: Supervisor,
}

impl ModuleHostsUpgrader {
    pub fn new(module: impl Into<String>, supervisor: Supervisor) -> Self {
        Self {
            module: module.into(),
            supervisor,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn upgrade(&self, hosts: Vec<String>) {
        tracing::debug!(module = %self.module, hosts = hosts.len(), "module hosts changed");
        self.supervisor.upgrade(self.module.clone(), hosts);
    }
}

/// One adapter per required module.
pub fn upgraders<I, S>(supervisor: &Supervisor, required_modules: I) -> Vec<ModuleHostsUpgrader>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    required_modules
        .into_iter()
        .map(|module| ModuleHostsUpgrader::new(module, supervisor.clone()))
        .collect()
}
