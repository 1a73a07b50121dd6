use crate::config::{Config, UnitConfig, UnitKind};
use crate::error::{IocmanError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Immutable unit definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub command: String,
    pub kind: UnitKind,
}

/// Ordered, read-only set of units loaded at startup
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: Vec<Unit>,
}

impl UnitRegistry {
    /// Build the registry from unit definitions, rejecting anything that
    /// would break one-record-per-name in the process table.
    pub fn load(configs: Vec<UnitConfig>) -> Result<Self> {
        if configs.is_empty() {
            return Err(IocmanError::ConfigError("No units configured".to_string()));
        }

        let mut seen = HashSet::with_capacity(configs.len());
        let mut units = Vec::with_capacity(configs.len());

        for config in configs {
            validate_name(&config.name)?;

            if config.kind == UnitKind::Process && config.command.trim().is_empty() {
                return Err(IocmanError::ConfigError(format!(
                    "Unit {} has an empty command",
                    config.name
                )));
            }

            if !seen.insert(config.name.clone()) {
                return Err(IocmanError::DuplicateUnit(config.name));
            }

            units.push(Unit {
                name: config.name,
                command: config.command,
                kind: config.kind,
            });
        }

        Ok(Self { units })
    }

    /// Load the registry straight from a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Config::from_file(path)?;
        Self::load(config.units)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Names double as log file prefixes, so they must stay inside the log directory
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(IocmanError::ConfigError("Unit name must not be empty".to_string()));
    }

    if name.starts_with('.') || name.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(IocmanError::ConfigError(format!(
            "Unit name {:?} cannot be used as a log file prefix",
            name
        )));
    }

    Ok(())
}
