//! Runtime directory resolution
//!
//! The servicing location comes from the first set variable in a fixed
//! priority list: the explicit override, then the platform-convention
//! fallbacks. The servicing collaborator may redirect the runtime to a
//! patched installation under that location.

use std::path::{Path, PathBuf};

use crate::config::ServicingConfig;
use crate::env::{EnvSource, MAX_PATH_LEN};
use crate::error::ConfigError;
use crate::trace::TraceSink;

/// Subdirectory of a redirected runtime that holds the host module.
pub const RUNTIME_BIN_DIR: &str = "bin";

/// External servicing policy.
///
/// Given the servicing location, returns the directory of a serviced runtime,
/// or `None` to keep the co-located one.
pub trait Servicing {
    /// `is_default_location` is true when `location` came from a
    /// platform-convention source rather than the explicit override.
    fn get_runtime_path(
        &self,
        location: &Path,
        is_default_location: bool,
        trace: &dyn TraceSink,
    ) -> Option<PathBuf>;
}

/// Servicing policy that never redirects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoServicing;

impl Servicing for NoServicing {
    fn get_runtime_path(&self, _: &Path, _: bool, _: &dyn TraceSink) -> Option<PathBuf> {
        None
    }
}

/// Where the host module should be loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeLocation {
    /// Next to the bootstrapper executable
    Default,
    /// A serviced runtime's `bin` directory
    Redirected(PathBuf),
}

impl RuntimeLocation {
    /// The redirected directory, if any
    pub fn directory(&self) -> Option<&Path> {
        match self {
            RuntimeLocation::Default => None,
            RuntimeLocation::Redirected(dir) => Some(dir),
        }
    }
}

/// The configuration source that won the priority lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSource {
    /// Variable name
    pub variable: String,
    /// Variable value
    pub value: String,
    /// Whether the value came from a convention source
    pub is_default_location: bool,
}

/// Resolves the runtime directory from environment sources and servicing policy
pub struct RuntimeLocator<E, S> {
    sources: ServicingConfig,
    env: E,
    servicing: S,
}

impl<E: EnvSource, S: Servicing> RuntimeLocator<E, S> {
    /// Create a locator over the given sources
    pub fn new(sources: ServicingConfig, env: E, servicing: S) -> Self {
        Self {
            sources,
            env,
            servicing,
        }
    }

    /// Pick the first set source: override, then conventions in order.
    ///
    /// Fails if the winning value is longer than the platform path limit.
    /// A later source is never consulted once an earlier one is set, even if
    /// the earlier value is invalid.
    pub fn select_source(&self) -> Result<Option<SelectedSource>, ConfigError> {
        let candidates = std::iter::once((&self.sources.override_var, false)).chain(
            self.sources
                .convention_vars
                .iter()
                .map(|variable| (variable, true)),
        );

        for (variable, is_default_location) in candidates {
            let Some(value) = self.env.var(variable) else {
                continue;
            };

            if value.len() >= MAX_PATH_LEN {
                return Err(ConfigError::InvalidConfigValue {
                    variable: variable.clone(),
                });
            }

            return Ok(Some(SelectedSource {
                variable: variable.clone(),
                value,
                is_default_location,
            }));
        }

        Ok(None)
    }

    /// Resolve where the host module lives.
    pub fn locate_runtime(&self, trace: &dyn TraceSink) -> Result<RuntimeLocation, ConfigError> {
        let Some(source) = self.select_source()? else {
            trace.write("No servicing location configured", true);
            return Ok(RuntimeLocation::Default);
        };

        trace.write(
            &format!("Servicing location from '{}': {}", source.variable, source.value),
            true,
        );

        let runtime_path = self.servicing.get_runtime_path(
            Path::new(&source.value),
            source.is_default_location,
            trace,
        );

        Ok(match runtime_path {
            Some(path) if !path.as_os_str().is_empty() => {
                RuntimeLocation::Redirected(path.join(RUNTIME_BIN_DIR))
            }
            _ => RuntimeLocation::Default,
        })
    }
}
