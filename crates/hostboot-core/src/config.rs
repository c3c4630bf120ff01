//! Host configuration (hostboot.toml)
//!
//! Every value has a built-in default; a TOML file only needs to name the
//! fields it overrides.

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// Identity of the host's own managed bridging component.
pub const DEFAULT_BRIDGE_IDENTITY: &str =
    "hostboot.managed, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null, ProcessorArchitecture=MSIL";

/// Complete host configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Runtime directory lookup
    pub servicing: ServicingConfig,
    /// Assembly override bridge
    pub bridge: BridgeConfig,
    /// Engine selection and startup
    pub engine: EngineConfig,
    /// Native host module
    pub host: HostModuleConfig,
}

impl HostConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Environment sources for the servicing location, in priority order
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServicingConfig {
    /// Explicit override, consulted first
    pub override_var: String,
    /// Platform-convention fallbacks, consulted in order
    pub convention_vars: Vec<String>,
}

impl Default for ServicingConfig {
    fn default() -> Self {
        Self {
            override_var: "HOSTBOOT_SERVICING".to_string(),
            convention_vars: default_convention_vars(),
        }
    }
}

#[cfg(windows)]
fn default_convention_vars() -> Vec<String> {
    // The servicing index lives under ProgramFiles(x86); 32-bit systems only
    // have ProgramFiles.
    vec!["ProgramFiles(x86)".to_string(), "ProgramFiles".to_string()]
}

#[cfg(not(windows))]
fn default_convention_vars() -> Vec<String> {
    Vec::new()
}

/// Assembly override bridge settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Assembly identity the bridge answers for
    pub identity: String,
    /// File name of the image inside the library directory
    pub file_name: String,
    /// Environment variable naming the library directory
    pub library_dir_var: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            identity: DEFAULT_BRIDGE_IDENTITY.to_string(),
            file_name: "hostboot.managed.dll".to_string(),
            library_dir_var: "HOSTBOOT_DEFAULT_LIB".to_string(),
        }
    }
}

/// Engine selection and startup settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Minimum engine version; newer compatible versions may satisfy it
    pub min_version: String,
    /// Assembly holding the domain manager type
    pub domain_manager_assembly: String,
    /// Domain manager type name
    pub domain_manager_type: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_version: "v4.0.30319".to_string(),
            domain_manager_assembly: DEFAULT_BRIDGE_IDENTITY.to_string(),
            domain_manager_type: "DomainManager".to_string(),
        }
    }
}

/// Native host module settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HostModuleConfig {
    /// Module base name, without platform prefix or suffix
    pub module_name: String,
    /// Name of the entry export
    pub entry_export: String,
    /// Environment variable that enables verbose tracing when set to `1`
    pub trace_var: String,
}

impl Default for HostModuleConfig {
    fn default() -> Self {
        Self {
            module_name: "hostboot_engine".to_string(),
            entry_export: "CallApplicationMain".to_string(),
            trace_var: "HOSTBOOT_TRACE".to_string(),
        }
    }
}

impl HostModuleConfig {
    /// Platform file name of the host module, e.g. `libhostboot_engine.so`
    pub fn file_name(&self) -> String {
        format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            self.module_name,
            std::env::consts::DLL_SUFFIX
        )
    }
}
