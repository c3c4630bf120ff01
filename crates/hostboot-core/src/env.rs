//! Environment-derived configuration sources
//!
//! The locator and the assembly bridge read directories from named
//! environment variables. They go through [`EnvSource`] so the lookup can be
//! replaced with a fixed map in tests or by an embedder.

use std::collections::HashMap;

/// Longest path the host will pass to the OS loader or filesystem.
#[cfg(windows)]
pub const MAX_PATH_LEN: usize = 260;

/// Longest path the host will pass to the OS loader or filesystem.
#[cfg(unix)]
pub const MAX_PATH_LEN: usize = libc::PATH_MAX as usize;

/// Longest path the host will pass to the OS loader or filesystem.
#[cfg(not(any(unix, windows)))]
pub const MAX_PATH_LEN: usize = 4096;

/// A read-only source of named configuration values.
pub trait EnvSource: Send + Sync {
    /// Value of `name`, or `None` when it is unset or empty.
    ///
    /// Values that are not valid Unicode count as unset: they name paths
    /// the host cannot reproduce faithfully.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the current process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        let value = std::env::var_os(name)?;
        match value.into_string() {
            Ok(value) if value.is_empty() => None,
            Ok(value) => Some(value),
            Err(raw) => {
                tracing::warn!(
                    variable = name,
                    value = %raw.to_string_lossy(),
                    "ignoring environment variable that is not valid Unicode"
                );
                None
            }
        }
    }
}

/// A fixed set of variables, independent of the process environment.
#[derive(Debug, Default, Clone)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a variable
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Remove a variable
    pub fn remove(&mut self, name: &str) {
        self.vars.remove(name);
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).filter(|value| !value.is_empty()).cloned()
    }
}

impl<E: EnvSource + ?Sized> EnvSource for std::sync::Arc<E> {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_env_treats_empty_as_unset() {
        let env = MapEnv::new().with("A", "").with("B", "value");
        assert_eq!(env.var("A"), None);
        assert_eq!(env.var("B").as_deref(), Some("value"));
        assert_eq!(env.var("C"), None);
    }

    #[test]
    fn test_process_env_missing_variable() {
        assert_eq!(ProcessEnv.var("HOSTBOOT_TEST_SURELY_UNSET_VARIABLE"), None);
    }

    #[test]
    fn test_process_env_reads_value() {
        std::env::set_var("HOSTBOOT_TEST_ENV_PLAIN", "/opt/hostboot/lib");
        assert_eq!(
            ProcessEnv.var("HOSTBOOT_TEST_ENV_PLAIN").as_deref(),
            Some("/opt/hostboot/lib")
        );

        std::env::set_var("HOSTBOOT_TEST_ENV_EMPTY", "");
        assert_eq!(ProcessEnv.var("HOSTBOOT_TEST_ENV_EMPTY"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_env_non_unicode_is_unset() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"/opt/lib\xff\xfe");
        std::env::set_var("HOSTBOOT_TEST_ENV_NON_UNICODE", raw);
        assert_eq!(ProcessEnv.var("HOSTBOOT_TEST_ENV_NON_UNICODE"), None);
    }
}
