//! Native launch sequence
//!
//! Locates the runtime, loads the engine host module, calls its entry export
//! and turns the result into a process exit code. The module is unloaded on
//! every path out of [`Launcher::call_application_main`].

use std::path::{Path, PathBuf};

use crate::abi::{FnCallApplicationMain, Invocation};
use crate::env::{EnvSource, MAX_PATH_LEN};
use crate::error::{ConfigError, LaunchError};
use crate::loader::ModuleLoader;
use crate::locator::{RuntimeLocator, Servicing};
use crate::trace::TraceSink;

/// Process exit code used when bootstrapping fails before the entry point runs.
pub const EXIT_BOOTSTRAP_FAILURE: i32 = 0xE0;

/// Loads the engine host module and runs its entry export
pub struct Launcher<L, E, S> {
    loader: L,
    locator: RuntimeLocator<E, S>,
    bootstrapper_dir: PathBuf,
}

impl<L: ModuleLoader, E: EnvSource, S: Servicing> Launcher<L, E, S> {
    /// `bootstrapper_dir` is searched when the runtime is not redirected.
    pub fn new(loader: L, locator: RuntimeLocator<E, S>, bootstrapper_dir: PathBuf) -> Self {
        Self {
            loader,
            locator,
            bootstrapper_dir,
        }
    }

    /// Load `module_file`, call `function_name` with `invocation`, unload.
    ///
    /// Returns the exit code slot when the entry reports success (`0`),
    /// otherwise the entry's own return value.
    pub fn call_application_main(
        &self,
        module_file: &str,
        function_name: &str,
        invocation: &mut Invocation,
        trace: &dyn TraceSink,
    ) -> Result<i32, LaunchError> {
        let location = self.locator.locate_runtime(trace)?;

        let module_dir = match location.directory() {
            Some(dir) => {
                trace.write(&format!("Redirecting runtime to: {}", dir.display()), true);
                invocation.set_runtime_directory(dir)?;
                dir
            }
            None => self.bootstrapper_dir.as_path(),
        };

        let module_path = module_dir.join(module_file);
        let module = self.loader.load_scoped(&module_path)?;
        trace.write(&format!("Loaded module: {}", module_path.display()), true);

        let entry = module.resolve_symbol(function_name)?;
        trace.write(&format!("Found export: {}", function_name), true);

        let entry: FnCallApplicationMain = unsafe { entry.cast() };
        let mut data = invocation.data();
        let result = unsafe { entry(&mut data) };

        Ok(if result == 0 { data.exit_code } else { result })
    }
}

/// Directory containing the running executable.
pub fn native_bootstrapper_directory() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default())
}

/// Full path of the application base.
///
/// Fails if the path cannot be resolved or is longer than the platform limit.
pub fn full_application_base(path: &Path) -> Result<PathBuf, ConfigError> {
    #[cfg(windows)]
    let resolved = std::path::absolute(path);
    #[cfg(not(windows))]
    let resolved = path.canonicalize();

    let resolved = resolved.map_err(|_| ConfigError::ApplicationBase {
        path: path.to_path_buf(),
    })?;

    if resolved.as_os_str().len() > MAX_PATH_LEN {
        return Err(ConfigError::ApplicationBase {
            path: path.to_path_buf(),
        });
    }

    Ok(resolved)
}

/// Whether `trace_var` is set to exactly `1`.
pub fn is_tracing_enabled(env: &dyn EnvSource, trace_var: &str) -> bool {
    env.var(trace_var).as_deref() == Some("1")
}
