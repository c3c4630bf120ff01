//! Dynamic library loading for the engine host module
//!
//! Every backend follows the same two-step contract: `load`, then
//! `resolve_symbol`, with `unload` called exactly once per successful load.
//! [`ScopedModule`] ties the unload to scope exit so error paths cannot leak
//! the handle.

use std::ffi::{c_void, CString};
use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// A module mapped into the process by a [`ModuleLoader`].
///
/// Not `Clone`: handing it back to [`ModuleLoader::unload`] consumes it.
#[derive(Debug)]
pub struct LoadedModule {
    handle: *mut c_void,
    path: PathBuf,
}

impl LoadedModule {
    /// Wrap a raw handle produced by a loader backend
    pub fn new(handle: *mut c_void, path: PathBuf) -> Self {
        Self { handle, path }
    }

    /// Raw OS handle
    pub fn handle(&self) -> *mut c_void {
        self.handle
    }

    /// Path the module was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

unsafe impl Send for LoadedModule {}

/// Address of an export resolved from a [`LoadedModule`].
#[derive(Debug, Clone, Copy)]
pub struct Symbol {
    address: *mut c_void,
}

impl Symbol {
    /// Wrap a resolved export address
    pub fn new(address: *mut c_void) -> Self {
        Self { address }
    }

    /// Raw export address
    pub fn address(&self) -> *mut c_void {
        self.address
    }

    /// Reinterpret the export as a function pointer.
    ///
    /// # Safety
    ///
    /// `T` must be a pointer-sized function pointer type matching the export's
    /// real signature, and the owning module must stay loaded while the
    /// result is in use.
    pub unsafe fn cast<T: Copy>(&self) -> T {
        debug_assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<*mut c_void>());
        std::mem::transmute_copy(&self.address)
    }
}

/// Platform abstraction over load / resolve / unload
pub trait ModuleLoader {
    /// Map the library at `path` into the process.
    fn load(&self, path: &Path) -> Result<LoadedModule, LoadError>;

    /// Resolve the export `name` in `module`.
    fn resolve_symbol(&self, module: &LoadedModule, name: &str) -> Result<Symbol, LoadError>;

    /// Release a module obtained from [`ModuleLoader::load`].
    fn unload(&self, module: LoadedModule);

    /// Load `path` and release it automatically when the guard drops.
    fn load_scoped(&self, path: &Path) -> Result<ScopedModule<'_, Self>, LoadError>
    where
        Self: Sized,
    {
        let module = self.load(path)?;
        Ok(ScopedModule {
            loader: self,
            module: ManuallyDrop::new(module),
        })
    }
}

impl<L: ModuleLoader + ?Sized> ModuleLoader for &L {
    fn load(&self, path: &Path) -> Result<LoadedModule, LoadError> {
        (**self).load(path)
    }

    fn resolve_symbol(&self, module: &LoadedModule, name: &str) -> Result<Symbol, LoadError> {
        (**self).resolve_symbol(module, name)
    }

    fn unload(&self, module: LoadedModule) {
        (**self).unload(module)
    }
}

/// A loaded module that is unloaded when dropped.
pub struct ScopedModule<'a, L: ModuleLoader> {
    loader: &'a L,
    module: ManuallyDrop<LoadedModule>,
}

impl<'a, L: ModuleLoader> ScopedModule<'a, L> {
    /// The guarded module
    pub fn module(&self) -> &LoadedModule {
        &self.module
    }

    /// Resolve an export in the guarded module
    pub fn resolve_symbol(&self, name: &str) -> Result<Symbol, LoadError> {
        self.loader.resolve_symbol(self.module(), name)
    }
}

impl<L: ModuleLoader> Drop for ScopedModule<'_, L> {
    fn drop(&mut self) {
        // SAFETY: the module is taken exactly once, here.
        let module = unsafe { ManuallyDrop::take(&mut self.module) };
        tracing::trace!(path = %module.path().display(), "unloading module");
        self.loader.unload(module);
    }
}

/// Loader for the platform this binary was built for
#[cfg(unix)]
pub type PlatformLoader = DlopenLoader;

/// Loader for the platform this binary was built for
#[cfg(windows)]
pub type PlatformLoader = Win32Loader;

fn symbol_name(name: &str) -> Result<CString, LoadError> {
    CString::new(name).map_err(|e| LoadError::InvalidPath(format!("symbol '{}': {}", name, e)))
}

// ============================================================================
// Unix Implementation (Linux, macOS, BSD)
// ============================================================================

/// `dlopen`-based loader. Export names are resolved verbatim.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DlopenLoader;

#[cfg(unix)]
impl DlopenLoader {
    fn last_error() -> Option<String> {
        unsafe {
            let err_ptr = libc::dlerror();
            if err_ptr.is_null() {
                None
            } else {
                Some(std::ffi::CStr::from_ptr(err_ptr).to_string_lossy().into_owned())
            }
        }
    }
}

#[cfg(unix)]
impl ModuleLoader for DlopenLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule, LoadError> {
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| LoadError::InvalidPath(format!("{}: {}", path.display(), e)))?;

        // RTLD_NOW: fail here rather than at first call on unresolved dependencies
        // RTLD_GLOBAL: the engine's own dependencies must see the host's symbols
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };

        if handle.is_null() {
            return Err(LoadError::ModuleNotFound {
                path: path.to_path_buf(),
                message: Self::last_error().unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        Ok(LoadedModule::new(handle, path.to_path_buf()))
    }

    fn resolve_symbol(&self, module: &LoadedModule, name: &str) -> Result<Symbol, LoadError> {
        let c_name = symbol_name(name)?;

        let address = unsafe {
            // Clear any previous errors
            libc::dlerror();
            libc::dlsym(module.handle(), c_name.as_ptr())
        };

        if let Some(error) = Self::last_error() {
            tracing::debug!(symbol = name, %error, "dlsym failed");
            return Err(LoadError::EntryPointMissing {
                symbol: name.to_string(),
                module: module.path().to_path_buf(),
            });
        }

        if address.is_null() {
            return Err(LoadError::EntryPointMissing {
                symbol: name.to_string(),
                module: module.path().to_path_buf(),
            });
        }

        Ok(Symbol::new(address))
    }

    fn unload(&self, module: LoadedModule) {
        unsafe {
            libc::dlclose(module.handle());
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

/// `LoadLibraryExW`-based loader using the default DLL search directories.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Loader;

#[cfg(windows)]
const LOAD_LIBRARY_SEARCH_DEFAULT_DIRS: u32 = 0x0000_1000;

#[cfg(windows)]
impl ModuleLoader for Win32Loader {
    fn load(&self, path: &Path) -> Result<LoadedModule, LoadError> {
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe {
            LoadLibraryExW(
                wide.as_ptr(),
                std::ptr::null_mut(),
                LOAD_LIBRARY_SEARCH_DEFAULT_DIRS,
            )
        };

        if handle.is_null() {
            let code = unsafe { GetLastError() };
            return Err(LoadError::ModuleNotFound {
                path: path.to_path_buf(),
                message: std::io::Error::from_raw_os_error(code as i32).to_string(),
            });
        }

        Ok(LoadedModule::new(handle, path.to_path_buf()))
    }

    fn resolve_symbol(&self, module: &LoadedModule, name: &str) -> Result<Symbol, LoadError> {
        let c_name = symbol_name(name)?;

        let address = unsafe { GetProcAddress(module.handle(), c_name.as_ptr()) };

        if address.is_null() {
            return Err(LoadError::EntryPointMissing {
                symbol: name.to_string(),
                module: module.path().to_path_buf(),
            });
        }

        Ok(Symbol::new(address))
    }

    fn unload(&self, module: LoadedModule) {
        unsafe {
            FreeLibrary(module.handle());
        }
    }
}

// Windows FFI declarations
#[cfg(windows)]
extern "system" {
    fn LoadLibraryExW(filename: *const u16, file: *mut c_void, flags: u32) -> *mut c_void;
    fn GetProcAddress(module: *mut c_void, procname: *const std::os::raw::c_char) -> *mut c_void;
    fn FreeLibrary(module: *mut c_void) -> i32;
    fn GetLastError() -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_not_found() {
        let result = PlatformLoader::default().load(Path::new("/nonexistent/library.so"));
        match result {
            Err(LoadError::ModuleNotFound { path, message }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/library.so"));
                assert!(!message.is_empty());
            }
            _ => panic!("Expected ModuleNotFound error"),
        }
    }

    #[test]
    fn test_scoped_load_failure_returns_error() {
        let loader = PlatformLoader::default();
        assert!(loader.load_scoped(Path::new("/nonexistent/library.so")).is_err());
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_resolve_libc_export() {
        let loader = DlopenLoader;
        let scoped = loader.load_scoped(Path::new("libc.so.6")).unwrap();

        let strlen = scoped.resolve_symbol("strlen").unwrap();
        let strlen: unsafe extern "C" fn(*const std::os::raw::c_char) -> usize =
            unsafe { strlen.cast() };
        let text = CString::new("hostboot").unwrap();
        assert_eq!(unsafe { strlen(text.as_ptr()) }, 8);

        match scoped.resolve_symbol("hostboot_no_such_export") {
            Err(LoadError::EntryPointMissing { symbol, .. }) => {
                assert_eq!(symbol, "hostboot_no_such_export");
            }
            other => panic!("Expected EntryPointMissing, got {:?}", other.map(|s| s.address())),
        }
    }

    #[test]
    fn test_symbol_name_with_nul_rejected() {
        assert!(matches!(symbol_name("a\0b"), Err(LoadError::InvalidPath(_))));
    }
}
