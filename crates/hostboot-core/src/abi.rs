//! C ABI between the launcher and the engine host module
//!
//! The host module exports an entry function taking a
//! [`HostInvocationData`]. A return of `0` means "use `exit_code`"; any
//! other value is itself the process exit code.

use std::ffi::{CStr, CString, NulError};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;

/// Signature of the host module's entry export
pub type FnCallApplicationMain = unsafe extern "C" fn(data: *mut HostInvocationData) -> c_int;

/// Data passed to the host module's entry export
#[repr(C)]
#[derive(Debug)]
pub struct HostInvocationData {
    /// Application base directory (UTF-8, NUL-terminated)
    pub application_base: *const c_char,
    /// Redirected runtime directory, or null to use the default
    pub runtime_directory: *const c_char,
    /// Number of entries in `argv`
    pub argc: c_int,
    /// Arguments for the application, followed by a null entry
    pub argv: *const *const c_char,
    /// Exit code written by the host module
    pub exit_code: c_int,
}

impl HostInvocationData {
    /// Arguments as owned strings.
    ///
    /// # Safety
    ///
    /// `argv` must point to `argc` valid NUL-terminated strings.
    pub unsafe fn arguments(&self) -> Vec<String> {
        (0..self.argc.max(0) as usize)
            .map(|i| CStr::from_ptr(*self.argv.add(i)).to_string_lossy().into_owned())
            .collect()
    }

    /// Redirected runtime directory, if any.
    ///
    /// # Safety
    ///
    /// `runtime_directory` must be null or a valid NUL-terminated string.
    pub unsafe fn runtime_directory(&self) -> Option<String> {
        if self.runtime_directory.is_null() {
            None
        } else {
            Some(
                CStr::from_ptr(self.runtime_directory)
                    .to_string_lossy()
                    .into_owned(),
            )
        }
    }
}

/// Owned storage behind a [`HostInvocationData`]
#[derive(Debug)]
pub struct Invocation {
    application_base: CString,
    runtime_directory: Option<CString>,
    args: Vec<CString>,
    argv: Vec<*const c_char>,
}

pub(crate) fn path_to_cstring(path: &Path) -> Result<CString, NulError> {
    CString::new(path.to_string_lossy().into_owned())
}

impl Invocation {
    /// Prepare an invocation for `args` under `application_base`
    pub fn new(application_base: &Path, args: &[String]) -> Result<Self, NulError> {
        let args = args
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut argv: Vec<*const c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
        argv.push(ptr::null());

        Ok(Self {
            application_base: path_to_cstring(application_base)?,
            runtime_directory: None,
            args,
            argv,
        })
    }

    /// Point the host module at a redirected runtime
    pub fn set_runtime_directory(&mut self, dir: &Path) -> Result<(), NulError> {
        self.runtime_directory = Some(path_to_cstring(dir)?);
        Ok(())
    }

    /// Redirected runtime directory, if set
    pub fn runtime_directory(&self) -> Option<&CStr> {
        self.runtime_directory.as_deref()
    }

    /// Number of arguments
    pub fn argc(&self) -> usize {
        self.args.len()
    }

    /// Raw view for the entry call. Pointers stay valid while `self` is
    /// alive and unmodified.
    pub fn data(&self) -> HostInvocationData {
        HostInvocationData {
            application_base: self.application_base.as_ptr(),
            runtime_directory: self
                .runtime_directory
                .as_ref()
                .map_or(ptr::null(), |dir| dir.as_ptr()),
            argc: self.args.len() as c_int,
            argv: self.argv.as_ptr(),
            exit_code: 0,
        }
    }
}
