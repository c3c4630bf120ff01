//! Entry-point binding
//!
//! Packages host-environment facts for the managed entry point and performs
//! the synchronous call across the native/managed boundary.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;

use crate::error::BindError;

/// Managed entry point: `(argc, argv) -> exit code`
pub type ApplicationMain = unsafe extern "C" fn(argc: c_int, argv: *const *const c_char) -> c_int;

/// Host-environment facts delivered to the entry point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFacts {
    /// Operating system family, e.g. `Windows`, `Linux`, `Darwin`
    pub operating_system: String,
    /// Operating system version string
    pub os_version: String,
    /// Process architecture tag, e.g. `x64`
    pub architecture: String,
    /// Directory the engine host was loaded from
    pub runtime_directory: PathBuf,
    /// Application base directory
    pub application_base: PathBuf,
}

/// An entry point together with the facts bound for it
#[derive(Debug, Clone)]
pub struct EntryPointBinding {
    /// Function invoked by `invoke_entry_point`
    pub main: ApplicationMain,
    /// Host facts, filled in by binding
    pub facts: HostFacts,
    /// Whether the managed side should install its own exception handling
    pub handle_exceptions: bool,
}

impl EntryPointBinding {
    /// A candidate binding with no facts yet
    pub fn new(main: ApplicationMain) -> Self {
        Self {
            main,
            facts: HostFacts::default(),
            handle_exceptions: false,
        }
    }
}

/// OS version string provider
pub trait OsVersion: Send + Sync {
    /// Human-readable version of the running operating system
    fn version_string(&self) -> String;
}

/// Reads the OS version from the platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformOsVersion;

#[cfg(unix)]
impl OsVersion for PlatformOsVersion {
    fn version_string(&self) -> String {
        let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
        if unsafe { libc::uname(&mut uts) } != 0 {
            return String::new();
        }
        unsafe { std::ffi::CStr::from_ptr(uts.release.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(not(unix))]
impl OsVersion for PlatformOsVersion {
    fn version_string(&self) -> String {
        String::new()
    }
}

/// Operating system family name
pub fn operating_system() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "linux" => "Linux",
        "macos" => "Darwin",
        other => other,
    }
}

/// Architecture tag of the current process
pub fn architecture() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "x86",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Call `main` with `args` marshalled as a NUL-terminated `argv` array.
///
/// The strings live until `main` returns.
pub(crate) fn call_main(main: ApplicationMain, args: &[String]) -> Result<i32, BindError> {
    let owned = args
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut argv: Vec<*const c_char> = owned.iter().map(|arg| arg.as_ptr()).collect();
    argv.push(std::ptr::null());

    let argc = owned.len() as c_int;
    Ok(unsafe { main(argc, argv.as_ptr()) })
}
