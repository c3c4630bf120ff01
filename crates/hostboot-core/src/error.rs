//! Error types shared across the bootstrapper.

use std::path::PathBuf;
use thiserror::Error;

/// Native status code reported by the hosting API (negative values are failures).
pub type NativeCode = i32;

/// Errors raised while reading environment-derived or file-based configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment source held a value the host cannot use
    #[error("The value of the '{variable}' environment variable is invalid. The application will exit.")]
    InvalidConfigValue {
        /// Name of the offending environment variable
        variable: String,
    },

    /// The application base could not be turned into a full path
    #[error("Failed to get full path of application base: {path}")]
    ApplicationBase {
        /// Path as given by the caller
        path: PathBuf,
    },

    /// Failed to read a configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a configuration file
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors that can occur during library loading
#[derive(Debug, Error)]
pub enum LoadError {
    /// Library file missing, unmappable or with unresolved dependencies
    #[error("Failed to load: '{path}' error: {message}")]
    ModuleNotFound {
        /// Path that was attempted
        path: PathBuf,
        /// Diagnostic text from the OS loader
        message: String,
    },

    /// Named export not present in the library
    #[error("Failed to find export '{symbol}' in {module}")]
    EntryPointMissing {
        /// Export name that was not found
        symbol: String,
        /// Library path
        module: PathBuf,
    },

    /// Path or symbol name not representable for the OS loader
    #[error("Invalid path or symbol name: {0}")]
    InvalidPath(String),
}

/// Step of the engine initialization sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    /// Creating the engine-selection policy
    CreatePolicy,
    /// Requesting a runtime for the minimum version
    SelectRuntime,
    /// Applying default startup flags
    SetStartupFlags,
    /// Obtaining the startable engine host
    GetRuntimeHost,
    /// Registering the host-control target
    SetHostControl,
    /// Configuring the domain manager type
    SetDomainManager,
    /// Starting the engine
    Start,
}

impl std::fmt::Display for InitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InitStep::CreatePolicy => "create engine policy",
            InitStep::SelectRuntime => "select runtime",
            InitStep::SetStartupFlags => "set startup flags",
            InitStep::GetRuntimeHost => "get runtime host",
            InitStep::SetHostControl => "set host control",
            InitStep::SetDomainManager => "set domain manager",
            InitStep::Start => "start engine",
        };
        f.write_str(name)
    }
}

/// Failure of the one-time engine initialization
///
/// Cached by the bootstrapper and replayed to every later caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Engine initialization failed at '{step}' (code {code:#010x})")]
pub struct EngineError {
    /// Step that failed
    pub step: InitStep,
    /// Native status code returned by that step
    pub code: NativeCode,
}

/// The assembly store does not provide the requested artifact.
///
/// Expected and non-fatal: the engine falls back to its own probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("File not found")]
pub struct NotFound;

/// Errors from the entry-point binding contract
#[derive(Debug, Error)]
pub enum BindError {
    /// `invoke_entry_point` was called without a preceding bind
    #[error("Entry point invoked before it was bound")]
    NotBound,

    /// An argument contained an interior NUL byte
    #[error("Invalid argument for entry point: {0}")]
    InvalidArgument(#[from] std::ffi::NulError),
}

/// Errors from the native launch sequence
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Runtime location could not be resolved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Host module could not be loaded or lacks the entry export
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A path or argument could not be passed across the native boundary
    #[error("Invalid argument for host module: {0}")]
    InvalidArgument(#[from] std::ffi::NulError),
}
