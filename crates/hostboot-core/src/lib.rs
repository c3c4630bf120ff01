//! Hostboot core
//!
//! Native bootstrapper for a managed execution engine hosted as a dynamic
//! library. This crate provides:
//! - Dynamic library loading with guaranteed release (`ModuleLoader`)
//! - Runtime directory resolution with servicing redirection (`RuntimeLocator`)
//! - The assembly override bridge served to the engine (`AssemblyOverrideBridge`)
//! - One-time engine initialization and entry-point invocation (`EngineBootstrapper`)
//! - The native launch sequence and its C ABI (`Launcher`, `HostInvocationData`)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod abi;
pub mod binding;
pub mod bootstrapper;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod launcher;
pub mod loader;
pub mod locator;
pub mod trace;

pub use abi::{FnCallApplicationMain, HostInvocationData, Invocation};
pub use binding::{ApplicationMain, EntryPointBinding, HostFacts, OsVersion, PlatformOsVersion};
pub use bootstrapper::{EngineBootstrapper, DEFAULT_STARTUP_FLAGS};
pub use bridge::{
    AssemblyBindInfo, AssemblyOverrideBridge, AssemblyStore, FileStream, ModuleBindInfo,
    ProvidedAssembly,
};
pub use config::HostConfig;
pub use engine::{
    CapabilityId, EngineFactory, EnginePolicy, HostCapability, HostControl, HostManager,
    NativeResult, RuntimeHost, RuntimeInfo, RuntimePolicy, StartupFlags,
};
pub use env::{EnvSource, MapEnv, ProcessEnv, MAX_PATH_LEN};
pub use error::{
    BindError, ConfigError, EngineError, InitStep, LaunchError, LoadError, NativeCode, NotFound,
};
pub use launcher::{Launcher, EXIT_BOOTSTRAP_FAILURE};
pub use loader::{LoadedModule, ModuleLoader, PlatformLoader, ScopedModule, Symbol};
pub use locator::{NoServicing, RuntimeLocation, RuntimeLocator, Servicing};
pub use trace::{NullSink, TraceSink, TracingSink};
