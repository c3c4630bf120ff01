//! One-time engine initialization and entry-point invocation
//!
//! [`EngineBootstrapper`] is the per-process bootstrap context. It is created
//! once, passed around as an `Arc`, and:
//!
//! - runs the fixed initialization sequence at most once, caching its result
//!   for every later caller;
//! - serves the engine's host-control callbacks, handing out the assembly
//!   override bridge;
//! - binds and invokes the managed entry point.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::binding::{self, ApplicationMain, EntryPointBinding, HostFacts, OsVersion, PlatformOsVersion};
use crate::bridge::AssemblyOverrideBridge;
use crate::config::{BridgeConfig, EngineConfig, HostConfig};
use crate::engine::{
    CapabilityId, EngineFactory, HostCapability, HostControl, HostManager, NativeResult,
    RuntimeHost, RuntimePolicy, StartupFlags,
};
use crate::env::EnvSource;
use crate::error::{BindError, EngineError, InitStep, NativeCode, NotFound};

/// Flags every engine is started with.
pub const DEFAULT_STARTUP_FLAGS: StartupFlags = StartupFlags::LOADER_OPTIMIZATION_MULTI_DOMAIN_HOST
    .union(StartupFlags::SERVER_GC);

/// Status reported when the bootstrapper cannot hand itself to the engine.
pub const E_UNEXPECTED: NativeCode = 0x8000_FFFF_u32 as NativeCode;

/// Arguments of the first `initialize` call.
///
/// Recorded before the engine starts: the domain manager binds the entry
/// point from inside `start()`.
struct BootFacts {
    runtime_directory: PathBuf,
    application_base: PathBuf,
    handle_exceptions: bool,
}

/// Outcome of the initialization sequence, fixed once written
struct BootstrapState {
    result: Result<(), EngineError>,
    /// Started engine, kept for the life of the process
    runtime_host: Option<Mutex<Box<dyn RuntimeHost>>>,
}

/// Bootstraps the hosted engine and its entry point.
pub struct EngineBootstrapper {
    self_ref: Weak<EngineBootstrapper>,
    factory: Box<dyn EngineFactory>,
    engine_config: EngineConfig,
    bridge_config: BridgeConfig,
    env: Arc<dyn EnvSource>,
    os_version: Box<dyn OsVersion>,
    bridge: RwLock<Option<Arc<AssemblyOverrideBridge>>>,
    facts: OnceCell<BootFacts>,
    state: OnceCell<BootstrapState>,
    entry_point: Mutex<Option<ApplicationMain>>,
}

impl EngineBootstrapper {
    /// Create a bootstrapper over `factory`.
    ///
    /// Once the engine is started it holds a reference back to the
    /// bootstrapper as its host control, so both live until process exit.
    pub fn new(
        factory: Box<dyn EngineFactory>,
        config: &HostConfig,
        env: Arc<dyn EnvSource>,
    ) -> Arc<Self> {
        Self::with_os_version(factory, config, env, Box::new(PlatformOsVersion))
    }

    /// Like [`EngineBootstrapper::new`] with an explicit OS version provider
    pub fn with_os_version(
        factory: Box<dyn EngineFactory>,
        config: &HostConfig,
        env: Arc<dyn EnvSource>,
        os_version: Box<dyn OsVersion>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            factory,
            engine_config: config.engine.clone(),
            bridge_config: config.bridge.clone(),
            env,
            os_version,
            bridge: RwLock::new(None),
            facts: OnceCell::new(),
            state: OnceCell::new(),
            entry_point: Mutex::new(None),
        })
    }

    /// Run the initialization sequence once.
    ///
    /// Concurrent callers block until the first finishes and all observe its
    /// result. Arguments of every call after the first are ignored.
    pub fn initialize(
        &self,
        runtime_directory: &Path,
        application_base: &Path,
        handle_exceptions: bool,
    ) -> Result<(), EngineError> {
        let state = self.state.get_or_init(|| {
            self.facts.get_or_init(|| BootFacts {
                runtime_directory: runtime_directory.to_path_buf(),
                application_base: application_base.to_path_buf(),
                handle_exceptions,
            });

            match self.start_engine() {
                Ok(host) => BootstrapState {
                    result: Ok(()),
                    runtime_host: Some(Mutex::new(host)),
                },
                Err(e) => {
                    tracing::error!(step = %e.step, code = e.code, "engine initialization failed");
                    // No engine is alive to be served by the bridge.
                    self.bridge.write().take();
                    BootstrapState {
                        result: Err(e),
                        runtime_host: None,
                    }
                }
            }
        });

        state.result.clone()
    }

    /// Cached initialization result, `None` before initialization completed
    pub fn init_result(&self) -> Option<Result<(), EngineError>> {
        self.state.get().map(|state| state.result.clone())
    }

    /// Whether the engine was started and is held by this bootstrapper
    pub fn is_engine_started(&self) -> bool {
        self.state
            .get()
            .map_or(false, |state| state.runtime_host.is_some())
    }

    /// The assembly override bridge, from the start of initialization for
    /// as long as the engine is alive
    pub fn assembly_store(&self) -> Option<Arc<AssemblyOverrideBridge>> {
        self.bridge.read().clone()
    }

    fn start_engine(&self) -> Result<Box<dyn RuntimeHost>, EngineError> {
        fn at(step: InitStep) -> impl Fn(NativeCode) -> EngineError {
            move |code| EngineError { step, code }
        }

        *self.bridge.write() = Some(Arc::new(AssemblyOverrideBridge::new(
            self.bridge_config.clone(),
            self.env.clone(),
        )));

        let policy = self
            .factory
            .create_policy()
            .map_err(at(InitStep::CreatePolicy))?;

        let mut runtime = policy
            .requested_runtime(&self.engine_config.min_version, RuntimePolicy::ApplyUpgradePolicy)
            .map_err(at(InitStep::SelectRuntime))?;
        tracing::debug!(
            requested = %self.engine_config.min_version,
            selected = %runtime.version(),
            "selected engine runtime"
        );

        runtime
            .set_default_startup_flags(DEFAULT_STARTUP_FLAGS)
            .map_err(at(InitStep::SetStartupFlags))?;

        let mut host = runtime
            .runtime_host()
            .map_err(at(InitStep::GetRuntimeHost))?;

        let control: Arc<dyn HostControl> = self
            .self_ref
            .upgrade()
            .ok_or(EngineError {
                step: InitStep::SetHostControl,
                code: E_UNEXPECTED,
            })?;
        host.set_host_control(control)
            .map_err(at(InitStep::SetHostControl))?;

        host.set_domain_manager_type(
            &self.engine_config.domain_manager_assembly,
            &self.engine_config.domain_manager_type,
        )
        .map_err(at(InitStep::SetDomainManager))?;

        host.start().map_err(at(InitStep::Start))?;
        tracing::info!("engine started");

        Ok(host)
    }

    /// Record `candidate`'s entry point and return it with host facts filled in.
    ///
    /// Nothing is invoked.
    pub fn bind_entry_point(&self, candidate: EntryPointBinding) -> EntryPointBinding {
        *self.entry_point.lock() = Some(candidate.main);

        let boot = self.facts.get();
        let facts = HostFacts {
            operating_system: binding::operating_system().to_string(),
            os_version: self.os_version.version_string(),
            architecture: binding::architecture().to_string(),
            runtime_directory: boot
                .map(|b| b.runtime_directory.clone())
                .unwrap_or_default(),
            application_base: boot
                .map(|b| b.application_base.clone())
                .unwrap_or_default(),
        };

        EntryPointBinding {
            main: candidate.main,
            facts,
            handle_exceptions: boot.map_or(false, |b| b.handle_exceptions),
        }
    }

    /// Call the most recently bound entry point and return its exit code.
    ///
    /// The binding is consumed; blocks until the managed program returns.
    pub fn invoke_entry_point(&self, args: &[String]) -> Result<i32, BindError> {
        let main = self.entry_point.lock().take().ok_or(BindError::NotBound)?;
        binding::call_main(main, args)
    }
}

impl HostControl for EngineBootstrapper {
    fn get_host_manager(&self, capability: CapabilityId) -> Result<HostManager, NotFound> {
        let capability = HostCapability::from_id(capability).ok_or(NotFound)?;

        match capability {
            HostCapability::Bootstrapper => self
                .self_ref
                .upgrade()
                .map(HostManager::Bootstrapper)
                .ok_or(NotFound),
            HostCapability::HostControl => self
                .self_ref
                .upgrade()
                .map(|me| HostManager::HostControl(me))
                .ok_or(NotFound),
            HostCapability::AssemblyStore => self
                .assembly_store()
                .map(|bridge| HostManager::AssemblyStore(bridge))
                .ok_or(NotFound),
        }
    }

    fn set_domain_manager(&self, domain_id: u32, _manager: &dyn Any) -> NativeResult<()> {
        tracing::trace!(domain_id, "domain manager registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EnginePolicy;
    use crate::env::MapEnv;

    struct RefusingFactory;

    impl EngineFactory for RefusingFactory {
        fn create_policy(&self) -> NativeResult<Box<dyn EnginePolicy>> {
            Err(-1)
        }
    }

    fn refusing() -> Arc<EngineBootstrapper> {
        EngineBootstrapper::new(
            Box::new(RefusingFactory),
            &HostConfig::default(),
            Arc::new(MapEnv::new()),
        )
    }

    #[test]
    fn test_default_startup_flags() {
        assert!(DEFAULT_STARTUP_FLAGS.contains(StartupFlags::SERVER_GC));
        assert!(DEFAULT_STARTUP_FLAGS.contains(StartupFlags::LOADER_OPTIMIZATION_MULTI_DOMAIN_HOST));
        assert!(!DEFAULT_STARTUP_FLAGS.contains(StartupFlags::CONCURRENT_GC));
    }

    #[test]
    fn test_failure_is_cached() {
        let bootstrapper = refusing();
        assert_eq!(bootstrapper.init_result(), None);

        let expected = EngineError {
            step: InitStep::CreatePolicy,
            code: -1,
        };
        assert_eq!(
            bootstrapper.initialize(Path::new("a"), Path::new("b"), false),
            Err(expected.clone())
        );
        assert_eq!(bootstrapper.init_result(), Some(Err(expected)));
        assert!(!bootstrapper.is_engine_started());
    }

    #[test]
    fn test_lookup_before_initialize() {
        let bootstrapper = refusing();
        assert!(bootstrapper
            .get_host_manager(HostCapability::AssemblyStore.id())
            .is_err());
        assert!(matches!(
            bootstrapper.get_host_manager(HostCapability::Bootstrapper.id()),
            Ok(HostManager::Bootstrapper(_))
        ));
        assert!(bootstrapper.get_host_manager(CapabilityId(42)).is_err());
    }

    #[test]
    fn test_invoke_without_bind() {
        let bootstrapper = refusing();
        assert!(matches!(
            bootstrapper.invoke_entry_point(&[]),
            Err(BindError::NotBound)
        ));
    }

    #[test]
    fn test_set_domain_manager_ignored() {
        let bootstrapper = refusing();
        assert_eq!(bootstrapper.set_domain_manager(1, &()), Ok(()));
    }
}
