//! Hosting API of the managed engine
//!
//! The bootstrapper drives the engine through these traits: select a runtime
//! through a policy object, configure its startup flags, obtain a startable
//! host, register host control, name the domain manager and start it. The
//! engine calls back through [`HostControl`].
//!
//! Every engine call reports failure as a raw [`NativeCode`]; the
//! bootstrapper attaches the step that failed.

use std::any::Any;
use std::sync::Arc;

use bitflags::bitflags;

use crate::bootstrapper::EngineBootstrapper;
use crate::bridge::AssemblyStore;
use crate::error::{NativeCode, NotFound};

/// Result of a single hosting API call
pub type NativeResult<T> = Result<T, NativeCode>;

bitflags! {
    /// Default startup flags applied to a selected runtime
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StartupFlags: u32 {
        /// Concurrent garbage collection
        const CONCURRENT_GC = 0x0000_0001;
        /// No assemblies are shared between domains
        const LOADER_OPTIMIZATION_SINGLE_DOMAIN = 0x0000_0002;
        /// All assemblies are shared between domains
        const LOADER_OPTIMIZATION_MULTI_DOMAIN = 0x0000_0004;
        /// Strong-named assemblies are shared between domains
        const LOADER_OPTIMIZATION_MULTI_DOMAIN_HOST = 0x0000_0006;
        /// Server garbage collection
        const SERVER_GC = 0x0000_1000;
    }
}

/// How a requested runtime version is matched against installed runtimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePolicy {
    /// Only the exact version satisfies the request
    Exact,
    /// A newer compatible version may satisfy the request
    ApplyUpgradePolicy,
}

/// Entry into the hosting API: creates runtime-selection policies.
pub trait EngineFactory: Send + Sync {
    /// Create a runtime-selection policy handle.
    fn create_policy(&self) -> NativeResult<Box<dyn EnginePolicy>>;
}

/// Runtime selection
pub trait EnginePolicy {
    /// Select a runtime satisfying `min_version` under `policy`.
    fn requested_runtime(
        &self,
        min_version: &str,
        policy: RuntimePolicy,
    ) -> NativeResult<Box<dyn RuntimeInfo>>;
}

/// A selected, not yet started runtime
pub trait RuntimeInfo {
    /// Version actually selected
    fn version(&self) -> String;

    /// Set the flags the runtime starts with.
    fn set_default_startup_flags(&mut self, flags: StartupFlags) -> NativeResult<()>;

    /// Obtain a startable host for this runtime.
    fn runtime_host(&self) -> NativeResult<Box<dyn RuntimeHost>>;
}

/// A startable engine host
pub trait RuntimeHost: Send {
    /// Register the object the engine queries for host capabilities.
    fn set_host_control(&mut self, control: Arc<dyn HostControl>) -> NativeResult<()>;

    /// Name the managed type that customizes domain setup.
    fn set_domain_manager_type(&mut self, assembly: &str, type_name: &str) -> NativeResult<()>;

    /// Start the engine.
    fn start(&mut self) -> NativeResult<()>;
}

/// Identity the engine uses to ask for a host capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityId(pub u128);

/// The capabilities the host answers for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCapability {
    /// The bootstrapper itself
    Bootstrapper,
    /// The host-control callback surface
    HostControl,
    /// The assembly override store
    AssemblyStore,
}

impl HostCapability {
    /// Every capability, in lookup order
    pub const ALL: [HostCapability; 3] = [
        HostCapability::Bootstrapper,
        HostCapability::HostControl,
        HostCapability::AssemblyStore,
    ];

    /// Identity of this capability on the engine side
    pub const fn id(self) -> CapabilityId {
        match self {
            HostCapability::Bootstrapper => CapabilityId(0x7E9C5238_60DC_49D3_94AA_53C91FA79F7C),
            HostCapability::HostControl => CapabilityId(0x02CA073C_7079_4860_880A_C2F7A449C991),
            HostCapability::AssemblyStore => CapabilityId(0x613DABD7_62B2_493E_9E65_C1E32A1E0C5E),
        }
    }

    /// Capability for an engine-side identity
    pub fn from_id(id: CapabilityId) -> Option<Self> {
        Self::ALL.into_iter().find(|capability| capability.id() == id)
    }
}

/// Object returned to the engine for a capability lookup
#[derive(Clone)]
pub enum HostManager {
    /// The bootstrapper
    Bootstrapper(Arc<EngineBootstrapper>),
    /// The host-control surface
    HostControl(Arc<dyn HostControl>),
    /// The assembly override store
    AssemblyStore(Arc<dyn AssemblyStore>),
}

impl HostManager {
    /// Capability this object answers for
    pub fn capability(&self) -> HostCapability {
        match self {
            HostManager::Bootstrapper(_) => HostCapability::Bootstrapper,
            HostManager::HostControl(_) => HostCapability::HostControl,
            HostManager::AssemblyStore(_) => HostCapability::AssemblyStore,
        }
    }
}

impl std::fmt::Debug for HostManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostManager::{:?}", self.capability())
    }
}

/// Callbacks from the engine into the host
pub trait HostControl: Send + Sync {
    /// Return the host object for `capability`, or [`NotFound`].
    fn get_host_manager(&self, capability: CapabilityId) -> Result<HostManager, NotFound>;

    /// Notification that the domain `domain_id` created its domain manager.
    fn set_domain_manager(&self, domain_id: u32, manager: &dyn Any) -> NativeResult<()>;
}
