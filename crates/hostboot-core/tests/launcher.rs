//! Launch sequence tests with an in-process fake module loader.

use hostboot_core::config::ServicingConfig;
use hostboot_core::{
    FnCallApplicationMain, HostInvocationData, Invocation, LaunchError, Launcher, LoadError,
    LoadedModule, MapEnv, ModuleLoader, NoServicing, NullSink, RuntimeLocator, Servicing, Symbol,
    TraceSink, MAX_PATH_LEN,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_void;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};

/// Loader that "loads" any path listed in `modules` and tracks open handles.
#[derive(Default)]
struct FakeLoader {
    modules: HashMap<PathBuf, HashMap<String, FnCallApplicationMain>>,
    open: Mutex<HashMap<PathBuf, usize>>,
    loads: Mutex<Vec<PathBuf>>,
}

impl FakeLoader {
    fn with_module(mut self, path: impl Into<PathBuf>, export: &str, entry: FnCallApplicationMain) -> Self {
        self.modules
            .entry(path.into())
            .or_default()
            .insert(export.to_string(), entry);
        self
    }

    fn open_count(&self) -> usize {
        self.open.lock().values().sum()
    }

    fn loads(&self) -> Vec<PathBuf> {
        self.loads.lock().clone()
    }
}

impl ModuleLoader for FakeLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule, LoadError> {
        self.loads.lock().push(path.to_path_buf());
        if !self.modules.contains_key(path) {
            return Err(LoadError::ModuleNotFound {
                path: path.to_path_buf(),
                message: "no such module".to_string(),
            });
        }
        *self.open.lock().entry(path.to_path_buf()).or_default() += 1;
        Ok(LoadedModule::new(std::ptr::null_mut(), path.to_path_buf()))
    }

    fn resolve_symbol(&self, module: &LoadedModule, name: &str) -> Result<Symbol, LoadError> {
        self.modules
            .get(module.path())
            .and_then(|exports| exports.get(name))
            .map(|entry| Symbol::new(*entry as usize as *mut c_void))
            .ok_or_else(|| LoadError::EntryPointMissing {
                symbol: name.to_string(),
                module: module.path().to_path_buf(),
            })
    }

    fn unload(&self, module: LoadedModule) {
        let mut open = self.open.lock();
        let count = open.get_mut(module.path()).expect("unload without load");
        *count -= 1;
    }
}

struct RedirectTo(&'static str);

impl Servicing for RedirectTo {
    fn get_runtime_path(&self, _: &Path, _: bool, _: &dyn TraceSink) -> Option<PathBuf> {
        Some(PathBuf::from(self.0))
    }
}

fn sources() -> ServicingConfig {
    ServicingConfig {
        override_var: "HOSTBOOT_SERVICING".to_string(),
        convention_vars: Vec::new(),
    }
}

fn default_launcher(loader: &FakeLoader) -> Launcher<&FakeLoader, MapEnv, NoServicing> {
    Launcher::new(
        loader,
        RuntimeLocator::new(sources(), MapEnv::new(), NoServicing),
        PathBuf::from("/opt/hostboot"),
    )
}

fn invocation(args: &[&str]) -> Invocation {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    Invocation::new(Path::new("/srv/app"), &args).unwrap()
}

unsafe extern "C" fn success_with_exit_code(data: *mut HostInvocationData) -> c_int {
    (*data).exit_code = (*data).argc + 40;
    0
}

unsafe extern "C" fn failure_code(data: *mut HostInvocationData) -> c_int {
    (*data).exit_code = 99;
    -3
}

unsafe extern "C" fn reports_redirect(data: *mut HostInvocationData) -> c_int {
    match (*data).runtime_directory() {
        Some(dir) if dir.ends_with("bin") => 1,
        Some(_) => 2,
        None => 3,
    }
}

#[test]
fn test_success_uses_exit_code_slot() {
    let loader = FakeLoader::default().with_module(
        "/opt/hostboot/libhost.so",
        "CallApplicationMain",
        success_with_exit_code,
    );
    let launcher = default_launcher(&loader);

    let code = launcher
        .call_application_main(
            "libhost.so",
            "CallApplicationMain",
            &mut invocation(&["app.dll", "x"]),
            &NullSink,
        )
        .unwrap();
    assert_eq!(code, 42);
    assert_eq!(loader.loads(), vec![PathBuf::from("/opt/hostboot/libhost.so")]);
}

#[test]
fn test_nonzero_return_is_exit_code() {
    let loader = FakeLoader::default().with_module(
        "/opt/hostboot/libhost.so",
        "CallApplicationMain",
        failure_code,
    );
    let launcher = default_launcher(&loader);

    let code = launcher
        .call_application_main(
            "libhost.so",
            "CallApplicationMain",
            &mut invocation(&[]),
            &NullSink,
        )
        .unwrap();
    assert_eq!(code, -3);
    assert_eq!(loader.open_count(), 0);
}

#[test]
fn test_module_unloaded_after_each_call() {
    let loader = FakeLoader::default().with_module(
        "/opt/hostboot/libhost.so",
        "CallApplicationMain",
        success_with_exit_code,
    );
    let launcher = default_launcher(&loader);

    for _ in 0..3 {
        launcher
            .call_application_main(
                "libhost.so",
                "CallApplicationMain",
                &mut invocation(&[]),
                &NullSink,
            )
            .unwrap();
        assert_eq!(loader.open_count(), 0);
    }
    assert_eq!(loader.loads().len(), 3);
}

#[test]
fn test_missing_export_still_unloads() {
    let loader = FakeLoader::default().with_module(
        "/opt/hostboot/libhost.so",
        "SomethingElse",
        success_with_exit_code,
    );
    let launcher = default_launcher(&loader);

    let result = launcher.call_application_main(
        "libhost.so",
        "CallApplicationMain",
        &mut invocation(&[]),
        &NullSink,
    );
    match result {
        Err(LaunchError::Load(LoadError::EntryPointMissing { symbol, module })) => {
            assert_eq!(symbol, "CallApplicationMain");
            assert_eq!(module, PathBuf::from("/opt/hostboot/libhost.so"));
        }
        other => panic!("Expected EntryPointMissing, got {:?}", other),
    }
    assert_eq!(loader.loads().len(), 1);
    assert_eq!(loader.open_count(), 0);
}

#[test]
fn test_load_failure_has_nothing_to_unload() {
    let loader = FakeLoader::default();
    let launcher = default_launcher(&loader);

    let result = launcher.call_application_main(
        "libhost.so",
        "CallApplicationMain",
        &mut invocation(&[]),
        &NullSink,
    );
    match result {
        Err(LaunchError::Load(LoadError::ModuleNotFound { path, .. })) => {
            assert_eq!(path, PathBuf::from("/opt/hostboot/libhost.so"));
        }
        other => panic!("Expected ModuleNotFound, got {:?}", other),
    }
    assert_eq!(loader.open_count(), 0);
}

#[test]
fn test_redirected_runtime_loads_from_bin() {
    let module_path = Path::new("/serviced/rt").join("bin").join("libhost.so");
    let loader = FakeLoader::default().with_module(
        module_path.clone(),
        "CallApplicationMain",
        reports_redirect,
    );
    let launcher = Launcher::new(
        &loader,
        RuntimeLocator::new(
            sources(),
            MapEnv::new().with("HOSTBOOT_SERVICING", "/servicing"),
            RedirectTo("/serviced/rt"),
        ),
        PathBuf::from("/opt/hostboot"),
    );

    let mut invocation = invocation(&[]);
    let code = launcher
        .call_application_main("libhost.so", "CallApplicationMain", &mut invocation, &NullSink)
        .unwrap();
    assert_eq!(code, 1);
    assert!(invocation.runtime_directory().is_some());
    assert_eq!(loader.loads(), vec![module_path]);
}

#[test]
fn test_default_location_passes_no_runtime_directory() {
    let loader = FakeLoader::default().with_module(
        "/opt/hostboot/libhost.so",
        "CallApplicationMain",
        reports_redirect,
    );
    let launcher = default_launcher(&loader);

    let code = launcher
        .call_application_main(
            "libhost.so",
            "CallApplicationMain",
            &mut invocation(&[]),
            &NullSink,
        )
        .unwrap();
    assert_eq!(code, 3);
}

#[test]
fn test_invalid_servicing_value_fails_before_load() {
    let loader = FakeLoader::default();
    let launcher = Launcher::new(
        &loader,
        RuntimeLocator::new(
            sources(),
            MapEnv::new().with("HOSTBOOT_SERVICING", "x".repeat(MAX_PATH_LEN)),
            NoServicing,
        ),
        PathBuf::from("/opt/hostboot"),
    );

    let result = launcher.call_application_main(
        "libhost.so",
        "CallApplicationMain",
        &mut invocation(&[]),
        &NullSink,
    );
    assert!(matches!(result, Err(LaunchError::Config(_))));
    assert!(loader.loads().is_empty());
}
