//! Assembly override bridge
//!
//! The engine asks the host for code artifacts before probing on its own.
//! This store answers for exactly one identity, the host's managed bridging
//! assembly, and serves it from the directory named by a configured
//! environment variable. Every other request is declined with [`NotFound`]
//! without touching the environment or the filesystem.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{is_separator, Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::env::{EnvSource, MAX_PATH_LEN};
use crate::error::NotFound;

/// Extension of the debug-symbol companion of an image.
pub const SYMBOLS_EXTENSION: &str = "pdb";

/// An assembly request from the engine
#[derive(Debug, Clone, Copy)]
pub struct AssemblyBindInfo<'a> {
    /// Full display name of the requested assembly
    pub referenced_identity: &'a str,
}

/// A module (sub-assembly file) request from the engine
#[derive(Debug, Clone, Copy)]
pub struct ModuleBindInfo<'a> {
    /// Name of the requested module
    pub module_name: &'a str,
}

/// Sequential read stream over an artifact file
#[derive(Debug)]
pub struct FileStream {
    reader: BufReader<File>,
    path: PathBuf,
}

impl FileStream {
    /// Open `path` for reading
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
        })
    }

    /// File backing this stream
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

/// Streams handed to the engine for one request. The engine owns them.
#[derive(Debug)]
pub struct ProvidedAssembly {
    /// Primary image
    pub image: FileStream,
    /// Debug symbols, when a companion file exists and could be opened
    pub symbols: Option<FileStream>,
}

/// The engine's pluggable artifact-provider capability
pub trait AssemblyStore: Send + Sync {
    /// Supply the bytes of a whole assembly.
    fn provide_assembly(&self, bind_info: &AssemblyBindInfo<'_>) -> Result<ProvidedAssembly, NotFound>;

    /// Supply the bytes of a single module of a multi-file assembly.
    fn provide_module(&self, bind_info: &ModuleBindInfo<'_>) -> Result<ProvidedAssembly, NotFound>;
}

/// Serves the host's bridging assembly from a configured directory.
///
/// Shared through `Arc`: the bootstrapper keeps one reference for the
/// engine's lifetime and the engine takes more through host-control lookups.
pub struct AssemblyOverrideBridge {
    config: BridgeConfig,
    env: Arc<dyn EnvSource>,
}

impl AssemblyOverrideBridge {
    /// Create a bridge reading its directory from `env`
    pub fn new(config: BridgeConfig, env: Arc<dyn EnvSource>) -> Self {
        Self { config, env }
    }

    /// Whether `identity` names the bridged assembly (ASCII case-insensitive)
    pub fn matches(&self, identity: &str) -> bool {
        self.config.identity.eq_ignore_ascii_case(identity)
    }

    /// Build and validate the image path from the configured directory.
    fn image_path(&self) -> Result<PathBuf, NotFound> {
        let mut path = self.env.var(&self.config.library_dir_var).ok_or_else(|| {
            tracing::debug!(variable = %self.config.library_dir_var, "bridge directory not set");
            NotFound
        })?;

        if !path.ends_with(is_separator) {
            path.push(MAIN_SEPARATOR);
        }
        path.push_str(&self.config.file_name);

        if path.len() > MAX_PATH_LEN {
            tracing::debug!(len = path.len(), "bridge image path too long");
            return Err(NotFound);
        }

        let path = PathBuf::from(path);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "bridge image missing");
            return Err(NotFound);
        }

        Ok(path)
    }
}

impl AssemblyStore for AssemblyOverrideBridge {
    fn provide_assembly(&self, bind_info: &AssemblyBindInfo<'_>) -> Result<ProvidedAssembly, NotFound> {
        if !self.matches(bind_info.referenced_identity) {
            return Err(NotFound);
        }

        let path = self.image_path()?;
        let image = FileStream::open(&path).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to open bridge image");
            NotFound
        })?;

        // Debug symbols are best-effort: a missing or unreadable companion is not an error.
        let symbols_path = path.with_extension(SYMBOLS_EXTENSION);
        let symbols = if symbols_path.is_file() {
            FileStream::open(&symbols_path).ok()
        } else {
            None
        };

        tracing::debug!(
            path = %path.display(),
            symbols = symbols.is_some(),
            "providing bridge assembly"
        );

        Ok(ProvidedAssembly { image, symbols })
    }

    fn provide_module(&self, _bind_info: &ModuleBindInfo<'_>) -> Result<ProvidedAssembly, NotFound> {
        Err(NotFound)
    }
}
