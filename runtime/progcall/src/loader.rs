///
/// # Dynamic Loader Capability
///
/// The runtime needs three primitives from the platform: open a library by
/// path, look a symbol up in it, close it again. `Loader` is that capability;
/// everything above it deals only in opaque `ModuleHandle`s and
/// `EntryPoint` addresses.
///
/// `DlLoader` implements it with `libloading`. On unix, modules are opened
/// with `RTLD_LAZY | RTLD_GLOBAL` so a module's symbols are visible to modules
/// loaded after it. The running executable is exposed as the main handle.
///

use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;

use libloading::Library;
use tracing::debug;

use crate::errors::CallError;

/// Opaque id of a module opened through a `Loader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

/// Non-null address of a resolved program.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPoint(NonNull<c_void>);

impl EntryPoint {
    pub fn new(addr: *const c_void) -> Option<Self> {
        NonNull::new(addr as *mut c_void).map(EntryPoint)
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0.as_ptr()
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryPoint({:p})", self.0.as_ptr())
    }
}

pub trait Loader {
    fn open(&mut self, path: &Path) -> Result<ModuleHandle, CallError>;

    /// Handle of the running executable, if the platform provides one.
    fn open_main(&mut self) -> Option<ModuleHandle>;

    fn symbol(&self, handle: ModuleHandle, name: &str) -> Option<EntryPoint>;

    fn close(&mut self, handle: ModuleHandle);
}

/// `Loader` backed by the platform dynamic linker.
#[derive(Default)]
pub struct DlLoader {
    libs: Vec<Option<Library>>,
}

impl DlLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, lib: Library) -> ModuleHandle {
        self.libs.push(Some(lib));
        ModuleHandle(self.libs.len() as u64 - 1)
    }

    fn library(&self, handle: ModuleHandle) -> Option<&Library> {
        self.libs.get(handle.0 as usize)?.as_ref()
    }
}

impl Loader for DlLoader {
    fn open(&mut self, path: &Path) -> Result<ModuleHandle, CallError> {
        #[cfg(unix)]
        let lib = unsafe {
            let flags = libloading::os::unix::RTLD_LAZY | libloading::os::unix::RTLD_GLOBAL;
            libloading::os::unix::Library::open(Some(path), flags).map(Library::from)
        };
        #[cfg(not(unix))]
        let lib = unsafe { Library::new(path) };

        let lib = lib.map_err(|e| CallError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), "opened module");
        Ok(self.register(lib))
    }

    fn open_main(&mut self) -> Option<ModuleHandle> {
        #[cfg(unix)]
        let lib = Some(Library::from(libloading::os::unix::Library::this()));
        #[cfg(windows)]
        let lib = libloading::os::windows::Library::this().ok().map(Library::from);
        #[cfg(not(any(unix, windows)))]
        let lib: Option<Library> = None;

        lib.map(|lib| self.register(lib))
    }

    fn symbol(&self, handle: ModuleHandle, name: &str) -> Option<EntryPoint> {
        let lib = self.library(handle)?;
        let mut cname = Vec::with_capacity(name.len() + 1);
        cname.extend_from_slice(name.as_bytes());
        cname.push(0);

        // SAFETY: the symbol is only read as an address, never dereferenced here.
        let sym = unsafe { lib.get::<*mut c_void>(&cname) }.ok()?;
        EntryPoint::new(*sym)
    }

    fn close(&mut self, handle: ModuleHandle) {
        let Some(slot) = self.libs.get_mut(handle.0 as usize) else {
            return;
        };
        if let Some(lib) = slot.take() {
            if let Err(e) = lib.close() {
                debug!(handle = handle.0, error = %e, "module close reported an error");
            }
        }
    }
}

impl fmt::Debug for DlLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = self.libs.iter().filter(|l| l.is_some()).count();
        f.debug_struct("DlLoader").field("open", &open).finish()
    }
}
