///
/// # Runtime Context
///
/// `CallRuntime` owns every piece of state the call machinery needs: the
/// loader, the search path, both module collections, the call cache, the
/// last resolution error and the parameter frame of the current call.
///
/// `init` builds the search path from the effective library path, opens the
/// main executable handle and loads the preload list. `teardown` closes every
/// preloaded and dynamically loaded module exactly once. A runtime is not
/// shared between threads; each thread that needs one creates its own.
///

use std::collections::HashMap;
use std::iter;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cache::{CallCache, CancelHook, ModuleRef, canonical_path};
use crate::loader::{EntryPoint, Loader, ModuleHandle};
use crate::modules::ModuleTracker;
use crate::params::ParamFrame;
use crate::search_path::SearchPath;
use crate::settings::{PATH_SEPARATOR, Settings};

/// Returned by `take_resolve_error` when nothing was recorded.
pub const DEFAULT_RESOLVE_ERROR: &str = "indeterminable error in resolve of program call";

/// A program nested inside its caller, callable by name without loading.
#[derive(Debug, Clone)]
pub struct ContainedProgram {
    pub name: String,
    pub entry: EntryPoint,
    pub cancel: Option<CancelHook>,
}

impl ContainedProgram {
    pub fn new(name: impl Into<String>, entry: EntryPoint) -> Self {
        Self {
            name: name.into(),
            entry,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, hook: CancelHook) -> Self {
        self.cancel = Some(hook);
        self
    }
}

pub struct CallRuntime {
    pub(crate) loader: Box<dyn Loader>,
    pub(crate) settings: Settings,
    pub(crate) search_path: SearchPath,
    pub(crate) main_handle: Option<ModuleHandle>,
    pub(crate) modules: ModuleTracker,
    pub(crate) cache: CallCache,
    pub(crate) last_error: Option<String>,
    pub(crate) physical_cancel: bool,
    pub(crate) frame: Option<ParamFrame>,
    pub(crate) system_routines: HashMap<String, EntryPoint>,
}

impl CallRuntime {
    pub fn init(settings: Settings, loader: impl Loader + 'static) -> Self {
        let mut loader: Box<dyn Loader> = Box::new(loader);
        let search_path = SearchPath::parse(&settings.effective_library_path());
        let main_handle = loader.open_main();

        debug!(
            dirs = search_path.len(),
            main = main_handle.is_some(),
            "initializing call runtime"
        );

        let mut runtime = Self {
            loader,
            physical_cancel: settings.physical_cancel,
            settings,
            search_path,
            main_handle,
            modules: ModuleTracker::new(),
            cache: CallCache::new(),
            last_error: None,
            frame: None,
            system_routines: HashMap::new(),
        };
        runtime.preload();
        runtime
    }

    /// Closes every tracked module and drops all cached resolutions.
    pub fn teardown(mut self) {
        for handle in self.modules.drain_handles() {
            self.loader.close(handle);
        }
        self.cache.clear();
        debug!("call runtime shut down");
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn modules(&self) -> &ModuleTracker {
        &self.modules
    }

    pub fn cache(&self) -> &CallCache {
        &self.cache
    }

    /// Paths of the successfully preloaded modules, in load order.
    pub fn preloaded_paths_string(&self) -> String {
        self.modules.preload_string(PATH_SEPARATOR)
    }

    /// Reads and clears the message of the last failed resolution.
    pub fn take_resolve_error(&mut self) -> String {
        self.last_error
            .take()
            .unwrap_or_else(|| DEFAULT_RESOLVE_ERROR.to_string())
    }

    /// Runtime-level physical cancel switch. Modules are only unloaded when
    /// both this and the configured setting are on.
    pub fn set_physical_cancel(&mut self, enabled: bool) {
        self.physical_cancel = enabled;
    }

    pub(crate) fn physical_cancel_enabled(&self) -> bool {
        self.physical_cancel && self.settings.physical_cancel
    }

    pub fn register_system_routine(&mut self, name: impl Into<String>, entry: EntryPoint) {
        self.system_routines.insert(name.into(), entry);
    }

    /// Attaches a running program's descriptor to its cache entry so a
    /// later cancel can reach its shutdown hook.
    pub fn register_module(&mut self, module: &ModuleRef) {
        self.cache.register_module(module);
    }

    fn preload(&mut self) {
        let Some(list) = self.settings.preload.clone() else {
            return;
        };

        for token in list.split(PATH_SEPARATOR).filter(|t| !t.is_empty()) {
            let file_name = format!("{}.{}", token, self.settings.module_extension);
            let candidates: Vec<PathBuf> = self
                .search_path
                .candidates(&file_name)
                .chain(iter::once(PathBuf::from(token)))
                .collect();

            if !candidates.iter().any(|c| self.try_preload(c)) {
                warn!(module = token, "preload module not found");
            }
        }
    }

    fn try_preload(&mut self, path: &Path) -> bool {
        if !is_readable(path) {
            return false;
        }
        let key = canonical_path(path).to_string_lossy().into_owned();
        if self.modules.is_preloaded(&key) {
            return true;
        }

        match self.loader.open(path) {
            Ok(handle) => {
                debug!(path = %key, "preloaded module");
                self.modules.add_preload(key, handle);
                true
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "preload candidate rejected");
                false
            }
        }
    }
}

/// True when `path` is a regular file the process may read.
#[cfg(unix)]
pub(crate) fn is_readable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    if !path.is_file() {
        return false;
    }
    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: cpath is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(cpath.as_ptr(), libc::R_OK) == 0 }
}

#[cfg(not(unix))]
pub(crate) fn is_readable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_readable() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("m.so");
        std::fs::write(&file, b"x").unwrap();

        assert!(is_readable(&file));
        assert!(!is_readable(temp.path()));
        assert!(!is_readable(&temp.path().join("absent.so")));
    }

    #[test]
    fn test_contained_program_builder() {
        extern "C" fn inner() -> i32 {
            0
        }
        let entry = EntryPoint::new(inner as *const std::ffi::c_void).unwrap();
        let program = ContainedProgram::new("INNER", entry);
        assert_eq!(program.name, "INNER");
        assert!(program.cancel.is_none());
    }
}
