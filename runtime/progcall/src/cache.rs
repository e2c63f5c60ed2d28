///
/// # Call Cache
///
/// Maps a program name (bare, before encoding) to the outcome of its
/// resolution. Each entry keeps the entry point, the module handle it came
/// from, the canonical module path and whether the entry may ever be
/// physically unloaded.
///
/// An entry can also point at the `ProgramModule` descriptor of the program
/// it resolves to. The descriptor is owned by the generated program; the
/// cache only holds a `Weak` reference, registered when the program first
/// runs and cleared again on cancel.
///

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_int, c_void};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::loader::{EntryPoint, ModuleHandle};

/// Shutdown hook of a program. Invoked as `hook(CANCEL_SIGNAL, null, null,
/// null, null)` when the program is cancelled.
pub type CancelHook =
    unsafe extern "C" fn(c_int, *mut c_void, *mut c_void, *mut c_void, *mut c_void) -> c_int;

/// First argument passed to a `CancelHook` to request shutdown.
pub const CANCEL_SIGNAL: c_int = -1;

/// Runtime-visible state of a loaded program.
#[derive(Debug, Clone, Default)]
pub struct ProgramModule {
    pub name: String,
    pub entry: Option<EntryPoint>,
    pub cancel: Option<CancelHook>,
    /// Set by programs that must never be unloaded.
    pub no_physical_cancel: bool,
    /// Nonzero while the program is executing.
    pub active: u32,
    pub ref_count: u32,
    pub path: Option<PathBuf>,
}

impl ProgramModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_entry(mut self, entry: EntryPoint) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn with_cancel(mut self, hook: CancelHook) -> Self {
        self.cancel = Some(hook);
        self
    }

    pub fn into_ref(self) -> ModuleRef {
        Rc::new(RefCell::new(self))
    }
}

/// Shared handle to a `ProgramModule`, owned by the program itself.
pub type ModuleRef = Rc<RefCell<ProgramModule>>;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub name: String,
    pub entry: EntryPoint,
    pub module: Option<Weak<RefCell<ProgramModule>>>,
    pub handle: Option<ModuleHandle>,
    pub path: Option<PathBuf>,
    pub no_phys_cancel: bool,
}

impl CacheEntry {
    /// The registered module descriptor, if it is still alive.
    pub fn module(&self) -> Option<ModuleRef> {
        self.module.as_ref()?.upgrade()
    }
}

/// Resolves `path` to an absolute, symlink-free form, or returns it
/// unchanged when the platform cannot.
pub fn canonical_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[derive(Debug, Default)]
pub struct CallCache {
    entries: HashMap<String, CacheEntry>,
}

impl CallCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CacheEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(name)
    }

    pub fn lookup(&self, name: &str) -> Option<EntryPoint> {
        self.entries.get(name).map(|e| e.entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(
        &mut self,
        name: &str,
        entry: EntryPoint,
        handle: Option<ModuleHandle>,
        path: Option<&Path>,
        no_phys_cancel: bool,
    ) {
        self.entries.insert(
            name.to_string(),
            CacheEntry {
                name: name.to_string(),
                entry,
                module: None,
                handle,
                path: path.map(canonical_path),
                no_phys_cancel,
            },
        );
    }

    /// Attaches `module` to the entry named after it. Programs that were
    /// never resolved (statically linked or embedded) get a fresh entry
    /// without a handle that is never physically unloaded.
    pub fn register_module(&mut self, module: &ModuleRef) {
        let mut program = module.borrow_mut();

        if let Some(existing) = self.entries.get_mut(&program.name) {
            existing.module = Some(Rc::downgrade(module));
            if program.path.is_none() {
                program.path = existing.path.clone();
            }
            return;
        }

        let Some(entry) = program.entry else {
            return;
        };
        self.entries.insert(
            program.name.clone(),
            CacheEntry {
                name: program.name.clone(),
                entry,
                module: Some(Rc::downgrade(module)),
                handle: None,
                path: None,
                no_phys_cancel: true,
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<CacheEntry> {
        self.entries.remove(name)
    }

    /// Names of all entries resolved from `handle`.
    pub fn names_with_handle(&self, handle: ModuleHandle) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.handle == Some(handle))
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
