///
/// # Module Tracker
///
/// Keeps the two collections of loaded modules, each keyed by canonical
/// path and kept in load order:
///
/// - **preload**: opened once at startup, searched before any dynamic
///   module, closed only at teardown
/// - **dynamic**: opened on demand by the resolver. A record survives a
///   physical cancel with its handle cleared, so a later reload of the same
///   path reuses the slot and keeps its search position
///

use indexmap::IndexMap;

use crate::loader::ModuleHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord<'a> {
    pub path: &'a str,
    pub handle: Option<ModuleHandle>,
}

#[derive(Debug, Default)]
pub struct ModuleTracker {
    preload: IndexMap<String, ModuleHandle>,
    dynamic: IndexMap<String, Option<ModuleHandle>>,
}

impl ModuleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_preloaded(&self, path: &str) -> bool {
        self.preload.contains_key(path)
    }

    /// Records a preloaded module. Returns `false` if the path is already
    /// tracked, in which case `handle` is not stored.
    pub fn add_preload(&mut self, path: String, handle: ModuleHandle) -> bool {
        if self.preload.contains_key(&path) {
            return false;
        }
        self.preload.insert(path, handle);
        true
    }

    /// Preloaded modules in declaration order.
    pub fn preloaded(&self) -> impl Iterator<Item = (&str, ModuleHandle)> {
        self.preload.iter().map(|(path, handle)| (path.as_str(), *handle))
    }

    /// Dynamic modules that still hold a live handle, in load order.
    pub fn live_dynamic(&self) -> impl Iterator<Item = (&str, ModuleHandle)> {
        self.dynamic
            .iter()
            .filter_map(|(path, handle)| handle.map(|h| (path.as_str(), h)))
    }

    pub fn dynamic_records(&self) -> impl Iterator<Item = ModuleRecord<'_>> {
        self.dynamic.iter().map(|(path, handle)| ModuleRecord {
            path: path.as_str(),
            handle: *handle,
        })
    }

    pub fn dynamic_handle(&self, path: &str) -> Option<ModuleHandle> {
        self.dynamic.get(path).copied().flatten()
    }

    /// Stores `handle` for `path`, reusing an existing record for the path.
    pub fn record_dynamic(&mut self, path: &str, handle: ModuleHandle) {
        match self.dynamic.get_mut(path) {
            Some(slot) => *slot = Some(handle),
            None => {
                self.dynamic.insert(path.to_string(), Some(handle));
            }
        }
    }

    /// Clears `handle` from every dynamic record referencing it and returns
    /// how many records were affected.
    pub fn forget_handle(&mut self, handle: ModuleHandle) -> usize {
        let mut cleared = 0;
        for slot in self.dynamic.values_mut() {
            if *slot == Some(handle) {
                *slot = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Empties both collections and returns every distinct live handle,
    /// preloaded modules first.
    pub fn drain_handles(&mut self) -> Vec<ModuleHandle> {
        let mut handles: Vec<ModuleHandle> = Vec::new();
        let preload = self.preload.drain(..).map(|(_, h)| h);
        let dynamic = self.dynamic.drain(..).filter_map(|(_, h)| h);

        for handle in preload.chain(dynamic) {
            if !handles.contains(&handle) {
                handles.push(handle);
            }
        }
        handles
    }

    /// Paths of preloaded modules joined with `separator`.
    pub fn preload_string(&self, separator: char) -> String {
        let paths: Vec<&str> = self.preload.keys().map(String::as_str).collect();
        paths.join(&separator.to_string())
    }
}
