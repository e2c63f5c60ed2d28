///
/// # Program Resolution
///
/// Turns a program name into an entry point. The search stops at the first
/// hit, in this order:
///
/// 1. the call cache, keyed by the bare name as written
/// 2. the main executable
/// 3. preloaded modules, in declaration order
/// 4. dynamically loaded modules that still hold a live handle
/// 5. the filesystem: the directory given in the name, or else each search
///    path directory until one contains `<name>.<ext>`
///
/// Hits from steps 2-4 are cached as never physically cancelable. A module
/// loaded in step 5 is tracked by canonical path and its entries may be
/// unloaded by `cancel`.
///
/// Every failure is recorded as the last resolution error.
///

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cache::canonical_path;
use crate::encoder::{CaseFold, encode_program_name, split_call_path};
use crate::errors::CallError;
use crate::loader::EntryPoint;
use crate::runtime::{CallRuntime, ContainedProgram, is_readable};

impl CallRuntime {
    /// Resolves a program name that may carry an explicit directory.
    pub fn resolve(&mut self, name: &str) -> Result<EntryPoint, CallError> {
        self.resolve_program(name, CaseFold::None)
    }

    /// Like `resolve`, folding the encoded entry point name.
    pub fn resolve_program(&mut self, name: &str, fold: CaseFold) -> Result<EntryPoint, CallError> {
        let (dir, bare) = split_call_path(name);
        self.resolve_recorded(bare, dir.as_deref(), fold)
    }

    /// Resolves a user-defined function. Function names never carry a
    /// directory, so separators are encoded like any other character.
    pub fn resolve_function(&mut self, name: &str) -> Result<EntryPoint, CallError> {
        self.resolve_recorded(name, None, CaseFold::None)
    }

    /// Resolves a program whose name is held in a field, checking the system
    /// routines and then `contained` before the normal search.
    pub fn resolve_field(
        &mut self,
        text: &str,
        contained: &[ContainedProgram],
        fold: CaseFold,
    ) -> Result<EntryPoint, CallError> {
        let name = trim_leading_spaces(text);
        let (dir, bare) = split_call_path(name);

        if let Some(entry) = self.system_routines.get(bare) {
            return Ok(*entry);
        }
        if let Some(program) = contained.iter().find(|p| p.name == bare) {
            return Ok(program.entry);
        }

        self.resolve_recorded(bare, dir.as_deref(), fold)
    }

    fn resolve_recorded(
        &mut self,
        name: &str,
        dir: Option<&str>,
        fold: CaseFold,
    ) -> Result<EntryPoint, CallError> {
        match self.resolve_internal(name, dir, fold) {
            Ok(entry) => {
                self.last_error = None;
                Ok(entry)
            }
            Err(e) => {
                debug!(program = name, error = %e, "resolution failed");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn resolve_internal(
        &mut self,
        name: &str,
        dir: Option<&str>,
        fold: CaseFold,
    ) -> Result<EntryPoint, CallError> {
        if name.is_empty() {
            return Err(CallError::InvalidArgument("empty program name".to_string()));
        }

        if let Some(entry) = self.cache.lookup(name) {
            debug!(program = name, "call cache hit");
            return Ok(entry);
        }

        let symbol = encode_program_name(name, fold);
        if let Some(entry) = self.search_loaded(name, &symbol) {
            return Ok(entry);
        }

        let base = self.settings.load_case.apply(name);
        let file_name = format!("{}.{}", base, self.settings.module_extension);

        if let Some(dir) = dir {
            let path = PathBuf::from(format!("{}{}", dir, file_name));
            if !is_readable(&path) {
                return Err(CallError::ProgramNotFound {
                    name: name.to_string(),
                });
            }
            return self.load_from(name, &path, &symbol, &base);
        }

        let candidates: Vec<PathBuf> = self.search_path.candidates(&file_name).collect();
        match candidates.iter().find(|c| is_readable(c)) {
            Some(path) => self.load_from(name, path, &symbol, &base),
            None => Err(CallError::ProgramNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Looks `symbol` up in the modules that are already open.
    fn search_loaded(&mut self, name: &str, symbol: &str) -> Option<EntryPoint> {
        if let Some(main) = self.main_handle {
            if let Some(entry) = self.loader.symbol(main, symbol) {
                debug!(program = name, symbol, "found in main executable");
                self.cache.insert(name, entry, Some(main), None, true);
                return Some(entry);
            }
        }

        let loaded = self
            .modules
            .preloaded()
            .chain(self.modules.live_dynamic())
            .find_map(|(path, handle)| {
                self.loader
                    .symbol(handle, symbol)
                    .map(|entry| (PathBuf::from(path), handle, entry))
            });

        let (path, handle, entry) = loaded?;
        debug!(program = name, symbol, path = %path.display(), "found in loaded module");
        self.cache.insert(name, entry, Some(handle), Some(&path), true);
        Some(entry)
    }

    /// Opens the module at `path`, or reuses the live handle already
    /// tracked for it, and looks the entry point up there. The search does
    /// not continue past this module.
    fn load_from(
        &mut self,
        name: &str,
        path: &Path,
        symbol: &str,
        base: &str,
    ) -> Result<EntryPoint, CallError> {
        let key = canonical_path(path).to_string_lossy().into_owned();

        let handle = match self.modules.dynamic_handle(&key) {
            Some(handle) => handle,
            None => match self.loader.open(path) {
                Ok(handle) => {
                    self.modules.record_dynamic(&key, handle);
                    handle
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "module could not be opened");
                    return Err(CallError::EntryPointNotFound {
                        entry: base.to_string(),
                    });
                }
            },
        };

        match self.loader.symbol(handle, symbol) {
            Some(entry) => {
                debug!(program = name, symbol, path = %key, "loaded module");
                self.cache.insert(name, entry, Some(handle), Some(path), false);
                Ok(entry)
            }
            None => Err(CallError::EntryPointNotFound {
                entry: base.to_string(),
            }),
        }
    }
}

fn trim_leading_spaces(text: &str) -> &str {
    let trimmed = text.trim_start_matches(' ');
    if trimmed.len() != text.len() {
        warn!(name = text, "program name includes leading spaces which are omitted");
    }
    trimmed.trim_end_matches(' ')
}
