///
/// # Cancel and Unload
///
/// Cancelling a program runs its shutdown hook and detaches the module
/// descriptor from the cache entry. The module is physically unloaded only
/// when all of these hold:
///
/// - the program is not executing and nothing holds a reference to it
/// - physical cancel is enabled in the settings and on the runtime
/// - neither the entry nor the module forbids unloading
/// - the entry owns a module handle
///
/// Unloading closes the handle, clears it from every dynamic module record
/// and evicts every cache entry resolved from it, so the next resolution
/// of any of those names searches the filesystem again.
///
/// Shutdown hooks run while the runtime is borrowed and must not call back
/// into it.
///

use std::ptr;

use tracing::debug;

use crate::cache::{CANCEL_SIGNAL, CancelHook};
use crate::encoder::base_name;
use crate::loader::ModuleHandle;
use crate::runtime::{CallRuntime, ContainedProgram};

fn run_cancel_hook(hook: CancelHook) {
    // SAFETY: a registered hook follows the shutdown calling convention and
    // accepts null arguments together with the cancel signal.
    unsafe {
        hook(
            CANCEL_SIGNAL,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
        );
    }
}

impl CallRuntime {
    /// Cancels the program `name`. Unknown names, and programs without a
    /// registered shutdown hook, are left alone.
    pub fn cancel(&mut self, name: &str) {
        let name = base_name(name);
        let Some(entry) = self.cache.get_mut(name) else {
            return;
        };
        let Some(module) = entry.module() else {
            return;
        };

        let (hook, busy, module_pinned) = {
            let program = module.borrow();
            (
                program.cancel,
                program.active > 0 || program.ref_count > 0,
                program.no_physical_cancel,
            )
        };
        let Some(hook) = hook else {
            return;
        };

        run_cancel_hook(hook);
        entry.module = None;
        debug!(program = name, "cancelled");

        if busy || module_pinned || entry.no_phys_cancel {
            return;
        }
        let Some(handle) = entry.handle else {
            return;
        };
        if !self.physical_cancel_enabled() {
            return;
        }

        self.unload(handle);
    }

    /// Cancels the program named in a field. Contained programs are
    /// cancelled through their own hook without touching the cache.
    pub fn cancel_field(&mut self, text: &str, contained: &[ContainedProgram]) {
        let text = text.trim_matches(' ');
        if text.is_empty() {
            return;
        }
        let name = base_name(text);

        if let Some(program) = contained.iter().find(|p| p.name == name) {
            if let Some(hook) = program.cancel {
                run_cancel_hook(hook);
            }
            return;
        }

        self.cancel(name);
    }

    fn unload(&mut self, handle: ModuleHandle) {
        self.loader.close(handle);
        let records = self.modules.forget_handle(handle);

        let names = self.cache.names_with_handle(handle);
        for name in &names {
            self.cache.remove(name);
        }
        debug!(
            handle = handle.0,
            records,
            entries = names.len(),
            "module unloaded"
        );
    }
}
