///
/// progcall Runtime Library
///
/// Dynamic program invocation for compiled programs: a program name is
/// resolved at run time to an entry point in the running executable, a
/// preloaded library, or a shared module found on the library path. The
/// resolution is cached, invoked with positional arguments, and can later be
/// cancelled and unloaded.
///
/// Built as both an rlib and a static library (libprogcall.a) exporting the
/// `progcall_*` C functions used by generated code.
///
/// Contains:
/// - Name encoding and search path handling (encoder, search_path)
/// - The loader capability and its libloading implementation (loader)
/// - Module tracking and the call cache (modules, cache)
/// - Resolution, invocation and cancellation (resolver, invoke, lifecycle)
/// - Parameter marshalling (params)
/// - The C ABI surface (ffi)
///
/// A `CallRuntime` is single-threaded. Threads that need dynamic calls each
/// create their own.
///

pub mod cache;
pub mod encoder;
pub mod errors;
pub mod ffi;
pub mod invoke;
mod lifecycle;
pub mod loader;
pub mod modules;
pub mod params;
mod resolver;
pub mod runtime;
pub mod search_path;
pub mod settings;

pub use cache::{CANCEL_SIGNAL, CacheEntry, CallCache, CancelHook, ModuleRef, ProgramModule};
pub use encoder::{CaseFold, encode_program_name};
pub use errors::CallError;
pub use invoke::{MAX_CALL_PARAMS, PreparedCall};
pub use loader::{DlLoader, EntryPoint, Loader, ModuleHandle};
pub use modules::ModuleTracker;
pub use params::ParamFrame;
pub use runtime::{CallRuntime, ContainedProgram, DEFAULT_RESOLVE_ERROR};
pub use search_path::SearchPath;
pub use settings::{NameConvert, Settings};

pub use progcall_field::{Field, FieldAttr, FieldType};
