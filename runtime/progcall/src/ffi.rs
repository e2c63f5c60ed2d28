//!
//! C ABI surface of the call runtime.
//!
//! Generated programs reach the runtime through these `progcall_*`
//! functions. The runtime lives in a per-thread slot filled by
//! `progcall_init` (or [`install`]) and emptied by `progcall_exit`.
//!
//! Failure handling follows three rules:
//!
//! - misuse (no runtime, null required pointers, bad argument counts) is
//!   reported and terminates the process with status 1
//! - a program that cannot be resolved makes `progcall_resolve` return null
//!   with the message available from `progcall_resolve_error`, while
//!   `progcall_call` treats it as fatal (an empty name is misuse everywhere)
//! - marshalling violations are warnings: getters return `-1` (`0` for
//!   unsigned values, null for pointers) and puts do nothing
//!
//! A program started by `progcall_call` runs after the slot is released,
//! so it may use the marshalling functions. Its parameters start out
//! undescribed: the callee publishes descriptors for them with
//! `progcall_bind_params`, or the caller passes them with
//! `progcall_call_fields`. The caller's parameters are restored when the
//! call returns. Shutdown hooks run while the slot is held and must not
//! call back in.
//!

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::path::Path;
use std::ptr;

use tracing::{debug, error, warn};

use progcall_field::{Field, FieldAttr, FieldType};

use crate::errors::CallError;
use crate::invoke::{MAX_CALL_PARAMS, PreparedCall};
use crate::loader::DlLoader;
use crate::runtime::{CallRuntime, DEFAULT_RESOLVE_ERROR};
use crate::settings::Settings;

thread_local! {
    static RUNTIME: RefCell<Option<CallRuntime>> = const { RefCell::new(None) };
    static RESOLVE_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

/// Makes `runtime` the runtime of the current thread, returning the one it
/// replaces.
pub fn install(runtime: CallRuntime) -> Option<CallRuntime> {
    RUNTIME.with(|slot| slot.borrow_mut().replace(runtime))
}

/// Removes the runtime of the current thread without tearing it down.
pub fn uninstall() -> Option<CallRuntime> {
    RUNTIME.with(|slot| slot.borrow_mut().take())
}

pub fn is_installed() -> bool {
    RUNTIME.with(|slot| slot.try_borrow().map(|rt| rt.is_some()).unwrap_or(true))
}

/// Runs `f` on the installed runtime.
pub fn with_runtime<R>(f: impl FnOnce(&mut CallRuntime) -> R) -> Result<R, CallError> {
    RUNTIME.with(|slot| {
        let mut guard = slot
            .try_borrow_mut()
            .map_err(|_| CallError::InvalidArgument("runtime re-entered while busy".to_string()))?;
        let runtime = guard.as_mut().ok_or(CallError::NotInitialized)?;
        Ok(f(runtime))
    })
}

/// Resolves and calls `name` on the installed runtime. The runtime is
/// released before the program starts.
///
/// # Safety
///
/// See [`CallRuntime::call`].
pub unsafe fn call_installed(name: &str, argv: &[*mut c_void]) -> Result<c_int, CallError> {
    let prepared = with_runtime(|rt| rt.prepare_call(name, argv))??;
    unsafe { run_prepared(prepared) }
}

/// Calls `name` on the installed runtime with `fields` as its parameters.
///
/// # Safety
///
/// See [`CallRuntime::call_fields`].
pub unsafe fn call_fields_installed(name: &str, fields: &[Field]) -> Result<c_int, CallError> {
    let prepared = with_runtime(|rt| rt.prepare_call_fields(name, fields))??;
    unsafe { run_prepared(prepared) }
}

/// # Safety
///
/// See [`PreparedCall::invoke`].
unsafe fn run_prepared(prepared: PreparedCall) -> Result<c_int, CallError> {
    let result = unsafe { prepared.invoke() };
    if let Err(e) = with_runtime(|rt| rt.finish_call(prepared)) {
        debug!("caller parameters not restored: {}", e);
    }
    result
}

fn fatal(op: &str, err: &CallError) -> ! {
    error!(op, "{}", err);
    std::process::exit(1);
}

fn runtime_or_fatal<R>(op: &str, f: impl FnOnce(&mut CallRuntime) -> R) -> R {
    match with_runtime(f) {
        Ok(value) => value,
        Err(e) => fatal(op, &e),
    }
}

fn marshal<R>(op: &str, fallback: R, f: impl FnOnce(&CallRuntime) -> Result<R, CallError>) -> R {
    RUNTIME.with(|slot| {
        let Ok(guard) = slot.try_borrow() else {
            warn!(op, "runtime is busy");
            return fallback;
        };
        match guard.as_ref() {
            Some(runtime) => f(runtime).unwrap_or(fallback),
            None => {
                warn!(op, "runtime is not initialized");
                fallback
            }
        }
    })
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn name_arg<'a>(op: &str, ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        fatal(op, &CallError::InvalidArgument(format!("NULL parameter passed to '{}'", op)));
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    let name = unsafe { CStr::from_ptr(ptr) };
    match name.to_str() {
        Ok(name) => name,
        Err(_) => fatal(op, &CallError::InvalidArgument("program name is not UTF-8".to_string())),
    }
}

fn param_index(n: c_int) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn metadata(op: &str, n: c_int, f: impl FnOnce(&CallRuntime, usize) -> Result<c_int, CallError>) -> c_int {
    marshal(op, -1, |rt| f(rt, param_index(n)))
}

/// Starts the runtime for the current thread. Settings are read from the
/// TOML file at `config` when it is not null, then from `PROGCALL_*`
/// environment variables. Returns 0 on success, -1 when the settings are
/// invalid. Calling it again while a runtime is installed does nothing.
///
/// # Safety
///
/// `config` must be null or point to a NUL-terminated path.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_init(config: *const c_char) -> c_int {
    if is_installed() {
        return 0;
    }

    let base = if config.is_null() {
        Ok(Settings::default())
    } else {
        // SAFETY: non-null and NUL-terminated per the caller contract.
        let path = unsafe { CStr::from_ptr(config) }.to_string_lossy().into_owned();
        Settings::from_file(Path::new(&path))
    };
    let settings = base.and_then(|s| s.with_overrides(|key| std::env::var(key).ok()));

    match settings {
        Ok(settings) => {
            install(CallRuntime::init(settings, DlLoader::new()));
            0
        }
        Err(e) => {
            error!(op = "progcall_init", "{}", e);
            -1
        }
    }
}

/// Tears the runtime of the current thread down.
#[unsafe(no_mangle)]
pub extern "C" fn progcall_exit() {
    if let Some(runtime) = uninstall() {
        runtime.teardown();
    }
}

/// Returns the entry point of `name`, or null when it cannot be found.
///
/// # Safety
///
/// `name` must point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_resolve(name: *const c_char) -> *mut c_void {
    let name = unsafe { name_arg("progcall_resolve", name) };
    match runtime_or_fatal("progcall_resolve", |rt| rt.resolve(name)) {
        Ok(entry) => entry.as_ptr() as *mut c_void,
        Err(e) if e.is_fatal() => fatal("progcall_resolve", &e),
        Err(_) => ptr::null_mut(),
    }
}

/// Message of the last failed resolution, cleared by reading it. The
/// pointer stays valid until the next call on this thread.
#[unsafe(no_mangle)]
pub extern "C" fn progcall_resolve_error() -> *const c_char {
    let message = with_runtime(|rt| rt.take_resolve_error())
        .unwrap_or_else(|_| DEFAULT_RESOLVE_ERROR.to_string());
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();

    RESOLVE_ERROR.with(|slot| {
        let mut slot = slot.borrow_mut();
        *slot = message;
        slot.as_ptr()
    })
}

/// # Safety
///
/// `argv` must point to `argc` arguments valid for the program called.
unsafe fn call_args<'a>(op: &str, argc: c_int, argv: *const *mut c_void) -> &'a [*mut c_void] {
    let count = match usize::try_from(argc) {
        Ok(count) if count <= MAX_CALL_PARAMS => count,
        _ => fatal(op, &CallError::InvalidArgument(format!("invalid number of arguments passed to '{}'", op))),
    };
    if count == 0 {
        return &[];
    }
    if argv.is_null() {
        fatal(op, &CallError::InvalidArgument(format!("NULL parameter passed to '{}'", op)));
    }
    // SAFETY: argv holds argc entries per the caller contract.
    unsafe { std::slice::from_raw_parts(argv, count) }
}

/// Resolves and calls `name`. A program that cannot be resolved is fatal.
///
/// # Safety
///
/// `name` must point to a NUL-terminated string and `argv` to `argc`
/// arguments the program accepts.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_call(name: *const c_char, argc: c_int, argv: *const *mut c_void) -> c_int {
    let name = unsafe { name_arg("progcall_call", name) };
    let argv = unsafe { call_args("progcall_call", argc, argv) };

    match unsafe { call_installed(name, argv) } {
        Ok(rc) => rc,
        Err(e) => fatal("progcall_call", &e),
    }
}

/// Parameter descriptor as laid out by generated code.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProgcallField {
    pub data: *mut c_void,
    pub size: usize,
    /// One of the `FieldType` codes.
    pub type_code: c_int,
    pub digits: c_int,
    pub scale: c_int,
    /// `PROGCALL_FIELD_*` bits.
    pub flags: c_int,
}

pub const PROGCALL_FIELD_SIGNED: c_int = 0x01;
pub const PROGCALL_FIELD_CONSTANT: c_int = 0x02;
pub const PROGCALL_FIELD_BINARY_SWAP: c_int = 0x04;
pub const PROGCALL_FIELD_REAL_BINARY: c_int = 0x08;

impl ProgcallField {
    /// The field this descriptor stands for; a null `data` is an omitted
    /// parameter.
    ///
    /// # Safety
    ///
    /// `data` must be null or satisfy [`Field::from_raw`] for `size` bytes.
    pub unsafe fn to_field(&self) -> Result<Option<Field>, CallError> {
        let kind = FieldType::from_code(self.type_code).ok_or_else(|| {
            CallError::InvalidArgument(format!("unknown field type code {:#x}", self.type_code))
        })?;
        let mut attr = FieldAttr::new(kind, u32::try_from(self.digits).unwrap_or(0), self.scale);
        if self.flags & PROGCALL_FIELD_SIGNED != 0 {
            attr = attr.signed();
        }
        if self.flags & PROGCALL_FIELD_CONSTANT != 0 {
            attr = attr.constant();
        }
        if self.flags & PROGCALL_FIELD_BINARY_SWAP != 0 {
            attr = attr.swapped();
        }
        if self.flags & PROGCALL_FIELD_REAL_BINARY != 0 {
            attr = attr.real_binary();
        }
        // SAFETY: forwarded from the caller contract.
        Ok(unsafe { Field::from_raw(self.data.cast::<u8>(), self.size, attr) })
    }
}

/// # Safety
///
/// `fields` must point to `argc` descriptors, each valid per
/// [`ProgcallField::to_field`].
unsafe fn field_args(op: &str, argc: c_int, fields: *const ProgcallField) -> Vec<Option<Field>> {
    let count = match usize::try_from(argc) {
        Ok(count) if count <= MAX_CALL_PARAMS => count,
        _ => fatal(op, &CallError::InvalidArgument(format!("invalid number of arguments passed to '{}'", op))),
    };
    if count == 0 {
        return Vec::new();
    }
    if fields.is_null() {
        fatal(op, &CallError::InvalidArgument(format!("NULL parameter passed to '{}'", op)));
    }
    // SAFETY: fields holds argc entries per the caller contract.
    let descriptors = unsafe { std::slice::from_raw_parts(fields, count) };
    descriptors
        .iter()
        .map(|d| match unsafe { d.to_field() } {
            Ok(field) => field,
            Err(e) => fatal(op, &e),
        })
        .collect()
}

/// Publishes the descriptors of the running program's parameters so the
/// marshalling functions can interpret them. The parameter count announced
/// by the caller is kept. Returns 0, or -1 when there is no runtime.
///
/// # Safety
///
/// `fields` must point to `argc` descriptors whose storage stays valid
/// until the program returns.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_bind_params(argc: c_int, fields: *const ProgcallField) -> c_int {
    let fields = unsafe { field_args("progcall_bind_params", argc, fields) };
    match with_runtime(|rt| rt.bind_params(fields)) {
        Ok(()) => 0,
        Err(e) => {
            warn!(op = "progcall_bind_params", "{}", e);
            -1
        }
    }
}

/// Resolves and calls `name`, passing the storage of each descriptor and
/// binding the descriptors as the callee's parameters.
///
/// # Safety
///
/// `name` must point to a NUL-terminated string and `fields` to `argc`
/// descriptors whose storage the program accepts.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_call_fields(name: *const c_char, argc: c_int, fields: *const ProgcallField) -> c_int {
    let name = unsafe { name_arg("progcall_call_fields", name) };
    let fields = unsafe { field_args("progcall_call_fields", argc, fields) };
    if fields.iter().any(Option::is_none) {
        fatal(
            "progcall_call_fields",
            &CallError::InvalidArgument("NULL field storage passed to 'progcall_call_fields'".to_string()),
        );
    }
    let fields: Vec<Field> = fields.into_iter().flatten().collect();

    match unsafe { call_fields_installed(name, &fields) } {
        Ok(rc) => rc,
        Err(e) => fatal("progcall_call_fields", &e),
    }
}

/// Calls `name` once, then cancels it.
///
/// # Safety
///
/// Same contract as [`progcall_call`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_func(name: *const c_char, argc: c_int, argv: *const *mut c_void) -> c_int {
    let rc = unsafe { progcall_call(name, argc, argv) };
    let name = unsafe { name_arg("progcall_func", name) };
    runtime_or_fatal("progcall_func", |rt| rt.cancel(name));
    rc
}

/// # Safety
///
/// `name` must point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_cancel(name: *const c_char) {
    let name = unsafe { name_arg("progcall_cancel", name) };
    runtime_or_fatal("progcall_cancel", |rt| rt.cancel(name));
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_num_params() -> c_int {
    marshal("progcall_get_num_params", -1, |rt| {
        rt.num_params().map(|n| c_int::try_from(n).unwrap_or(c_int::MAX))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_param_type(n: c_int) -> c_int {
    metadata("progcall_get_param_type", n, |rt, n| {
        rt.param_type(n).map(|t| t.code())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_param_size(n: c_int) -> c_int {
    metadata("progcall_get_param_size", n, |rt, n| {
        rt.param_size(n).map(|s| c_int::try_from(s).unwrap_or(c_int::MAX))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_param_sign(n: c_int) -> c_int {
    metadata("progcall_get_param_sign", n, |rt, n| rt.param_sign(n).map(c_int::from))
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_param_scale(n: c_int) -> c_int {
    metadata("progcall_get_param_scale", n, |rt, n| rt.param_scale(n))
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_param_digits(n: c_int) -> c_int {
    metadata("progcall_get_param_digits", n, |rt, n| {
        rt.param_digits(n).map(|d| c_int::try_from(d).unwrap_or(c_int::MAX))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_param_constant(n: c_int) -> c_int {
    metadata("progcall_get_param_constant", n, |rt, n| rt.param_constant(n).map(c_int::from))
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_param_data(n: c_int) -> *mut c_void {
    marshal("progcall_get_param_data", ptr::null_mut(), |rt| {
        rt.param_data(param_index(n)).map(|p| p.cast::<c_void>())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_s64_param(n: c_int) -> i64 {
    marshal("progcall_get_s64_param", -1, |rt| rt.get_s64_param(param_index(n)))
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_get_u64_param(n: c_int) -> u64 {
    marshal("progcall_get_u64_param", 0, |rt| rt.get_u64_param(param_index(n)))
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_put_s64_param(n: c_int, val: i64) {
    marshal("progcall_put_s64_param", (), |rt| rt.put_s64_param(param_index(n), val));
}

#[unsafe(no_mangle)]
pub extern "C" fn progcall_put_u64_param(n: c_int, val: u64) {
    marshal("progcall_put_u64_param", (), |rt| rt.put_u64_param(param_index(n), val));
}

/// Allocates `len` bytes with `malloc`; the caller releases them with `free`.
fn c_alloc(len: usize) -> *mut u8 {
    // SAFETY: malloc has no preconditions; a null result is passed through.
    unsafe { libc::malloc(len.max(1)).cast::<u8>() }
}

/// Copies parameter `n` as a NUL-terminated string, trailing spaces
/// removed, into `buf` (at most `len` bytes including the terminator). With
/// a null `buf` the string is returned in storage from `malloc`.
///
/// # Safety
///
/// `buf` must be null or valid for writes of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_get_picx_param(n: c_int, buf: *mut c_void, len: c_int) -> *mut c_void {
    let Some(text) = marshal("progcall_get_picx_param", None, |rt| {
        rt.get_text_param(param_index(n)).map(Some)
    }) else {
        return ptr::null_mut();
    };
    let bytes = text.as_bytes();

    let (dest, capacity) = if buf.is_null() {
        (c_alloc(bytes.len() + 1), bytes.len() + 1)
    } else {
        (buf.cast::<u8>(), usize::try_from(len).unwrap_or(0))
    };
    if dest.is_null() || capacity == 0 {
        return ptr::null_mut();
    }

    let copied = bytes.len().min(capacity - 1);
    // SAFETY: dest is valid for `capacity` bytes and copied < capacity.
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), dest, copied);
        *dest.add(copied) = 0;
    }
    dest.cast::<c_void>()
}

/// Stores a NUL-terminated string into parameter `n`, space padded.
///
/// # Safety
///
/// `text` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_put_picx_param(n: c_int, text: *const c_char) {
    if text.is_null() {
        return;
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    let text = unsafe { CStr::from_ptr(text) }.to_bytes();
    marshal("progcall_put_picx_param", (), |rt| rt.put_text_param(param_index(n), text));
}

/// Copies the raw bytes of parameter `n` into `buf`, at most `len` bytes
/// (the whole field when `len <= 0`). With a null `buf` a copy is made in
/// storage from `malloc` of at least the field size.
///
/// # Safety
///
/// `buf` must be null or valid for writes of `len` bytes, or of the field
/// size when `len <= 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_get_grp_param(n: c_int, buf: *mut c_void, len: c_int) -> *mut c_void {
    let Some(data) = marshal("progcall_get_grp_param", None, |rt| {
        rt.get_group_param(param_index(n)).map(Some)
    }) else {
        return ptr::null_mut();
    };

    let requested = usize::try_from(len).ok().filter(|l| *l > 0).unwrap_or(data.len());
    let (dest, capacity) = if buf.is_null() {
        let capacity = requested.max(data.len());
        (c_alloc(capacity), capacity)
    } else {
        (buf.cast::<u8>(), requested)
    };
    if dest.is_null() {
        return ptr::null_mut();
    }

    // SAFETY: dest is valid for `capacity` bytes.
    let dest_slice = unsafe { std::slice::from_raw_parts_mut(dest, capacity) };
    let copied = data.len().min(capacity);
    dest_slice[..copied].copy_from_slice(&data[..copied]);
    dest.cast::<c_void>()
}

/// Overwrites parameter `n` with `len` bytes from `buf`, never past the
/// field size (the whole field when `len <= 0`).
///
/// # Safety
///
/// `buf` must be null or valid for reads of `len` bytes, or of the field
/// size when `len <= 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn progcall_put_grp_param(n: c_int, buf: *const c_void, len: c_int) {
    if buf.is_null() {
        return;
    }
    let index = param_index(n);
    marshal("progcall_put_grp_param", (), |rt| {
        let size = rt.param_size(index)?;
        let count = usize::try_from(len).ok().filter(|l| *l > 0 && *l <= size).unwrap_or(size);
        // SAFETY: buf is valid for `count` bytes per the caller contract.
        let src = unsafe { std::slice::from_raw_parts(buf.cast::<u8>(), count) };
        rt.put_group_param(index, src).map(|_| ())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{EntryPoint, Loader, ModuleHandle};

    struct NoModules;

    impl Loader for NoModules {
        fn open(&mut self, path: &Path) -> Result<ModuleHandle, CallError> {
            Err(CallError::LoadFailed {
                path: path.to_path_buf(),
                reason: "no modules".to_string(),
            })
        }

        fn open_main(&mut self) -> Option<ModuleHandle> {
            None
        }

        fn symbol(&self, _handle: ModuleHandle, _name: &str) -> Option<EntryPoint> {
            None
        }

        fn close(&mut self, _handle: ModuleHandle) {}
    }

    fn with_installed<R>(f: impl FnOnce() -> R) -> R {
        install(CallRuntime::init(Settings::default(), NoModules));
        let result = f();
        uninstall();
        result
    }

    #[test]
    fn test_marshalling_without_runtime_yields_sentinels() {
        uninstall();
        assert_eq!(progcall_get_num_params(), -1);
        assert_eq!(progcall_get_param_size(1), -1);
        assert_eq!(progcall_get_u64_param(1), 0);
        assert!(progcall_get_param_data(1).is_null());
    }

    #[test]
    fn test_resolve_error_default_message() {
        with_installed(|| {
            let msg = unsafe { CStr::from_ptr(progcall_resolve_error()) };
            assert_eq!(msg.to_str().unwrap(), DEFAULT_RESOLVE_ERROR);
        });
    }

    #[test]
    fn test_resolve_missing_returns_null_and_error() {
        with_installed(|| {
            let name = CString::new("NOSUCHPROG").unwrap();
            let entry = unsafe { progcall_resolve(name.as_ptr()) };
            assert!(entry.is_null());

            let msg = unsafe { CStr::from_ptr(progcall_resolve_error()) };
            assert_eq!(msg.to_str().unwrap(), "module 'NOSUCHPROG' not found");

            let again = unsafe { CStr::from_ptr(progcall_resolve_error()) };
            assert_eq!(again.to_str().unwrap(), DEFAULT_RESOLVE_ERROR);
        });
    }

    #[test]
    fn test_param_accessors_through_c_surface() {
        let mut num = *b"00042";
        let mut text = *b"HELLO     ";
        with_installed(|| {
            let fields = unsafe {
                vec![
                    Some(Field::from_slice(&mut num, FieldAttr::new(FieldType::Display, 5, 0))),
                    Some(Field::from_slice(&mut text, FieldAttr::text())),
                ]
            };
            with_runtime(|rt| rt.bind_params(fields)).unwrap();

            assert_eq!(progcall_get_num_params(), 2);
            assert_eq!(progcall_get_param_type(1), FieldType::Display.code());
            assert_eq!(progcall_get_s64_param(1), 42);
            assert_eq!(progcall_get_s64_param(3), -1);
            assert_eq!(progcall_get_param_size(0), -1);

            progcall_put_s64_param(1, 7);
            assert_eq!(progcall_get_s64_param(1), 7);

            let mut out = [0u8; 4];
            let ptr = unsafe { progcall_get_picx_param(2, out.as_mut_ptr().cast(), 4) };
            assert_eq!(ptr, out.as_mut_ptr().cast());
            assert_eq!(&out, b"HEL\0");

            let owned = unsafe { progcall_get_picx_param(2, ptr::null_mut(), 0) };
            let owned_text = unsafe { CStr::from_ptr(owned as *const c_char) };
            assert_eq!(owned_text.to_str().unwrap(), "HELLO");
            unsafe { libc::free(owned) };

            let hi = CString::new("HI").unwrap();
            unsafe { progcall_put_picx_param(2, hi.as_ptr()) };
        });
        assert_eq!(&num, b"00007");
        assert_eq!(&text, b"HI        ");
    }

    #[test]
    fn test_group_copy_through_c_surface() {
        let mut group = *b"ABCDEF";
        with_installed(|| {
            let field = unsafe { Field::from_slice(&mut group, FieldAttr::new(FieldType::Group, 0, 0)) };
            with_runtime(|rt| rt.bind_params(vec![Some(field)])).unwrap();

            let copy = unsafe { progcall_get_grp_param(1, ptr::null_mut(), 0) };
            let copied = unsafe { std::slice::from_raw_parts(copy as *const u8, 6) };
            assert_eq!(copied, b"ABCDEF");
            unsafe { libc::free(copy) };

            let src = *b"xyz";
            unsafe { progcall_put_grp_param(1, src.as_ptr().cast(), 3) };
        });
        assert_eq!(&group, b"xyzDEF");
    }

    #[test]
    fn test_field_descriptor_decoding() {
        let mut data = *b"0012";
        let desc = ProgcallField {
            data: data.as_mut_ptr().cast(),
            size: data.len(),
            type_code: FieldType::Display.code(),
            digits: 4,
            scale: 1,
            flags: PROGCALL_FIELD_SIGNED | PROGCALL_FIELD_CONSTANT,
        };
        let field = unsafe { desc.to_field() }.unwrap().unwrap();
        assert_eq!(field.kind(), FieldType::Display);
        assert_eq!(field.attr().scale, 1);
        assert!(field.attr().signed);
        assert!(field.is_constant());
        assert!(!field.attr().binary_swap);

        let omitted = ProgcallField {
            data: ptr::null_mut(),
            ..desc
        };
        assert!(unsafe { omitted.to_field() }.unwrap().is_none());

        let unknown = ProgcallField { type_code: 0x7F, ..desc };
        assert!(matches!(unsafe { unknown.to_field() }, Err(CallError::InvalidArgument(_))));
    }

    #[test]
    fn test_bind_params_without_runtime_fails_softly() {
        uninstall();
        assert_eq!(unsafe { progcall_bind_params(0, ptr::null()) }, -1);
    }
}
