///
/// # Program Invocation
///
/// Programs are plain C functions taking one opaque pointer per parameter
/// and returning an `int`. A call is made through a function pointer of
/// exactly the argument count, up to `MAX_CALL_PARAMS`.
///
/// Calling is split in three steps: `prepare_call` resolves the program and
/// starts the callee's parameter frame while the runtime is borrowed,
/// `PreparedCall::invoke` performs the call without it, and `finish_call`
/// puts the caller's frame back. The C entry points rely on this so a
/// running program can use the marshalling API.
///

use std::ffi::{c_int, c_void};
use std::mem;

use smallvec::SmallVec;

use progcall_field::Field;

use crate::errors::CallError;
use crate::loader::EntryPoint;
use crate::params::ParamFrame;
use crate::runtime::CallRuntime;

/// Most arguments a single call may pass.
pub const MAX_CALL_PARAMS: usize = 16;

pub type ArgVec = SmallVec<[*mut c_void; MAX_CALL_PARAMS]>;

macro_rules! arg_type {
    ($i:literal) => { *mut c_void };
}

macro_rules! dispatch_by_arity {
    ($entry:expr, $argv:expr; $($n:literal => [$($i:literal),*]),* $(,)?) => {
        match $argv.len() {
            $(
                $n => {
                    // SAFETY: the caller guarantees the entry point takes
                    // exactly this many pointer arguments.
                    let program: unsafe extern "C" fn($(arg_type!($i)),*) -> c_int =
                        unsafe { mem::transmute::<*const c_void, _>($entry.as_ptr()) };
                    Ok(unsafe { program($($argv[$i]),*) })
                }
            )*
            argc => Err(CallError::InvalidArgument(format!(
                "invalid number of arguments: {} (at most {})",
                argc, MAX_CALL_PARAMS
            ))),
        }
    };
}

/// Calls `entry` with exactly `argv.len()` arguments.
///
/// # Safety
///
/// `entry` must be an `extern "C"` function taking `argv.len()` pointer
/// arguments and returning `c_int`, and every argument must be valid for
/// whatever the function does with it.
pub unsafe fn invoke_entry(entry: EntryPoint, argv: &[*mut c_void]) -> Result<c_int, CallError> {
    dispatch_by_arity!(entry, argv;
        0 => [],
        1 => [0],
        2 => [0, 1],
        3 => [0, 1, 2],
        4 => [0, 1, 2, 3],
        5 => [0, 1, 2, 3, 4],
        6 => [0, 1, 2, 3, 4, 5],
        7 => [0, 1, 2, 3, 4, 5, 6],
        8 => [0, 1, 2, 3, 4, 5, 6, 7],
        9 => [0, 1, 2, 3, 4, 5, 6, 7, 8],
        10 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
        11 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
        12 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        13 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
        14 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13],
        15 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14],
        16 => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    )
}

/// A resolved program together with its arguments. Holds the caller's
/// parameter frame until [`CallRuntime::finish_call`] restores it.
#[derive(Debug)]
pub struct PreparedCall {
    pub entry: EntryPoint,
    pub argv: ArgVec,
    caller_frame: Option<ParamFrame>,
}

impl PreparedCall {
    /// # Safety
    ///
    /// Same contract as [`invoke_entry`].
    pub unsafe fn invoke(&self) -> Result<c_int, CallError> {
        unsafe { invoke_entry(self.entry, &self.argv) }
    }
}

impl CallRuntime {
    /// Resolves `name` and starts a frame of `argv.len()` parameters with
    /// no descriptors for the call about to be made.
    pub fn prepare_call(&mut self, name: &str, argv: &[*mut c_void]) -> Result<PreparedCall, CallError> {
        self.prepare_with_frame(name, argv, ParamFrame::unbound(argv.len()))
    }

    /// Like [`CallRuntime::prepare_call`], with `fields` as the callee's
    /// parameters and their storage addresses as the arguments.
    pub fn prepare_call_fields(&mut self, name: &str, fields: &[Field]) -> Result<PreparedCall, CallError> {
        let argv: ArgVec = fields.iter().map(|f| f.data_ptr().cast::<c_void>()).collect();
        let frame = ParamFrame::new(fields.iter().copied().map(Some).collect());
        self.prepare_with_frame(name, &argv, frame)
    }

    fn prepare_with_frame(
        &mut self,
        name: &str,
        argv: &[*mut c_void],
        frame: ParamFrame,
    ) -> Result<PreparedCall, CallError> {
        if argv.len() > MAX_CALL_PARAMS {
            return Err(CallError::InvalidArgument(format!(
                "invalid number of arguments passed to '{}': {}",
                name,
                argv.len()
            )));
        }
        if name.is_empty() {
            return Err(CallError::InvalidArgument("empty program name".to_string()));
        }

        let entry = self.resolve(name)?;
        let caller_frame = self.frame.replace(frame);
        Ok(PreparedCall {
            entry,
            argv: SmallVec::from_slice(argv),
            caller_frame,
        })
    }

    /// Ends a prepared call, reinstating the caller's parameters.
    pub fn finish_call(&mut self, call: PreparedCall) {
        self.frame = call.caller_frame;
    }

    /// Resolves and calls `name`.
    ///
    /// # Safety
    ///
    /// The resolved program must follow the calling convention described in
    /// [`invoke_entry`] for `argv`.
    pub unsafe fn call(&mut self, name: &str, argv: &[*mut c_void]) -> Result<c_int, CallError> {
        let prepared = self.prepare_call(name, argv)?;
        let result = unsafe { prepared.invoke() };
        self.finish_call(prepared);
        result
    }

    /// Calls `name` once and cancels it afterwards, whatever the outcome.
    ///
    /// # Safety
    ///
    /// See [`CallRuntime::call`].
    pub unsafe fn func(&mut self, name: &str, argv: &[*mut c_void]) -> Result<c_int, CallError> {
        let result = unsafe { self.call(name, argv) };
        self.cancel(name);
        result
    }

    /// Binds `fields` as the parameters of the call and passes their
    /// storage addresses as arguments.
    ///
    /// # Safety
    ///
    /// See [`CallRuntime::call`].
    pub unsafe fn call_fields(&mut self, name: &str, fields: &[Field]) -> Result<c_int, CallError> {
        let prepared = self.prepare_call_fields(name, fields)?;
        let result = unsafe { prepared.invoke() };
        self.finish_call(prepared);
        result
    }
}
