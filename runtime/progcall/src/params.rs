///
/// # Parameter Marshalling
///
/// Read and write access to the positional parameters of the current call,
/// addressed 1-based. Every accessor checks the index against the current
/// parameter count and refuses null slots; writers also refuse fields
/// flagged constant. Violations are logged as warnings and returned as
/// errors without touching memory.
///

use tracing::warn;

use progcall_field::{Field, FieldType};

use crate::errors::CallError;
use crate::runtime::CallRuntime;

/// Parameters visible to the program currently running.
///
/// Every call starts a frame of its own and the caller's frame comes back
/// when it returns, so descriptors never outlive the call that bound them.
#[derive(Debug, Clone, Default)]
pub struct ParamFrame {
    count: usize,
    fields: Vec<Option<Field>>,
}

impl ParamFrame {
    pub fn new(fields: Vec<Option<Field>>) -> Self {
        Self {
            count: fields.len(),
            fields,
        }
    }

    /// Frame of a call made with raw arguments: `count` parameters, none
    /// described until the callee binds its descriptors.
    pub fn unbound(count: usize) -> Self {
        Self {
            count,
            fields: vec![None; count],
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl CallRuntime {
    /// Publishes `fields` as the descriptors of the current call's
    /// parameters. Inside a call the announced count is kept; outside any
    /// call a frame of `fields.len()` parameters is started.
    pub fn bind_params(&mut self, fields: Vec<Option<Field>>) {
        match &mut self.frame {
            Some(frame) => frame.fields = fields,
            None => self.frame = Some(ParamFrame::new(fields)),
        }
    }

    pub fn clear_params(&mut self) {
        self.frame = None;
    }

    pub fn num_params(&self) -> Result<usize, CallError> {
        match &self.frame {
            Some(frame) => Ok(frame.count),
            None => {
                warn!(op = "num_params", "no parameters are bound");
                Err(CallError::NotInitialized)
            }
        }
    }

    fn param(&self, n: usize, op: &str) -> Result<Field, CallError> {
        let result = match &self.frame {
            None => Err(CallError::NotInitialized),
            Some(frame) if n < 1 || n > frame.count => Err(CallError::ParamOutOfRange {
                n,
                count: frame.count,
            }),
            Some(frame) => frame
                .fields
                .get(n - 1)
                .copied()
                .flatten()
                .ok_or(CallError::ParamNull { n }),
        };

        if let Err(e) = &result {
            warn!(op, "{}", e);
        }
        result
    }

    fn writable_param(&self, n: usize, op: &str) -> Result<Field, CallError> {
        let field = self.param(n, op)?;
        if field.is_constant() {
            let err = CallError::ConstantWrite { n };
            warn!(op, "{}", err);
            return Err(err);
        }
        Ok(field)
    }

    pub fn param_type(&self, n: usize) -> Result<FieldType, CallError> {
        Ok(self.param(n, "param_type")?.reported_type())
    }

    pub fn param_size(&self, n: usize) -> Result<usize, CallError> {
        Ok(self.param(n, "param_size")?.size())
    }

    pub fn param_sign(&self, n: usize) -> Result<bool, CallError> {
        Ok(self.param(n, "param_sign")?.attr().signed)
    }

    pub fn param_scale(&self, n: usize) -> Result<i32, CallError> {
        Ok(self.param(n, "param_scale")?.attr().scale)
    }

    pub fn param_digits(&self, n: usize) -> Result<u32, CallError> {
        Ok(self.param(n, "param_digits")?.attr().digits)
    }

    pub fn param_constant(&self, n: usize) -> Result<bool, CallError> {
        Ok(self.param(n, "param_constant")?.is_constant())
    }

    /// Raw address of the parameter's storage.
    pub fn param_data(&self, n: usize) -> Result<*mut u8, CallError> {
        Ok(self.param(n, "param_data")?.data_ptr())
    }

    pub fn get_s64_param(&self, n: usize) -> Result<i64, CallError> {
        Ok(self.param(n, "get_s64_param")?.get_s64())
    }

    pub fn get_u64_param(&self, n: usize) -> Result<u64, CallError> {
        Ok(self.param(n, "get_u64_param")?.get_u64())
    }

    pub fn put_s64_param(&self, n: usize, val: i64) -> Result<(), CallError> {
        self.writable_param(n, "put_s64_param")?.put_s64(val);
        Ok(())
    }

    pub fn put_u64_param(&self, n: usize, val: u64) -> Result<(), CallError> {
        self.writable_param(n, "put_u64_param")?.put_u64(val);
        Ok(())
    }

    /// Parameter contents as text, trailing spaces removed.
    pub fn get_text_param(&self, n: usize) -> Result<String, CallError> {
        Ok(self.param(n, "get_text_param")?.get_text())
    }

    pub fn put_text_param(&self, n: usize, text: &[u8]) -> Result<(), CallError> {
        self.writable_param(n, "put_text_param")?.put_text(text);
        Ok(())
    }

    /// Copy of the parameter's raw bytes.
    pub fn get_group_param(&self, n: usize) -> Result<Vec<u8>, CallError> {
        Ok(self.param(n, "get_group_param")?.bytes().to_vec())
    }

    /// Copies the parameter into `dest`, bounded by both sizes.
    pub fn read_group_param(&self, n: usize, dest: &mut [u8]) -> Result<usize, CallError> {
        Ok(self.param(n, "read_group_param")?.read_block(dest))
    }

    /// Overwrites the leading bytes of the parameter with `src`, never past
    /// its declared size.
    pub fn put_group_param(&self, n: usize, src: &[u8]) -> Result<usize, CallError> {
        Ok(self.writable_param(n, "put_group_param")?.write_block(src))
    }
}
