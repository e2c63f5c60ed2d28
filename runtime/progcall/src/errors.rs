///
/// Runtime error types.
///
/// Three classes of failure flow through the runtime:
///
/// - **Not found** (`ProgramNotFound`, `EntryPointNotFound`) is recoverable:
///   the message is also kept in the last-error slot for `take_resolve_error`.
/// - **API misuse** (`NotInitialized`, `InvalidArgument`) is fatal at the C
///   boundary, which terminates the process after reporting it.
/// - **Marshalling violations** (`ParamOutOfRange`, `ParamNull`,
///   `ConstantWrite`) are warnings: the operation is skipped and execution
///   continues.
///

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("module '{name}' not found")]
    ProgramNotFound { name: String },

    #[error("entry point '{entry}' not found")]
    EntryPointNotFound { entry: String },

    #[error("runtime is not initialized")]
    NotInitialized,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("param {n} is not within range of {count}")]
    ParamOutOfRange { n: usize, count: usize },

    #[error("param {n} is NULL")]
    ParamNull { n: usize },

    #[error("attempt to over-write constant param {n}")]
    ConstantWrite { n: usize },

    #[error("failed to load {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("invalid configuration in {source_name}: {reason}")]
    Config { source_name: String, reason: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CallError {
    /// Misuse of the API contract; the C boundary aborts on these.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CallError::NotInitialized | CallError::InvalidArgument(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CallError::ProgramNotFound { .. } | CallError::EntryPointNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = CallError::ProgramNotFound {
            name: "PAYROLL".to_string(),
        };
        assert_eq!(err.to_string(), "module 'PAYROLL' not found");

        let err = CallError::EntryPointNotFound {
            entry: "PAYROLL".to_string(),
        };
        assert_eq!(err.to_string(), "entry point 'PAYROLL' not found");

        let err = CallError::ParamOutOfRange { n: 4, count: 2 };
        assert!(err.to_string().contains("param 4"));
        assert!(err.to_string().contains("range of 2"));

        let err = CallError::LoadFailed {
            path: PathBuf::from("/lib/x.so"),
            reason: "bad ELF".to_string(),
        };
        assert!(err.to_string().contains("/lib/x.so"));
        assert!(err.to_string().contains("bad ELF"));
    }

    #[test]
    fn test_error_classes() {
        assert!(CallError::NotInitialized.is_fatal());
        assert!(CallError::InvalidArgument("argc".to_string()).is_fatal());
        assert!(!CallError::ParamNull { n: 1 }.is_fatal());

        assert!(CallError::ProgramNotFound { name: "A".to_string() }.is_not_found());
        assert!(!CallError::ParamNull { n: 1 }.is_not_found());
    }
}
