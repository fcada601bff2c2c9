//! REM Error Types
//!
//! Defines all fatal error conditions produced by the Register Execution
//! Machine. There is no recoverable subclass: every error aborts the
//! instruction that raised it and propagates out of `step`/`run`.

use std::io;

use thiserror::Error;

use crate::vm::value::RegionId;

#[derive(Debug, Error)]
pub enum RemError {
    // Register file errors
    #[error("invalid register index ${0}")]
    InvalidRegisterIndex(u8),
    #[error("invalid value written to register ${0}")]
    InvalidValueWrite(u8),
    #[error("write to read-only register ${0}")]
    ReadOnlyRegisterWrite(u8),

    // Memory region errors
    #[error("address {addr:#x} is out of bounds for the {region} region")]
    OutOfBoundsAccess { region: RegionId, addr: u32 },

    // Decode errors
    #[error("reserved instruction class {0:#x}")]
    ReservedInstructionClass(u8),
    #[error("reserved comparison method {0:#05b}")]
    ReservedComparisonMethod(u8),
    #[error("reserved branch mode {0:#05b} (relative call)")]
    ReservedBranchMode(u8),

    // Value model errors
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot operate on pointers into different memory regions")]
    CrossRegionPointerOperation,
    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion {
        from: &'static str,
        to: &'static str,
    },
    #[error("unsupported reinterpretation of {from} as {to}")]
    UnsupportedReinterpretation {
        from: &'static str,
        to: &'static str,
    },

    // String and environment errors
    #[error("string data in memory is not valid UTF-8")]
    NonUtf8StringData,
    #[error("environment variable \"{0}\" is not an integer")]
    EnvironmentValueNotInteger(String),

    // Program image / IO boundary
    #[error("program image is not a whole number of 32-bit words")]
    TruncatedImage,
    #[error("io error: {0}")]
    Io(String),
}

impl From<io::Error> for RemError {
    fn from(err: io::Error) -> Self {
        RemError::Io(err.to_string())
    }
}

pub type RemResult<T> = Result<T, RemError>;
