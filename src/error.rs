//! Uniform error representation and the per-handle error reporter.
//!
//! Every fallible operation in the runtime surfaces through this module: a
//! structured [`Error`] carrying an error-class code, a formatted message,
//! and the source location where it was raised. There is no other diagnostic
//! side channel.
//!
//! # Reporter modes
//!
//! - [`ErrorMode::Abort`] — print `file:line: message` to stderr and
//!   terminate the process. This is the default for a fresh engine handle.
//! - [`ErrorMode::Return`] — hand the structured error back to the caller,
//!   who may retry, pick a different resource string, or give up.
//!
//! Compile errors always embed the device compiler's full diagnostic log in
//! the message, so the source-level problem stays diagnosable.

use core::cell::Cell;
use core::fmt;
use std::panic::Location;

/// Classification of a runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Bad or unmatched resource string, unsupported location request, or
    /// other invalid configuration.
    Config,
    /// Allocation failure, registry capacity exhausted.
    Resource,
    /// The device compiler rejected kernel source. The message carries the
    /// compiler's diagnostic log.
    Compile,
    /// An underlying device-API call failed.
    Device,
    /// Misuse of the API: mismatched lease pairing, launch geometry that
    /// contradicts the compiled module, and similar.
    Usage,
    /// The active backend does not implement an optional operation.
    /// Callers treat this as "capability absent", not as failure.
    Unsupported,
}

impl ErrorCode {
    /// Stable integer code carried on the error channel.
    pub fn as_i32(self) -> i32 {
        match self {
            ErrorCode::Config => 1,
            ErrorCode::Resource => 2,
            ErrorCode::Compile => 3,
            ErrorCode::Device => 4,
            ErrorCode::Usage => 5,
            ErrorCode::Unsupported => 6,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Config => "config",
            ErrorCode::Resource => "resource",
            ErrorCode::Compile => "compile",
            ErrorCode::Device => "device",
            ErrorCode::Usage => "usage",
            ErrorCode::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// A structured runtime failure: (code, message, source location).
#[derive(Debug, Clone)]
pub struct Error {
    code: ErrorCode,
    message: String,
    location: &'static Location<'static>,
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Raises an error of the given class at the caller's source location.
    #[track_caller]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// Configuration error (bad resource string, missing capability, ...).
    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, message)
    }

    /// Resource exhaustion (allocation failure, registry full).
    #[track_caller]
    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Resource, message)
    }

    /// Device-compiler rejection. `status` is the compiler's native status
    /// and `log` its full diagnostic output.
    #[track_caller]
    pub fn compile(status: impl fmt::Display, log: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Compile, format!("{status}\n{log}"))
    }

    /// A device-API call failed.
    #[track_caller]
    pub fn device(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Device, message)
    }

    /// API misuse detectable at runtime.
    #[track_caller]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Usage, message)
    }

    /// The backend does not provide `operation`.
    #[track_caller]
    pub fn unsupported(operation: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Unsupported,
            format!("backend does not implement {operation}"),
        )
    }

    /// The error class.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The formatted message. For compile errors this includes the device
    /// compiler's log verbatim.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source location where the error was raised.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Whether this error marks an absent optional capability.
    pub fn is_unsupported(&self) -> bool {
        self.code == ErrorCode::Unsupported
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({}, code {})",
            self.location.file(),
            self.location.line(),
            self.message,
            self.code,
            self.code.as_i32()
        )
    }
}

impl std::error::Error for Error {}

/// Failure-handling behavior of a runtime handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Print the diagnostic and terminate the process.
    #[default]
    Abort,
    /// Propagate the structured error to the caller.
    Return,
}

/// Per-handle failure router. Every fallible engine operation passes its
/// result through [`Reporter::filter`]; nothing is silently swallowed.
#[derive(Debug, Default)]
pub struct Reporter {
    mode: Cell<ErrorMode>,
}

impl Reporter {
    /// A reporter in the default [`ErrorMode::Abort`] state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active mode.
    pub fn mode(&self) -> ErrorMode {
        self.mode.get()
    }

    /// Switches the failure behavior.
    pub fn set_mode(&self, mode: ErrorMode) {
        self.mode.set(mode);
    }

    /// The single choke point. Under `Abort`, an `Err` is fatal; under
    /// `Return` it passes through unchanged.
    pub fn filter<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(v) => Ok(v),
            Err(e) => match self.mode.get() {
                ErrorMode::Abort => {
                    eprintln!("{}:{}: {}", e.location().file(), e.location().line(), e.message());
                    std::process::abort();
                }
                ErrorMode::Return => Err(e),
            },
        }
    }
}
