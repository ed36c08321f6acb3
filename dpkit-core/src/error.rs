//! Result/error protocol shared by every fallible operation in the engine.
//!
//! Every failure is captured where it happens as an [`Error`] carrying an
//! [`ErrorKind`], a message and (when `RUST_BACKTRACE` is set) a rendered
//! backtrace. Callers wrap inner failures with [`ErrorContext`] so the outward
//! message names the operator that failed while keeping the inner detail.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::TryReserveError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Alias for fallible engine operations.
pub type Fallible<T> = Result<T, Error>;

/// Coarse classification of a failure. The name of each kind crosses the
/// process boundary verbatim as the `variant` of an error record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A type name was not recognised or a value had the wrong shape.
    InvalidType,
    /// A buffer length is inconsistent with the element layout of its type.
    LengthMismatch,
    /// Domains or metrics do not line up (invocation, chaining, composition).
    DomainMismatch,
    /// A relation could not certify any finite bound.
    RelationViolated,
    /// Memory for a payload could not be reserved.
    AllocationFailure,
    /// A required pointer or handle was null.
    NullArgument,
    /// A constructor parameter is outside its numeric domain.
    NumericDomainError,
    /// A distance handed to a relation is negative or NaN.
    InvalidDistance,
    /// An operator body failed while running.
    FailedFunction,
    /// A handle is stale, already freed, or was never issued.
    InvalidHandle,
    /// A configured limit was exceeded.
    LimitExceeded,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidType => "InvalidType",
            ErrorKind::LengthMismatch => "LengthMismatch",
            ErrorKind::DomainMismatch => "DomainMismatch",
            ErrorKind::RelationViolated => "RelationViolated",
            ErrorKind::AllocationFailure => "AllocationFailure",
            ErrorKind::NullArgument => "NullArgument",
            ErrorKind::NumericDomainError => "NumericDomainError",
            ErrorKind::InvalidDistance => "InvalidDistance",
            ErrorKind::FailedFunction => "FailedFunction",
            ErrorKind::InvalidHandle => "InvalidHandle",
            ErrorKind::LimitExceeded => "LimitExceeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured engine error.
#[derive(Clone, Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub backtrace: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let backtrace = Backtrace::capture();
        let backtrace =
            (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string());
        Self {
            kind,
            message: message.into(),
            backtrace,
        }
    }

    /// Prefix the message with the name of the enclosing operation.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = if self.message.is_empty() {
            context.to_string()
        } else {
            format!("{context}: {}", self.message)
        };
        self
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Error::new(ErrorKind::AllocationFailure, err.to_string())
    }
}

/// Attach the name of the failing operation to an inner error.
pub trait ErrorContext<T> {
    fn context(self, context: impl fmt::Display) -> Fallible<T>;

    fn with_context<C, F>(self, context: F) -> Fallible<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T> ErrorContext<T> for Fallible<T> {
    fn context(self, context: impl fmt::Display) -> Fallible<T> {
        self.map_err(|err| err.context(context))
    }

    fn with_context<C, F>(self, context: F) -> Fallible<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|err| err.context(context()))
    }
}

/// Build an [`Error`] of the given kind with a formatted message.
#[macro_export]
macro_rules! err {
    ($kind:ident) => {
        $crate::error::Error::new($crate::error::ErrorKind::$kind, String::new())
    };
    ($kind:ident, $($arg:tt)+) => {
        $crate::error::Error::new($crate::error::ErrorKind::$kind, format!($($arg)+))
    };
}

/// Shorthand for `Err(err!(..))`.
#[macro_export]
macro_rules! fallible {
    ($kind:ident) => {
        Err($crate::err!($kind))
    };
    ($kind:ident, $($arg:tt)+) => {
        Err($crate::err!($kind, $($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner() -> Fallible<()> {
        fallible!(NumericDomainError, "scale must be positive, found {}", -1.0)
    }

    #[test]
    fn context_keeps_kind_and_inner_detail() {
        let err = inner().context("make_base_laplace").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NumericDomainError);
        assert_eq!(
            err.message,
            "make_base_laplace: scale must be positive, found -1"
        );
        assert_eq!(
            err.to_string(),
            "NumericDomainError: make_base_laplace: scale must be positive, found -1"
        );
    }

    #[test]
    fn empty_message_takes_context_verbatim() {
        let err = err!(NullArgument).context("arg");
        assert_eq!(err.message, "arg");
    }

    #[test]
    fn reserve_failure_maps_to_allocation_failure() {
        let mut buffer: Vec<u8> = Vec::new();
        let err: Error = buffer.try_reserve(usize::MAX).unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::AllocationFailure);
    }
}
