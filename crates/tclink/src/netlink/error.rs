//! Error types for netlink and codec operations.

use std::fmt;
use std::io;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink and codec operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Kernel error with operation context.
    #[error("{operation}: {message} (errno {errno})")]
    KernelWithContext {
        /// The operation that failed.
        operation: String,
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// A fixed-layout record payload had the wrong length.
    #[error("{what}: size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// The record being decoded.
        what: &'static str,
        /// The record's packed wire size.
        expected: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// A variable-length payload is shorter than its declared contents.
    #[error("{what}: not enough bytes: need {expected}, have {actual}")]
    InsufficientBytes {
        /// The record being decoded.
        what: &'static str,
        /// Bytes required by the declared count.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A TLV type code outside the schema's closed enumeration.
    #[error("{schema}: unknown attribute type {attr_type}")]
    UnknownAttribute {
        /// The schema that rejected the code.
        schema: &'static str,
        /// The offending type code (flags already masked off).
        attr_type: u16,
    },

    /// One or more sub-errors collected across a decode sequence.
    #[error("{0}")]
    Aggregated(ErrorList),
}

impl Error {
    /// Create a kernel error from an errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Create a kernel error with operation context.
    pub fn from_errno_with_context(errno: i32, operation: impl Into<String>) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::KernelWithContext {
            operation: operation.into(),
            errno: -errno,
            message,
        }
    }

    /// Add context to this error.
    ///
    /// Wraps kernel errors with operation context. Other errors are returned unchanged.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        match self {
            Self::Kernel { errno, message } => Self::KernelWithContext {
                operation: operation.into(),
                errno,
                message,
            },
            other => other,
        }
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV, etc.).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => {
                matches!(*errno, 2 | 19) // ENOENT=2, ENODEV=19
            }
            _ => false,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => {
                matches!(*errno, 1 | 13) // EPERM=1, EACCES=13
            }
            _ => false,
        }
    }

    /// Check if this is a "already exists" error (EEXIST).
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => {
                *errno == 17 // EEXIST=17
            }
            _ => false,
        }
    }

    /// Check if this is a "device busy" error (EBUSY).
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => {
                *errno == 16 // EBUSY=16
            }
            _ => false,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

/// Non-short-circuiting error accumulator.
///
/// Decode routines thread one of these through their attribute loops so a
/// malformed sub-attribute does not prevent decoding of its siblings. The
/// accumulator is surfaced to the caller alongside whatever fields decoded
/// successfully; it never silently drops an error.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<Error>,
}

impl ErrorList {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error.
    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    /// Record the outcome of a sub-step: the value on success, `None` after
    /// stashing the error on failure.
    pub fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    /// True if no errors were collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors collected.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the collected errors.
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    /// Convert into a single result: `Ok(())` when empty, otherwise an
    /// aggregated error carrying every collected sub-error.
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregated(self))
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errno() {
        let err = Error::from_errno(-1); // EPERM
        assert!(err.is_permission_denied());
        assert_eq!(err.errno(), Some(1));
    }

    #[test]
    fn test_from_errno_with_context() {
        let err = Error::from_errno_with_context(-2, "deleting qdisc on eth0"); // ENOENT
        assert!(err.is_not_found());
        let msg = err.to_string();
        assert!(msg.contains("deleting qdisc on eth0"));
        assert!(msg.contains("No such file or directory"));
    }

    #[test]
    fn test_with_context() {
        let err = Error::from_errno(-13); // EACCES
        let err = err.with_context("adding filter on eth0");
        assert!(err.is_permission_denied());
        let msg = err.to_string();
        assert!(msg.contains("adding filter on eth0"));
    }

    #[test]
    fn test_is_busy() {
        assert!(Error::from_errno(-16).is_busy()); // EBUSY
        assert!(!Error::from_errno(-1).is_busy()); // EPERM is not busy
    }

    #[test]
    fn test_error_list_empty() {
        let errs = ErrorList::new();
        assert!(errs.is_empty());
        assert!(errs.into_result().is_ok());
    }

    #[test]
    fn test_error_list_collects() {
        let mut errs = ErrorList::new();
        let ok: Option<u32> = errs.record(Ok(7));
        assert_eq!(ok, Some(7));
        let missing: Option<u32> = errs.record(Err(Error::SizeMismatch {
            what: "test record",
            expected: 8,
            actual: 3,
        }));
        assert_eq!(missing, None);
        errs.push(Error::UnknownAttribute {
            schema: "test",
            attr_type: 99,
        });
        assert_eq!(errs.len(), 2);

        let combined = errs.into_result().unwrap_err();
        let msg = combined.to_string();
        assert!(msg.contains("test record"));
        assert!(msg.contains("unknown attribute type 99"));
        assert!(msg.contains("; "));
    }

    #[test]
    fn test_error_messages() {
        let err = Error::SizeMismatch {
            what: "netem qopt",
            expected: 24,
            actual: 10,
        };
        assert_eq!(
            err.to_string(),
            "netem qopt: size mismatch: expected 24 bytes, got 10"
        );

        let err = Error::InsufficientBytes {
            what: "u32 selector keys",
            expected: 47,
            actual: 31,
        };
        assert_eq!(
            err.to_string(),
            "u32 selector keys: not enough bytes: need 47, have 31"
        );

        let err = Error::UnknownAttribute {
            schema: "netem",
            attr_type: 200,
        };
        assert_eq!(err.to_string(), "netem: unknown attribute type 200");
    }
}
