//! Error types for the input-analysis pipeline.
//!
//! Mirrors the taxonomy in the specification: format errors (container
//! isn't a supported ELF), structure errors (missing/duplicate required
//! sections), relocation errors, binding errors, and system errors. Import
//! resolution failures are warnings, not `Error`s, and are reported through
//! [`crate::diag::DiagnosticSink`] instead.

use std::borrow::Cow;
use std::fmt::{self, Display};

/// Errors that can abort a [`crate::Binary::load`] call.
///
/// Every variant carries a human-readable message rather than structured
/// fields, since the caller's only use for these is surfacing a
/// diagnostic — there is no retry or recovery path (see `spec.md` §7).
#[derive(Debug)]
pub enum Error {
    /// The file isn't a 32-bit little-endian ARM ELF.
    ///
    /// This covers a bad magic number, wrong class, wrong data encoding,
    /// unsupported ELF version, or a machine type other than ARM.
    Format {
        /// A descriptive message about the format error.
        msg: Cow<'static, str>,
    },

    /// Required structure is missing or duplicated.
    ///
    /// This covers a missing or duplicated symbol table, neither reserved
    /// stub section present, no relocation tables at all, a reserved
    /// stub section appearing more than once, or a forbidden
    /// `.rel.debug_*` section present.
    Structure {
        /// A descriptive message about the structure error.
        msg: Cow<'static, str>,
    },

    /// A relocation entry couldn't be decoded.
    ///
    /// This covers an unsupported relocation type, a symbol index out of
    /// range, an offset outside the target section, or a `SHT_RELA`
    /// section (RELA is a hard limitation of the runtime, not decoded).
    Relocation {
        /// A descriptive message about the relocation error.
        msg: Cow<'static, str>,
    },

    /// A stub couldn't be bound to its owning symbol.
    ///
    /// This covers a symbol/stub type mismatch, two symbols claiming the
    /// same stub, or a qualifying symbol whose value matches no stub.
    Binding {
        /// A descriptive message about the binding error.
        msg: Cow<'static, str>,
    },

    /// The host couldn't open the file or reserve address space.
    ///
    /// This covers a file-open failure and a failed host address-space
    /// reservation for the segment map.
    System {
        /// A descriptive message about the system error.
        msg: Cow<'static, str>,
    },
}

impl Display for Error {
    /// Formats the error for display purposes.
    ///
    /// Prefixes the message with the error kind so the taxonomy in
    /// `spec.md` §7 stays visible even when errors are just printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Format { msg } => write!(f, "format error: {msg}"),
            Error::Structure { msg } => write!(f, "structure error: {msg}"),
            Error::Relocation { msg } => write!(f, "relocation error: {msg}"),
            Error::Binding { msg } => write!(f, "binding error: {msg}"),
            Error::System { msg } => write!(f, "system error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    /// Converts an I/O failure into a [`Error::System`], since the only
    /// I/O this crate performs is opening and memory-mapping the input
    /// file.
    #[cold]
    fn from(value: std::io::Error) -> Self {
        Error::System {
            msg: value.to_string().into(),
        }
    }
}

/// Result type returned by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Creates a format error with the specified message.
///
/// This is a convenience function for creating `Error::Format` variants.
///
/// # Arguments
/// * `msg` - The error message.
///
/// # Returns
/// An `Error::Format` variant with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn format_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Format { msg: msg.into() }
}

/// Creates a structure error with the specified message.
///
/// This is a convenience function for creating `Error::Structure` variants.
///
/// # Arguments
/// * `msg` - The error message.
///
/// # Returns
/// An `Error::Structure` variant with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn structure_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Structure { msg: msg.into() }
}

/// Creates a relocation error with the specified message.
///
/// This is a convenience function for creating `Error::Relocation` variants.
///
/// # Arguments
/// * `msg` - The error message.
///
/// # Returns
/// An `Error::Relocation` variant with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn relocation_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Relocation { msg: msg.into() }
}

/// Creates a binding error with the specified message.
///
/// This is a convenience function for creating `Error::Binding` variants.
///
/// # Arguments
/// * `msg` - The error message.
///
/// # Returns
/// An `Error::Binding` variant with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn binding_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Binding { msg: msg.into() }
}

/// Creates a system error with the specified message.
///
/// This is a convenience function for creating `Error::System` variants.
///
/// # Arguments
/// * `msg` - The error message.
///
/// # Returns
/// An `Error::System` variant with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn system_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::System { msg: msg.into() }
}
