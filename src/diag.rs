//! Explicit diagnostic sink.
//!
//! The source tool writes warnings (unresolved imports, unreferenced
//! stubs) to a process-wide error stream. Per the redesign notes, that
//! becomes an explicit collaborator here so the core stays testable
//! without capturing global I/O.

/// Destination for non-fatal diagnostics produced while loading a [`crate::Binary`].
pub trait DiagnosticSink {
    fn warn(&mut self, message: &str);
}

/// Writes every warning to `stderr`, for CLI callers.
#[derive(Debug, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn warn(&mut self, message: &str) {
        eprintln!("warning: {message}");
        #[cfg(feature = "log")]
        log::warn!("{message}");
    }
}

/// Collects every warning into memory, for tests and tools that want to
/// inspect diagnostics programmatically instead of printing them.
#[derive(Debug, Default)]
pub struct VecSink {
    pub messages: Vec<String>,
}

impl DiagnosticSink for VecSink {
    fn warn(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Discards every warning. Useful when the caller only cares about
/// fatal errors.
#[derive(Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn warn(&mut self, _message: &str) {}
}
