//! Input-analysis engine for ARM ELF module binaries.
//!
//! Given a statically-linked ARM32 ELF produced by the source toolchain,
//! [`Binary::load`] parses its two reserved stub sections, decodes every
//! `REL` relocation (including the addend reconstruction `RELA` would
//! normally carry explicitly), builds the guest/host segment map, and
//! binds stub records to the global symbols that claim them. Import
//! resolution against an external NID catalogue is a separate, non-fatal
//! step driven through [`Binary::resolve`].
//!
//! See `error` for the failure taxonomy and `diag` for how non-fatal
//! warnings are reported.

pub mod binary;
pub mod catalogue;
pub mod diag;
pub mod elf;
pub mod error;
pub mod relocation;
pub mod segment;
pub mod stub;
pub mod symbol;

pub use binary::Binary;
pub use catalogue::{Catalogue, Library, Module, Target};
pub use diag::{DiagnosticSink, NullSink, StderrSink, VecSink};
pub use error::{Error, Result};
pub use relocation::{RelocationEntry, RelocationTable};
pub use segment::{Segment, SegmentMap};
pub use stub::{Stub, StubArray, StubKind};
pub use symbol::{Symbol, SymbolBind, SymbolTable, SymbolType};
