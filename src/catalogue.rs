//! Import resolution against an externally supplied NID catalogue.
//!
//! Parsing the import-description files that back a catalogue is an
//! explicit Non-goal; the catalogue itself is an opaque trait-object
//! collaborator the caller implements, the same shape as the teacher's
//! `SymbolLookup` trait in `src/relocation/traits.rs`.

use crate::diag::DiagnosticSink;
use crate::stub::{Stub, StubKind};

/// A trait for looking up a module within a library, by module NID.
///
/// Implement this trait to describe one library's contents. Typically the
/// implementer owns a fixed table of modules parsed from whatever import
/// description format the caller uses; this crate only ever reads it
/// through the trait object.
///
/// # Examples
///
/// Using a `HashMap` keyed by module NID:
/// ```rust
/// use std::collections::HashMap;
/// use vitalink_core::{Library, Module};
///
/// struct MapLibrary {
///     modules: HashMap<u32, Box<dyn Module>>,
/// }
///
/// impl Library for MapLibrary {
///     fn module(&self, module_nid: u32) -> Option<&dyn Module> {
///         self.modules.get(&module_nid).map(|m| m.as_ref())
///     }
/// }
/// ```
pub trait Library {
    /// Finds the module with the given module NID.
    ///
    /// # Arguments
    /// * `module_nid` - The module NID to resolve, taken from a stub's
    ///   `module_nid` field.
    ///
    /// # Returns
    /// * `Some(module)` - The module, if this library exports it.
    /// * `None` - No module with that NID in this library.
    fn module(&self, module_nid: u32) -> Option<&dyn Module>;
}

/// A trait for looking up an exported function or variable within a
/// module, by target NID.
///
/// `kind` distinguishes the function and variable export tables a real
/// module keeps separately, since a target NID is only unique within one
/// of the two.
///
/// # Examples
///
/// ```rust
/// use vitalink_core::{Module, StubKind, Target};
///
/// struct FixedModule {
///     export_nid: u32,
///     export: Box<dyn Target>,
/// }
///
/// impl Module for FixedModule {
///     fn target(&self, target_nid: u32, _kind: StubKind) -> Option<&dyn Target> {
///         (target_nid == self.export_nid).then(|| self.export.as_ref())
///     }
/// }
/// ```
pub trait Module {
    /// Finds the exported function or variable with the given target NID.
    ///
    /// # Arguments
    /// * `target_nid` - The target NID to resolve, taken from a stub's
    ///   `target_nid` field.
    /// * `kind` - Whether the caller is resolving a function stub or a
    ///   variable stub.
    ///
    /// # Returns
    /// * `Some(target)` - The export, if this module has it under `kind`.
    /// * `None` - No matching export.
    fn target(&self, target_nid: u32, kind: StubKind) -> Option<&dyn Target>;
}

/// An exported function or variable descriptor.
///
/// This crate never inspects a `Target` beyond checking that one exists —
/// a resolved stub only records that the chain bottomed out, not what the
/// export actually points to. Callers that need the address or value
/// attach it to their own `Target` implementation.
pub trait Target {}

/// A trait for looking up a library within an ordered collection of
/// import catalogues, by library NID.
///
/// The first catalogue that contains a given library NID wins; everything
/// downstream of that is resolved within that one library. This mirrors
/// how multiple catalogues (e.g. a built-in system catalogue plus a
/// per-title catalogue) stack during import resolution.
///
/// # Examples
///
/// ```rust
/// use vitalink_core::{Catalogue, Library};
///
/// struct SingleCatalogue {
///     library_nid: u32,
///     library: Box<dyn Library>,
/// }
///
/// impl Catalogue for SingleCatalogue {
///     fn library(&self, library_nid: u32) -> Option<&dyn Library> {
///         (library_nid == self.library_nid).then(|| self.library.as_ref())
///     }
/// }
/// ```
pub trait Catalogue {
    /// Finds the library with the given library NID.
    ///
    /// # Arguments
    /// * `library_nid` - The library NID to resolve, taken from a stub's
    ///   `library_nid` field.
    ///
    /// # Returns
    /// * `Some(library)` - The library, if this catalogue contains it.
    /// * `None` - No library with that NID in this catalogue.
    fn library(&self, library_nid: u32) -> Option<&dyn Library>;
}

/// Resolves every stub's `(library_nid, module_nid, target_nid)` triple
/// against `catalogues`. The catalogue keeps ownership of the resolved
/// descriptors, so each stub just records which levels of the chain
/// resolved (`Stub::library`/`module`/`target`).
///
/// Returns `true` iff every stub in both arrays resolved completely.
/// Unresolved stubs are warnings, not fatal errors, per `spec.md` §4.7.
pub fn resolve_stubs<'a>(
    stubs: impl Iterator<Item = &'a mut Stub>,
    kind: StubKind,
    catalogues: &[&dyn Catalogue],
    sink: &mut dyn DiagnosticSink,
) -> bool {
    let mut all_resolved = true;
    for (i, stub) in stubs.enumerate() {
        if !resolve_one(stub, kind, catalogues) {
            all_resolved = false;
            sink.warn(&format!(
                "stub #{i} (library=0x{:x}, module=0x{:x}, target=0x{:x}) did not fully resolve",
                stub.library_nid, stub.module_nid, stub.target_nid
            ));
        }
    }
    all_resolved
}

fn resolve_one(stub: &mut Stub, kind: StubKind, catalogues: &[&dyn Catalogue]) -> bool {
    let library = catalogues
        .iter()
        .find_map(|cat| cat.library(stub.library_nid));
    let Some(library) = library else {
        return false;
    };
    stub.library = true;

    let Some(module) = library.module(stub.module_nid) else {
        return false;
    };
    stub.module = true;

    let Some(_target) = module.target(stub.target_nid, kind) else {
        return false;
    };
    stub.target = true;

    true
}
