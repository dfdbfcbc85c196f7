//! Stub section loading and stub-to-symbol binding.
//!
//! A stub is a 16-byte placeholder record the source toolchain emits for
//! every imported function or variable, identifying it by three numeric
//! identifiers (NIDs) rather than a name. The two reserved sections hold
//! one array of stubs each: `.vitalink.fstubs` for imported functions,
//! `.vitalink.vstubs` for imported variables.

use elf::abi::{SHT_PROGBITS, STB_GLOBAL, STT_FUNC, STT_OBJECT};

use crate::diag::DiagnosticSink;
use crate::elf::reader::Section;
use crate::error::{binding_error, structure_error, Result};
use crate::symbol::{SymbolBind, SymbolTable, SymbolType};

pub const FSTUBS_SECTION: &str = ".vitalink.fstubs";
pub const VSTUBS_SECTION: &str = ".vitalink.vstubs";

pub const STUB_RECORD_SIZE: usize = 16;

/// Which of the two reserved stub sections a [`Stub`] came from. The
/// binder enforces a matching symbol type per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubKind {
    Function,
    Variable,
}

/// One parsed 16-byte stub record, plus whatever binding/resolution has
/// been attached to it so far.
///
/// `library`/`module`/`target` are the three weak references the
/// resolver attaches (`spec.md` §3, §4.7): the catalogue retains
/// ownership of the actual descriptors, so rather than borrow them with
/// a lifetime that would propagate through `Binary`, each field simply
/// records whether that level of the NID chain resolved.
#[derive(Debug, Clone)]
pub struct Stub {
    pub addr: u32,
    pub library_nid: u32,
    pub module_nid: u32,
    pub target_nid: u32,
    /// Index into the `Binary`'s symbol table, if a qualifying symbol
    /// claimed this stub. Unreferenced stubs are legal (warning only).
    pub symbol: Option<usize>,
    pub library: bool,
    pub module: bool,
    pub target: bool,
}

impl Stub {
    fn new(addr: u32, library_nid: u32, module_nid: u32, target_nid: u32) -> Self {
        Stub {
            addr,
            library_nid,
            module_nid,
            target_nid,
            symbol: None,
            library: false,
            module: false,
            target: false,
        }
    }
}

/// The stub array parsed from one reserved section, plus the section
/// index the binder matches against symbol `st_shndx`.
#[derive(Debug, Default)]
pub struct StubArray {
    pub kind: Option<StubKind>,
    pub section_index: Option<usize>,
    pub stubs: Vec<Stub>,
}

impl StubArray {
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// Parses every consecutive 16-byte chunk of `section`'s data into a
    /// stub record, with `addr` derived from the section's guest base
    /// plus the chunk's in-section offset (the on-disk `addr` field is
    /// ignored per the stub record layout contract). Fails if this
    /// array was already populated from a different section (the
    /// reserved section appeared twice).
    pub fn load(&mut self, section: &Section<'_>, kind: StubKind, name: &str) -> Result<()> {
        if self.section_index.is_some() {
            return Err(structure_error(format!(
                "section {name} appears more than once"
            )));
        }
        if section.header.sh_type != SHT_PROGBITS {
            return Err(structure_error(format!("section {name} is not PROGBITS")));
        }
        if section.data.len() % STUB_RECORD_SIZE != 0 {
            return Err(structure_error(format!(
                "section {name} size is not a multiple of {STUB_RECORD_SIZE}"
            )));
        }

        let base = section.header.sh_addr;
        let mut stubs = Vec::with_capacity(section.data.len() / STUB_RECORD_SIZE);
        for chunk_off in (0..section.data.len()).step_by(STUB_RECORD_SIZE) {
            let chunk = &section.data[chunk_off..chunk_off + STUB_RECORD_SIZE];
            let library_nid = u32::from_le_bytes(chunk[4..8].try_into().unwrap());
            let module_nid = u32::from_le_bytes(chunk[8..12].try_into().unwrap());
            let target_nid = u32::from_le_bytes(chunk[12..16].try_into().unwrap());
            stubs.push(Stub::new(
                base + chunk_off as u32,
                library_nid,
                module_nid,
                target_nid,
            ));
        }

        self.kind = Some(kind);
        self.section_index = Some(section.index);
        self.stubs = stubs;
        Ok(())
    }

    fn find_mut_by_addr(&mut self, addr: u32) -> Option<&mut Stub> {
        self.stubs.iter_mut().find(|s| s.addr == addr)
    }
}

/// Attaches every qualifying global symbol to the stub at its address,
/// across both stub arrays. See `spec.md` §4.6 for the exact policy.
pub fn bind_stubs(
    fstubs: &mut StubArray,
    vstubs: &mut StubArray,
    symbols: &SymbolTable,
    sink: &mut dyn DiagnosticSink,
) -> Result<()> {
    for (index, symbol) in symbols.iter() {
        if symbol.bind != SymbolBind::Global {
            continue;
        }
        if symbol.sym_type != SymbolType::Function && symbol.sym_type != SymbolType::Object {
            continue;
        }

        let shndx = symbol.shndx as usize;
        let array = if fstubs.section_index == Some(shndx) {
            Some((&mut *fstubs, StubKind::Function))
        } else if vstubs.section_index == Some(shndx) {
            Some((&mut *vstubs, StubKind::Variable))
        } else {
            None
        };
        let Some((array, kind)) = array else {
            continue;
        };

        let expected_type = match kind {
            StubKind::Function => SymbolType::Function,
            StubKind::Variable => SymbolType::Object,
        };
        if symbol.sym_type != expected_type {
            return Err(binding_error(format!(
                "symbol {:?} has type {:?} but claims a {:?} stub",
                symbol.name, symbol.sym_type, kind
            )));
        }

        let stub = array
            .find_mut_by_addr(symbol.value)
            .ok_or_else(|| binding_error(format!(
                "symbol {:?} (value 0x{:x}) does not correspond to any stub",
                symbol.name, symbol.value
            )))?;

        if let Some(existing) = stub.symbol {
            return Err(binding_error(format!(
                "stub at 0x{:x} claimed by both symbol #{} and #{}",
                stub.addr, existing, index
            )));
        }
        stub.symbol = Some(index);
    }

    report_unreferenced(fstubs, sink);
    report_unreferenced(vstubs, sink);
    Ok(())
}

fn report_unreferenced(array: &StubArray, sink: &mut dyn DiagnosticSink) {
    for stub in &array.stubs {
        if stub.symbol.is_none() {
            sink.warn(&format!("unreferenced stub at 0x{:x}", stub.addr));
        }
    }
}

/// At least one stub section, and not the same reserved name declared
/// with a symbol of the wrong kind (`STB_GLOBAL` not required here; the
/// constants are re-exported for callers constructing test fixtures).
pub const REQUIRED_SYMBOL_BIND: u8 = STB_GLOBAL;
pub const REQUIRED_FUNCTION_TYPE: u8 = STT_FUNC;
pub const REQUIRED_OBJECT_TYPE: u8 = STT_OBJECT;
