//! Symbol table loading.

use std::ffi::CStr;

use elf::abi::{SHT_SYMTAB, STB_GLOBAL, STB_LOCAL, STT_FUNC, STT_OBJECT};

use crate::elf::defs::SYM_SIZE;
use crate::elf::{ElfReader, Elf32Sym};
use crate::error::{structure_error, Result};

/// Symbol type, collapsed to the three categories the rest of the
/// pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    Function,
    Object,
    Other,
}

/// Symbol binding, collapsed the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolBind {
    Global,
    Local,
    Other,
}

/// One entry of the symbol table.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub value: u32,
    pub sym_type: SymbolType,
    pub bind: SymbolBind,
    pub shndx: u16,
}

impl Symbol {
    fn from_raw(raw: &Elf32Sym, name: String) -> Self {
        let sym_type = match raw.st_type() {
            STT_FUNC => SymbolType::Function,
            STT_OBJECT => SymbolType::Object,
            _ => SymbolType::Other,
        };
        let bind = match raw.st_bind() {
            STB_GLOBAL => SymbolBind::Global,
            STB_LOCAL => SymbolBind::Local,
            _ => SymbolBind::Other,
        };
        Symbol {
            name,
            value: raw.st_value,
            sym_type,
            bind,
            shndx: raw.st_shndx,
        }
    }
}

/// The binary's symbol table, materialised once and kept read-only.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    /// Section index of the `SHT_SYMTAB` this table was built from, so a
    /// second `load` call on the same section is a no-op and a call on a
    /// different section is rejected.
    source_section: Option<usize>,
}

impl SymbolTable {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Symbol)> {
        self.symbols.iter().enumerate()
    }

    /// Loads the symbol table from the `SHT_SYMTAB` section at
    /// `section_index`. Idempotent if called again with the same index;
    /// fails if called with a *different* section index, since only one
    /// symbol table is supported.
    pub fn load(&mut self, reader: &ElfReader, section_index: usize) -> Result<()> {
        if let Some(existing) = self.source_section {
            if existing == section_index {
                return Ok(());
            }
            return Err(structure_error(
                "more than one symbol table section present",
            ));
        }

        let section = reader
            .section(section_index)
            .ok_or_else(|| structure_error("symbol table section index out of range"))?;
        if section.header.sh_type != SHT_SYMTAB {
            return Err(structure_error("section is not a symbol table"));
        }

        let strtab = reader
            .section(section.header.sh_link as usize)
            .ok_or_else(|| structure_error("symbol table's linked string table is missing"))?;

        let entry_count = ElfReader::symtab_entry_count(section.header);
        let mut symbols = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            let off = i * SYM_SIZE;
            let raw: &Elf32Sym = unsafe { &*(section.data[off..].as_ptr() as *const Elf32Sym) };
            let name = read_str(strtab.data, raw.st_name as usize);
            symbols.push(Symbol::from_raw(raw, name));
        }

        self.symbols = symbols;
        self.source_section = Some(section_index);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn push_for_test(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }
}

fn read_str(strtab: &[u8], offset: usize) -> String {
    if offset >= strtab.len() {
        return String::new();
    }
    CStr::from_bytes_until_nul(&strtab[offset..])
        .ok()
        .and_then(|c| c.to_str().ok())
        .unwrap_or("")
        .to_string()
}
