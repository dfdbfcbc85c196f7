//! Memory-mapped ELF32 ARM reader.
//!
//! Opens a file, maps it read-only, and exposes the header plus
//! zero-copy iteration over sections and program headers. All returned
//! slices borrow from the mmap and stay valid for the reader's lifetime
//! (the reader is kept alive for as long as the [`crate::Binary`] it
//! feeds, per the "borrowed strings" design note).

use std::ffi::CStr;
use std::fs::File;
use std::mem::size_of;
use std::path::Path;

use elf::abi::SHT_NOBITS;
use memmap2::Mmap;

use crate::elf::defs::{
    validate_header, Elf32Ehdr, Elf32Phdr, Elf32Shdr, Elf32Sym, EHDR_SIZE, PHDR_SIZE, SHDR_SIZE,
    SYM_SIZE,
};
use crate::error::{format_error, system_error, Result};

/// A single section: its header plus the raw bytes it covers in the
/// file (empty for `SHT_NOBITS`).
pub struct Section<'a> {
    pub index: usize,
    pub name: &'a str,
    pub header: &'a Elf32Shdr,
    pub data: &'a [u8],
}

/// An opened, validated ELF32 ARM file.
pub struct ElfReader {
    mmap: Mmap,
}

impl ElfReader {
    /// Opens and maps `path`, validating the ELF header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| system_error(format!("failed to open {:?}: {e}", path.as_ref())))?;
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| system_error(format!("failed to mmap {:?}: {e}", path.as_ref())))?;
        if mmap.len() < EHDR_SIZE {
            return Err(format_error("file too small to contain an ELF header"));
        }
        let reader = ElfReader { mmap };
        validate_header(reader.ehdr())?;
        Ok(reader)
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// The ELF file header.
    pub fn ehdr(&self) -> &Elf32Ehdr {
        unsafe { &*(self.bytes().as_ptr() as *const Elf32Ehdr) }
    }

    fn phdr_at(&self, i: usize) -> &Elf32Phdr {
        let ehdr = self.ehdr();
        let off = ehdr.e_phoff as usize + i * ehdr.e_phentsize as usize;
        unsafe { &*(self.bytes()[off..].as_ptr() as *const Elf32Phdr) }
    }

    /// Iterates the program headers in file order.
    pub fn program_headers(&self) -> impl Iterator<Item = &Elf32Phdr> {
        (0..self.ehdr().e_phnum as usize).map(move |i| self.phdr_at(i))
    }

    fn shdr_at(&self, i: usize) -> &Elf32Shdr {
        let ehdr = self.ehdr();
        let off = ehdr.e_shoff as usize + i * ehdr.e_shentsize as usize;
        unsafe { &*(self.bytes()[off..].as_ptr() as *const Elf32Shdr) }
    }

    fn shstrtab(&self) -> &[u8] {
        let shdr = self.shdr_at(self.ehdr().e_shstrndx as usize);
        let start = shdr.sh_offset as usize;
        let end = start + shdr.sh_size as usize;
        &self.bytes()[start..end]
    }

    fn section_name(&self, shdr: &Elf32Shdr) -> &str {
        let strtab = self.shstrtab();
        let start = shdr.sh_name as usize;
        match CStr::from_bytes_until_nul(&strtab[start..]) {
            Ok(cstr) => cstr.to_str().unwrap_or(""),
            Err(_) => "",
        }
    }

    /// Returns the section at `index`, if in range.
    pub fn section(&self, index: usize) -> Option<Section<'_>> {
        if index >= self.ehdr().e_shnum as usize {
            return None;
        }
        let header = self.shdr_at(index);
        let name = self.section_name(header);
        let data = if header.sh_type == SHT_NOBITS {
            &[]
        } else {
            let start = header.sh_offset as usize;
            let end = start + header.sh_size as usize;
            &self.bytes()[start..end]
        };
        Some(Section {
            index,
            name,
            header,
            data,
        })
    }

    /// Iterates all sections in file order.
    pub fn sections(&self) -> impl Iterator<Item = Section<'_>> {
        (0..self.ehdr().e_shnum as usize).map(move |i| self.section(i).unwrap())
    }

    /// Finds every section whose name equals `name`.
    pub fn sections_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Section<'a>> {
        self.sections().filter(move |s| s.name == name)
    }

    /// A sub-slice of the mapped file, for readers that need a raw
    /// byte range rather than a whole section (e.g. the relocation
    /// decoder reading a target instruction word).
    pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.bytes().get(offset..offset + len)
    }

    pub fn symtab_entry_count(header: &Elf32Shdr) -> usize {
        header.sh_size as usize / SYM_SIZE
    }
}

const _: () = assert!(size_of::<Elf32Ehdr>() == EHDR_SIZE);
const _: () = assert!(size_of::<Elf32Phdr>() == PHDR_SIZE);
const _: () = assert!(size_of::<Elf32Shdr>() == SHDR_SIZE);
const _: () = assert!(size_of::<Elf32Sym>() == SYM_SIZE);
