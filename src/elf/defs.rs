//! Raw ELF32 struct layouts and header validation.
//!
//! The upstream `elf` crate's raw structs are oriented around its
//! generic 32/64-bit abstraction and don't expose a `#[repr(C)]` ELF32
//! symbol layout matching the on-disk field order, so the structs this
//! crate actually reads off the mmap are declared locally, the same way
//! the teacher crate declares its own `Elf32Sym` for exactly this reason.
//! Generic constants (magic, class, machine, section/symbol types) come
//! from `elf::abi`.

use crate::error::{format_error, Result};
use elf::abi::{
    EI_CLASS, EI_DATA, EI_VERSION, ELFCLASS32, ELFDATA2LSB, ELFMAG, EM_ARM, EV_CURRENT,
};

pub const EHDR_SIZE: usize = 0x34;
pub const PHDR_SIZE: usize = 0x20;
pub const SHDR_SIZE: usize = 0x28;
pub const SYM_SIZE: usize = 0x10;
pub const REL_SIZE: usize = 0x08;

/// 32-bit ELF file header (`Elf32_Ehdr`).
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Elf32Ehdr {
    pub e_ident: [u8; 16],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// 32-bit ELF program header (`Elf32_Phdr`).
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Elf32Phdr {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_paddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
    pub p_align: u32,
}

/// 32-bit ELF section header (`Elf32_Shdr`).
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Elf32Shdr {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u32,
    pub sh_addr: u32,
    pub sh_offset: u32,
    pub sh_size: u32,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u32,
    pub sh_entsize: u32,
}

/// 32-bit ELF symbol table entry (`Elf32_Sym`). Field order differs from
/// the 64-bit layout (`name, value, size, info, other, shndx` rather than
/// `name, info, other, shndx, value, size`).
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Elf32Sym {
    pub st_name: u32,
    pub st_value: u32,
    pub st_size: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
}

/// 32-bit REL relocation entry (`Elf32_Rel`); no explicit addend field.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Elf32Rel {
    pub r_offset: u32,
    pub r_info: u32,
}

impl Elf32Rel {
    #[inline]
    pub fn r_sym(&self) -> u32 {
        self.r_info >> 8
    }

    #[inline]
    pub fn r_type(&self) -> u32 {
        self.r_info & 0xff
    }
}

impl Elf32Sym {
    #[inline]
    pub fn st_bind(&self) -> u8 {
        self.st_info >> 4
    }

    #[inline]
    pub fn st_type(&self) -> u8 {
        self.st_info & 0xf
    }
}

/// Validates that the bytes at the front of the mmap are a supported
/// ELF header: ELF32, ARM, little-endian, current version.
pub(crate) fn validate_header(ehdr: &Elf32Ehdr) -> Result<()> {
    if ehdr.e_ident[0..4] != ELFMAG[..] {
        return Err(format_error("not an ELF file (bad magic)"));
    }
    if ehdr.e_ident[EI_CLASS] != ELFCLASS32 {
        return Err(format_error("not a 32-bit ELF file"));
    }
    if ehdr.e_ident[EI_DATA] != ELFDATA2LSB {
        return Err(format_error("not a little-endian ELF file"));
    }
    if ehdr.e_ident[EI_VERSION] != EV_CURRENT {
        return Err(format_error("unsupported ELF version"));
    }
    if ehdr.e_machine != EM_ARM {
        return Err(format_error("not an ARM ELF file"));
    }
    Ok(())
}
