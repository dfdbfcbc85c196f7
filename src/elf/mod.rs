//! ELF32 ARM container parsing: raw struct layouts plus a mmap-backed
//! reader exposing sections and program headers.

pub mod defs;
pub mod reader;

pub use defs::{Elf32Ehdr, Elf32Phdr, Elf32Rel, Elf32Shdr, Elf32Sym};
pub use reader::{ElfReader, Section};
