//! `Binary`: the root aggregate produced by loading one input ELF file.
//!
//! Construction follows the data flow in `spec.md` §2: the ELF reader
//! feeds the symbol loader, the two stub loaders, and the relocation
//! decoder; the binder then attaches qualifying symbols to stubs. Import
//! resolution (§4.7) is a separate, non-fatal step the caller drives
//! afterward via [`Binary::resolve`], since unresolved imports are
//! warnings rather than load failures.
//!
//! Mirrors the teacher's construct-once entry point (`src/loader.rs`'s
//! `Loader` building an `ElfDylib`): one fallible `load` function builds
//! every owned array up front, after which the `Binary` is read-only for
//! the rest of its life.

use std::path::Path;

use elf::abi::{PT_LOAD, SHT_NOBITS, SHT_PROGBITS, SHT_REL, SHT_RELA, SHT_SYMTAB};

use crate::catalogue::{resolve_stubs, Catalogue};
use crate::diag::DiagnosticSink;
use crate::elf::reader::ElfReader;
use crate::error::{structure_error, Result};
use crate::relocation::{decode_rel_section, RelocationTable};
use crate::segment::SegmentMap;
use crate::stub::{bind_stubs, StubArray, StubKind, FSTUBS_SECTION, VSTUBS_SECTION};
use crate::symbol::SymbolTable;

/// Section names whose presence is a fatal "strip your debug info" error,
/// per `spec.md` §6.
const FORBIDDEN_DEBUG_RELOC_SECTIONS: &[&str] = &[
    ".rel.debug_info",
    ".rel.debug_arange",
    ".rel.debug_line",
    ".rel.debug_frame",
];

/// The fully loaded, validated representation of one input binary.
/// Read-only after construction; see module docs for the construction
/// order.
pub struct Binary {
    reader: ElfReader,
    symbols: SymbolTable,
    fstubs: StubArray,
    vstubs: StubArray,
    relocations: Vec<RelocationTable>,
    segments: SegmentMap,
}

impl Binary {
    /// Loads and validates `path`, building every owned structure the
    /// rest of the pipeline needs. On any fatal error, no `Binary` is
    /// returned and any partial state constructed so far is dropped.
    pub fn load(path: impl AsRef<Path>, sink: &mut dyn DiagnosticSink) -> Result<Binary> {
        let reader = ElfReader::open(path)?;

        reject_debug_relocations(&reader)?;

        let mut symbols = SymbolTable::default();
        let mut symtab_section = None;
        for section in reader.sections() {
            if section.header.sh_type == SHT_SYMTAB {
                if symtab_section.is_some() && symtab_section != Some(section.index) {
                    return Err(structure_error("more than one symbol table section present"));
                }
                symtab_section = Some(section.index);
            }
        }
        let symtab_section =
            symtab_section.ok_or_else(|| structure_error("no symbol table section present"))?;
        symbols.load(&reader, symtab_section)?;

        let mut fstubs = StubArray::default();
        let mut vstubs = StubArray::default();
        for section in reader.sections_named(FSTUBS_SECTION) {
            fstubs.load(&section, StubKind::Function, FSTUBS_SECTION)?;
        }
        for section in reader.sections_named(VSTUBS_SECTION) {
            vstubs.load(&section, StubKind::Variable, VSTUBS_SECTION)?;
        }
        if fstubs.section_index.is_none() && vstubs.section_index.is_none() {
            return Err(structure_error(
                "neither .vitalink.fstubs nor .vitalink.vstubs is present",
            ));
        }

        let mut relocations = Vec::new();
        for section in reader.sections() {
            if section.header.sh_type == SHT_RELA {
                return Err(structure_error(
                    "RELA relocation sections are not supported by this runtime",
                ));
            }
            if section.header.sh_type != SHT_REL {
                continue;
            }
            let target_index = section.header.sh_info as usize;
            let target = reader
                .section(target_index)
                .ok_or_else(|| structure_error("REL section targets a nonexistent section"))?;
            let table = decode_rel_section(&section, &target, &symbols)?;
            relocations.push(table);
        }
        if relocations.is_empty() {
            return Err(structure_error("no relocation tables present"));
        }

        bind_stubs(&mut fstubs, &mut vstubs, &symbols, sink)?;

        let segments = SegmentMap::build(reader.program_headers().copied())?;

        Ok(Binary {
            reader,
            symbols,
            fstubs,
            vstubs,
            relocations,
            segments,
        })
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn function_stubs(&self) -> &StubArray {
        &self.fstubs
    }

    pub fn variable_stubs(&self) -> &StubArray {
        &self.vstubs
    }

    pub fn relocation_tables(&self) -> &[RelocationTable] {
        &self.relocations
    }

    pub fn segments(&self) -> &SegmentMap {
        &self.segments
    }

    pub fn reader(&self) -> &ElfReader {
        &self.reader
    }

    /// Resolves every bound stub's NID triple against `catalogues`.
    /// Unresolved stubs are reported through `sink` and do not fail the
    /// call; returns whether every stub resolved.
    pub fn resolve(&mut self, catalogues: &[&dyn Catalogue], sink: &mut dyn DiagnosticSink) -> bool {
        let f = resolve_stubs(
            self.fstubs.stubs.iter_mut(),
            StubKind::Function,
            catalogues,
            sink,
        );
        let v = resolve_stubs(
            self.vstubs.stubs.iter_mut(),
            StubKind::Variable,
            catalogues,
            sink,
        );
        f && v
    }
}

fn reject_debug_relocations(reader: &ElfReader) -> Result<()> {
    for section in reader.sections() {
        if FORBIDDEN_DEBUG_RELOC_SECTIONS.contains(&section.name) {
            return Err(structure_error(format!(
                "{} present; strip debug info before loading (e.g. `arm-none-eabi-strip --strip-debug`)",
                section.name
            )));
        }
    }
    Ok(())
}

// Referenced to keep the PT_LOAD/PROGBITS/NOBITS imports honest for
// callers grepping for the constants this module depends on; segment
// classification itself lives in `segment.rs`.
#[allow(dead_code)]
const _: (u32, u32, u32) = (PT_LOAD, SHT_PROGBITS, SHT_NOBITS);


#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::VecSink;
    use std::io::Write;

    fn le32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    /// Hand-assembles a minimal valid ELF32 ARM LE file on disk: one
    /// symtab (null entry + one global function symbol "foo"), one
    /// `.vitalink.fstubs` section holding a single stub at the symbol's
    /// address, one `.text` section with a single `R_ARM_ABS32`
    /// relocation site, and one `PT_LOAD` program header. Matches
    /// end-to-end scenario 1/2 from `spec.md` §8.
    struct Fixture {
        path: std::path::PathBuf,
    }

    impl Fixture {
        fn write(name: &str) -> Fixture {
            Fixture::write_with_rel_type(name, SHT_REL)
        }

        fn write_with_rel_type(name: &str, rel_sh_type: u32) -> Fixture {
            let text_vaddr = 0x82000u32;
            let fstubs_vaddr = 0x90000u32;

            let ehdr_size = 0x34usize;
            let text_off = ehdr_size;
            let fstubs_off = text_off + 16;
            let symtab_off = fstubs_off + 16;
            let rel_off = symtab_off + 32;
            let strtab_off = rel_off + 8;

            let mut bytes = vec![0u8; strtab_off];

            // --- ELF header (Elf32_Ehdr layout, see elf/defs.rs) ---
            bytes[0..4].copy_from_slice(&elf::abi::ELFMAG);
            bytes[elf::abi::EI_CLASS] = elf::abi::ELFCLASS32;
            bytes[elf::abi::EI_DATA] = elf::abi::ELFDATA2LSB;
            bytes[elf::abi::EI_VERSION] = elf::abi::EV_CURRENT;
            bytes[0x10..0x12].copy_from_slice(&2u16.to_le_bytes()); // e_type = ET_EXEC
            bytes[0x12..0x14].copy_from_slice(&elf::abi::EM_ARM.to_le_bytes());
            bytes[0x14..0x18].copy_from_slice(&1u32.to_le_bytes()); // e_version

            // --- .text: word 0x90004 at the relocation site (ABS32 target) ---
            bytes[text_off..text_off + 4].copy_from_slice(&le32(0x90004));

            // --- .vitalink.fstubs: one stub record ---
            bytes[fstubs_off..fstubs_off + 4].copy_from_slice(&le32(0));
            bytes[fstubs_off + 4..fstubs_off + 8].copy_from_slice(&le32(0xDEADBEEF));
            bytes[fstubs_off + 8..fstubs_off + 12].copy_from_slice(&le32(0x12345678));
            bytes[fstubs_off + 12..fstubs_off + 16].copy_from_slice(&le32(0xCAFEBABE));

            // --- symtab: entry 0 is the null symbol, entry 1 is global func "foo" ---
            let sym1_off = symtab_off + 16;
            bytes[sym1_off..sym1_off + 4].copy_from_slice(&le32(1)); // st_name -> strtab[1]
            bytes[sym1_off + 4..sym1_off + 8].copy_from_slice(&le32(fstubs_vaddr));
            bytes[sym1_off + 8..sym1_off + 12].copy_from_slice(&le32(0));
            let info = (elf::abi::STB_GLOBAL << 4) | elf::abi::STT_FUNC;
            bytes[sym1_off + 12] = info;
            bytes[sym1_off + 13] = 0;
            bytes[sym1_off + 14..sym1_off + 16].copy_from_slice(&2u16.to_le_bytes()); // st_shndx = fstubs section index

            // --- rel: one R_ARM_ABS32 against symbol #1, offset = text_vaddr ---
            bytes[rel_off..rel_off + 4].copy_from_slice(&le32(text_vaddr));
            let r_info = (1u32 << 8) | crate::relocation::R_ARM_ABS32;
            bytes[rel_off + 4..rel_off + 8].copy_from_slice(&le32(r_info));

            // --- strtab: "\0foo\0" ---
            let strtab: &[u8] = b"\0foo\0";
            bytes.extend_from_slice(strtab);

            // --- shstrtab ---
            let names: &[&str] = &[
                ".text",
                ".vitalink.fstubs",
                ".symtab",
                ".strtab",
                ".rel.text",
                ".shstrtab",
            ];
            let mut name_offsets = Vec::new();
            let mut shstrtab = vec![0u8];
            for n in names {
                name_offsets.push(shstrtab.len() as u32);
                shstrtab.extend_from_slice(n.as_bytes());
                shstrtab.push(0);
            }
            let shstrtab_off = bytes.len();
            bytes.extend_from_slice(&shstrtab);

            // --- program header: one PT_LOAD covering the fstubs vaddr range ---
            let phdr_off = bytes.len();
            let mut phdr = vec![0u8; 0x20];
            phdr[0..4].copy_from_slice(&elf::abi::PT_LOAD.to_le_bytes());
            phdr[8..12].copy_from_slice(&le32(fstubs_vaddr));
            phdr[16..20].copy_from_slice(&le32(0x1000));
            phdr[20..24].copy_from_slice(&le32(0x1000));
            bytes.extend_from_slice(&phdr);

            // --- section headers: 0 null, 1 .text, 2 .fstubs, 3 .symtab, 4 .strtab, 5 .rel.text, 6 .shstrtab ---
            let shdr_off = bytes.len();
            let mk_shdr = |name_off: u32,
                           sh_type: u32,
                           sh_addr: u32,
                           sh_offset: u32,
                           sh_size: u32,
                           sh_link: u32,
                           sh_info: u32|
             -> Vec<u8> {
                let mut h = vec![0u8; 0x28];
                h[0..4].copy_from_slice(&name_off.to_le_bytes());
                h[4..8].copy_from_slice(&sh_type.to_le_bytes());
                h[12..16].copy_from_slice(&sh_addr.to_le_bytes());
                h[16..20].copy_from_slice(&sh_offset.to_le_bytes());
                h[20..24].copy_from_slice(&sh_size.to_le_bytes());
                h[24..28].copy_from_slice(&sh_link.to_le_bytes());
                h[28..32].copy_from_slice(&sh_info.to_le_bytes());
                h
            };

            let mut shdrs = vec![vec![0u8; 0x28]];
            shdrs.push(mk_shdr(
                name_offsets[0],
                SHT_PROGBITS,
                text_vaddr,
                text_off as u32,
                16,
                0,
                0,
            ));
            shdrs.push(mk_shdr(
                name_offsets[1],
                SHT_PROGBITS,
                fstubs_vaddr,
                fstubs_off as u32,
                16,
                0,
                0,
            ));
            shdrs.push(mk_shdr(
                name_offsets[2],
                SHT_SYMTAB,
                0,
                symtab_off as u32,
                32,
                4, // sh_link -> .strtab section index
                1,
            ));
            shdrs.push(mk_shdr(
                name_offsets[3],
                elf::abi::SHT_STRTAB,
                0,
                strtab_off as u32,
                strtab.len() as u32,
                0,
                0,
            ));
            shdrs.push(mk_shdr(
                name_offsets[4],
                rel_sh_type,
                0,
                rel_off as u32,
                8,
                3, // sh_link -> .symtab section index
                1, // sh_info -> .text section index
            ));
            shdrs.push(mk_shdr(
                name_offsets[5],
                elf::abi::SHT_STRTAB,
                0,
                shstrtab_off as u32,
                shstrtab.len() as u32,
                0,
                0,
            ));

            for shdr in &shdrs {
                bytes.extend_from_slice(shdr);
            }

            // --- finish the ELF header fields that depend on layout computed above ---
            write_ehdr_tail(&mut bytes, shdr_off, phdr_off);

            let path = std::env::temp_dir().join(name);
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(&bytes).unwrap();
            Fixture { path }
        }
    }

    /// Writes the fields after `e_version` using the exact byte offsets
    /// of `Elf32Ehdr` in `elf/defs.rs`, to avoid hand-computing overlap.
    fn write_ehdr_tail(bytes: &mut [u8], shdr_off: usize, phdr_off: usize) {
        // e_ident: 16, e_type: 2, e_machine: 2, e_version: 4 -> offset 24
        let mut off = 24;
        bytes[off..off + 4].copy_from_slice(&0u32.to_le_bytes()); // e_entry
        off += 4;
        bytes[off..off + 4].copy_from_slice(&(phdr_off as u32).to_le_bytes()); // e_phoff
        off += 4;
        bytes[off..off + 4].copy_from_slice(&(shdr_off as u32).to_le_bytes()); // e_shoff
        off += 4;
        bytes[off..off + 4].copy_from_slice(&0u32.to_le_bytes()); // e_flags
        off += 4;
        bytes[off..off + 2].copy_from_slice(&0x34u16.to_le_bytes()); // e_ehsize
        off += 2;
        bytes[off..off + 2].copy_from_slice(&0x20u16.to_le_bytes()); // e_phentsize
        off += 2;
        bytes[off..off + 2].copy_from_slice(&1u16.to_le_bytes()); // e_phnum
        off += 2;
        bytes[off..off + 2].copy_from_slice(&0x28u16.to_le_bytes()); // e_shentsize
        off += 2;
        bytes[off..off + 2].copy_from_slice(&7u16.to_le_bytes()); // e_shnum
        off += 2;
        bytes[off..off + 2].copy_from_slice(&6u16.to_le_bytes()); // e_shstrndx
    }

    #[test]
    fn loads_a_minimal_valid_binary() {
        let fixture = Fixture::write("vitalink_core_test_minimal.bin");
        let mut sink = VecSink::default();
        let binary = Binary::load(&fixture.path, &mut sink).unwrap();

        assert_eq!(binary.symbols().len(), 2);
        assert_eq!(binary.function_stubs().stubs.len(), 1);
        assert!(binary.variable_stubs().is_empty());

        let stub = &binary.function_stubs().stubs[0];
        assert_eq!(stub.addr, 0x90000);
        assert_eq!(stub.library_nid, 0xDEADBEEF);
        assert!(stub.symbol.is_some());
        assert_eq!(
            binary.symbols().get(stub.symbol.unwrap()).unwrap().name,
            "foo"
        );

        assert_eq!(binary.relocation_tables().len(), 1);
        let entry = &binary.relocation_tables()[0].entries[0];
        assert_eq!(entry.addend, 4);

        std::fs::remove_file(&fixture.path).ok();
    }

    #[test]
    fn rejects_a_non_elf_file() {
        let path = std::env::temp_dir().join("vitalink_core_test_not_elf.bin");
        std::fs::write(&path, b"not an elf file at all, padded to be long enough.....").unwrap();
        let mut sink = VecSink::default();
        let err = Binary::load(&path, &mut sink).unwrap_err();
        assert!(matches!(err, crate::error::Error::Format { .. }));
        std::fs::remove_file(&path).ok();
    }

    /// A bare, otherwise-empty ELF whose only non-null section is named
    /// `.rel.debug_info`, to exercise the early debug-relocation reject
    /// path (`spec.md` §8 end-to-end scenario 5) before the loader even
    /// gets to requiring a symbol table.
    fn write_debug_section_fixture(name: &str) -> std::path::PathBuf {
        let ehdr_size = 0x34usize;
        let mut bytes = vec![0u8; ehdr_size];

        bytes[0..4].copy_from_slice(&elf::abi::ELFMAG);
        bytes[elf::abi::EI_CLASS] = elf::abi::ELFCLASS32;
        bytes[elf::abi::EI_DATA] = elf::abi::ELFDATA2LSB;
        bytes[elf::abi::EI_VERSION] = elf::abi::EV_CURRENT;
        bytes[0x10..0x12].copy_from_slice(&2u16.to_le_bytes());
        bytes[0x12..0x14].copy_from_slice(&elf::abi::EM_ARM.to_le_bytes());
        bytes[0x14..0x18].copy_from_slice(&1u32.to_le_bytes());

        let shstrtab_off = bytes.len();
        let shstrtab: &[u8] = b"\0.rel.debug_info\0.shstrtab\0";
        bytes.extend_from_slice(shstrtab);

        let shdr_off = bytes.len();
        let mk_shdr = |name_off: u32, sh_offset: u32, sh_size: u32| -> Vec<u8> {
            let mut h = vec![0u8; 0x28];
            h[0..4].copy_from_slice(&name_off.to_le_bytes());
            h[4..8].copy_from_slice(&SHT_PROGBITS.to_le_bytes());
            h[16..20].copy_from_slice(&sh_offset.to_le_bytes());
            h[20..24].copy_from_slice(&sh_size.to_le_bytes());
            h
        };
        let mut shdrs = vec![vec![0u8; 0x28]];
        shdrs.push(mk_shdr(1, 0, 0));
        shdrs.push(mk_shdr(17, shstrtab_off as u32, shstrtab.len() as u32));
        for shdr in &shdrs {
            bytes.extend_from_slice(shdr);
        }

        write_ehdr_tail(&mut bytes, shdr_off, 0);
        // e_phnum is part of write_ehdr_tail's fixed fields; override to 0.
        bytes[0x2C..0x2E].copy_from_slice(&0u16.to_le_bytes());
        bytes[0x30..0x32].copy_from_slice(&3u16.to_le_bytes()); // e_shnum
        bytes[0x32..0x34].copy_from_slice(&2u16.to_le_bytes()); // e_shstrndx

        let path = std::env::temp_dir().join(name);
        std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();
        path
    }

    #[test]
    fn rejects_rela_relocation_sections() {
        let fixture = Fixture::write_with_rel_type("vitalink_core_test_rela.bin", SHT_RELA);
        let mut sink = VecSink::default();
        let err = Binary::load(&fixture.path, &mut sink).unwrap_err();
        assert!(matches!(err, crate::error::Error::Structure { .. }));
        std::fs::remove_file(&fixture.path).ok();
    }

    #[test]
    fn rejects_debug_relocation_sections() {
        let path = write_debug_section_fixture("vitalink_core_test_debug_reloc.bin");
        let mut sink = VecSink::default();
        let err = Binary::load(&path, &mut sink).unwrap_err();
        assert!(matches!(err, crate::error::Error::Structure { .. }));
        assert!(err.to_string().contains("strip"));
        std::fs::remove_file(&path).ok();
    }
}
