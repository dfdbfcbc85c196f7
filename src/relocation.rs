//! REL relocation decoding: the core of the core.
//!
//! Unlike a conventional RELA-based linker, this toolchain keeps the
//! addend folded into the instruction bytes at the relocation site. To
//! recover it, the decoder has to read the target instruction, decode it
//! per its ARM/THUMB encoding to get the *target value* the instruction
//! currently encodes, and subtract the (possibly masked) symbol value.
//!
//! The ARM relocation-type constants used here are declared locally
//! rather than pulled from `elf::abi`: see `DESIGN.md` for why (the
//! THUMB/MOVW/MOVT constants this format needs aren't guaranteed present
//! in the upstream crate's generic ABI module, the same reason the
//! teacher crate declares its own ARM relocation table in
//! `src/arch/arm.rs` instead of assuming upstream coverage).

use elf::abi::SHT_REL;

use crate::elf::defs::REL_SIZE;
use crate::elf::reader::Section;
use crate::elf::Elf32Rel;
use crate::error::{relocation_error, structure_error, Result};
use crate::symbol::SymbolTable;

pub const R_ARM_NONE: u32 = 0;
pub const R_ARM_ABS32: u32 = 2;
pub const R_ARM_REL32: u32 = 3;
pub const R_ARM_CALL: u32 = 28;
pub const R_ARM_JUMP24: u32 = 29;
pub const R_ARM_THM_CALL: u32 = 10;
pub const R_ARM_THM_JUMP24: u32 = 30;
pub const R_ARM_THM_PC11: u32 = 102;
pub const R_ARM_V4BX: u32 = 40;
pub const R_ARM_TARGET1: u32 = 38;
pub const R_ARM_TARGET2: u32 = 41;
pub const R_ARM_PREL31: u32 = 42;
pub const R_ARM_MOVW_ABS_NC: u32 = 43;
pub const R_ARM_MOVT_ABS: u32 = 44;
pub const R_ARM_THM_MOVW_ABS_NC: u32 = 47;
pub const R_ARM_THM_MOVT_ABS: u32 = 48;

/// How a relocation type is treated by the decoder, per `spec.md` §4.4
/// step 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Normal,
    Ignore,
    Invalid,
}

fn classify(r_type: u32) -> Classification {
    match r_type {
        R_ARM_NONE | R_ARM_V4BX => Classification::Ignore,
        R_ARM_ABS32
        | R_ARM_TARGET1
        | R_ARM_REL32
        | R_ARM_TARGET2
        | R_ARM_PREL31
        | R_ARM_CALL
        | R_ARM_JUMP24
        | R_ARM_MOVW_ABS_NC
        | R_ARM_MOVT_ABS
        | R_ARM_THM_CALL
        | R_ARM_THM_MOVW_ABS_NC
        | R_ARM_THM_MOVT_ABS => Classification::Normal,
        _ => Classification::Invalid,
    }
}

/// Swaps the two 16-bit halfwords of a 32-bit word, because THUMB-2
/// instructions are stored in memory order (low halfword first) rather
/// than the numeric order the BL/MOVW/MOVT bitfields assume.
#[inline]
pub fn thumb_shuffle(x: u32) -> u32 {
    ((x & 0xFFFF_0000) >> 16) | ((x & 0x0000_FFFF) << 16)
}

/// One decoded relocation. `addend` is reconstructed from the
/// instruction bytes, never read from the file (REL format has no
/// addend field).
#[derive(Debug, Clone, Copy)]
pub struct RelocationEntry {
    pub offset: u32,
    pub r_type: u32,
    /// `None` for `Ignore`-classified entries (`R_ARM_NONE`, `R_ARM_V4BX`).
    pub symbol: Option<usize>,
    pub addend: i32,
}

/// Every relocation decoded from one REL section, tagged with the
/// section index the relocations apply to.
#[derive(Debug)]
pub struct RelocationTable {
    pub target_section: usize,
    pub entries: Vec<RelocationEntry>,
}

const _: () = assert!(std::mem::size_of::<Elf32Rel>() == REL_SIZE);

/// Decodes every entry of a REL section into a fresh [`RelocationTable`].
///
/// `target` is the section the relocations apply to (identified by the
/// REL section header's `sh_info`); its data is read for the in-place
/// instruction words. On any failure, nothing is returned — the caller
/// is responsible for not appending a partial table to the binary.
pub fn decode_rel_section(
    rel: &Section<'_>,
    target: &Section<'_>,
    symbols: &SymbolTable,
) -> Result<RelocationTable> {
    if rel.header.sh_type != SHT_REL {
        return Err(structure_error("expected a SHT_REL section"));
    }

    if rel.data.len() % REL_SIZE != 0 {
        return Err(relocation_error(format!(
            "REL section size is not a multiple of {REL_SIZE}"
        )));
    }

    let mut entries = Vec::with_capacity(rel.data.len() / REL_SIZE);
    for chunk in rel.data.chunks_exact(REL_SIZE) {
        // Same raw-struct-over-bytes cast `SymbolTable::load` uses for
        // `Elf32Sym`; REL entries are two little-endian u32 words with no
        // alignment requirement beyond that of `u32` itself.
        let raw: &Elf32Rel = unsafe { &*(chunk.as_ptr() as *const Elf32Rel) };
        let r_offset = raw.r_offset;
        let sym = raw.r_sym();
        let mut r_type = raw.r_type();

        if r_type == R_ARM_THM_JUMP24 {
            r_type = R_ARM_THM_CALL;
        }
        if r_type == R_ARM_THM_PC11 {
            continue;
        }

        match classify(r_type) {
            Classification::Ignore => {
                entries.push(RelocationEntry {
                    offset: r_offset,
                    r_type,
                    symbol: None,
                    addend: 0,
                });
            }
            Classification::Invalid => {
                return Err(relocation_error(format!(
                    "unsupported relocation type {r_type}"
                )));
            }
            Classification::Normal => {
                let sym = sym as usize;
                if sym >= symbols.len() {
                    return Err(relocation_error(format!(
                        "relocation symbol index {sym} out of range"
                    )));
                }
                let symbol = symbols.get(sym).unwrap();

                let in_section_off = r_offset
                    .checked_sub(target.header.sh_addr)
                    .ok_or_else(|| {
                        relocation_error("relocation offset precedes target section")
                    })? as usize;
                let word_bytes = target
                    .data
                    .get(in_section_off..in_section_off + 4)
                    .ok_or_else(|| {
                        relocation_error("relocation offset out of range of target section")
                    })?;
                let d = u32::from_le_bytes(word_bytes.try_into().unwrap());

                let target_value = decode_target(r_type, d, r_offset);
                let addend = target_value.wrapping_sub(adjusted_symbol_value(r_type, symbol.value));

                entries.push(RelocationEntry {
                    offset: r_offset,
                    r_type,
                    symbol: Some(sym),
                    addend: addend as i32,
                });
            }
        }
    }

    Ok(RelocationTable {
        target_section: target.index,
        entries,
    })
}

/// Computes the target value an instruction currently encodes, given
/// the raw word `d` read from the text and the instruction's guest
/// address `a`. See `spec.md` §4.4's decoding table.
fn decode_target(r_type: u32, d: u32, a: u32) -> u32 {
    match r_type {
        R_ARM_ABS32 | R_ARM_TARGET1 => d,
        R_ARM_REL32 | R_ARM_TARGET2 | R_ARM_PREL31 => d.wrapping_add(a),
        R_ARM_CALL | R_ARM_JUMP24 => {
            let imm24 = d & 0x00FF_FFFF;
            let signed = sign_extend(imm24 << 2, 26);
            (signed as u32).wrapping_add(a)
        }
        R_ARM_MOVW_ABS_NC => ((d & 0xF_0000) >> 4) | (d & 0xFFF),
        R_ARM_MOVT_ABS => (((d & 0xF_0000) >> 4) | (d & 0xFFF)) << 16,
        R_ARM_THM_CALL => decode_thm_call(d, a),
        R_ARM_THM_MOVW_ABS_NC => decode_thm_movw(d),
        R_ARM_THM_MOVT_ABS => decode_thm_movw(d) << 16,
        _ => 0xDEAD_BEEF,
    }
}

/// Sign-extends the low `bits` bits of `value` to a full 32-bit signed
/// integer, then returns the bit pattern as `i32`.
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn decode_thm_call(d: u32, a: u32) -> u32 {
    let d = thumb_shuffle(d);

    // ARMv7-M BL encoding T1, split across two 16-bit halfwords:
    //   hi: [15:10]=0b11110 S imm10    lo: [15:11]=0b11 J1 1 J2 imm11
    let sign = (d >> 26) & 1;
    let j1 = (d >> 13) & 1;
    let j2 = (d >> 11) & 1;
    let imm10 = (d >> 16) & 0x3FF;
    let imm11 = d & 0x7FF;

    let i1 = !(j1 ^ sign) & 1;
    let i2 = !(j2 ^ sign) & 1;

    let mut offset = imm11 | (imm10 << 11) | (i2 << 21) | (i1 << 22) | (sign << 23);
    offset <<= 1;
    if sign != 0 {
        offset |= 0xFF00_0000;
    }
    offset.wrapping_add(a)
}

fn decode_thm_movw(d: u32) -> u32 {
    let d = thumb_shuffle(d);
    (((d >> 16) & 0xF) << 12) | (((d >> 26) & 1) << 11) | (((d >> 12) & 7) << 8) | (d & 0xFF)
}

/// Masks the raw symbol value per `spec.md` §4.4's addend-adjustment
/// table, so the addend doesn't absorb bits that belong to the
/// relocation's encoding rather than the symbol's address.
fn adjusted_symbol_value(r_type: u32, value: u32) -> u32 {
    match r_type {
        R_ARM_MOVT_ABS | R_ARM_THM_MOVT_ABS => value & 0xFFFF_0000,
        R_ARM_MOVW_ABS_NC | R_ARM_THM_MOVW_ABS_NC => value & 0x0000_FFFF,
        R_ARM_THM_CALL => value & 0xFFFF_FFFE,
        _ => value,
    }
}
