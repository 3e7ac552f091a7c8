//! CodeView symbol records, as found in the global symbol stream and the
//! per-module symbol streams.

use crate::parser::{Parser, ParserError};
use crate::types::TypeIndex;
use bstr::ByteSlice;
use std::mem::size_of;
use tracing::warn;
use zerocopy::byteorder::{LE, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Identifies symbol records.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SymKind(pub u16);

macro_rules! sym_kinds {
    (
        $(
            $code:expr, $name:ident ;
        )*
    ) => {
        #[allow(missing_docs)]
        impl SymKind {
            $(
                pub const $name: SymKind = SymKind($code);
            )*
        }

        static SYM_NAMES: &[(SymKind, &str)] = &[
            $(
                (SymKind($code), stringify!($name)),
            )*
        ];
    }
}

sym_kinds! {
    0x0006, S_END;
    0x1009, S_PUB32_ST;
    0x1107, S_CONSTANT;
    0x1108, S_UDT;
    0x110c, S_LDATA32;
    0x110d, S_GDATA32;
    0x110e, S_PUB32;
    0x110f, S_LPROC32;
    0x1110, S_GPROC32;
    0x1112, S_LTHREAD32;
    0x1113, S_GTHREAD32;
    0x1125, S_PROCREF;
    0x1127, S_LPROCREF;
}

impl std::fmt::Debug for SymKind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some((_, name)) = SYM_NAMES.iter().find(|(kind, _)| kind == self) {
            fmt.write_str(name)
        } else {
            write!(fmt, "SymKind(0x{:04x})", self.0)
        }
    }
}

/// Stores an `offset` and `segment` pair, in that order. This structure is
/// directly embedded in on-disk symbol records.
#[derive(Copy, Clone, Default, Eq, PartialEq, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct OffsetSegment {
    /// The offset in bytes of a symbol within a segment.
    pub offset: U32<LE>,
    /// The 1-based segment (section) index.
    pub segment: U16<LE>,
}

impl std::fmt::Debug for OffsetSegment {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{:04x}:{:08x}", self.segment.get(), self.offset.get())
    }
}

/// Points to one symbol record in memory and gives its kind.
pub struct Sym<'a> {
    /// The kind of the symbol.
    pub kind: SymKind,
    /// The contents of the record, excluding the `len` and `kind` fields.
    pub data: &'a [u8],
}

/// Iterates length-prefixed symbol records: `[len u16][kind u16][payload]`,
/// where `len` counts the kind and the payload.
pub struct SymIter<'a> {
    rest: &'a [u8],
}

impl<'a> SymIter<'a> {
    #[allow(missing_docs)]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }
}

impl<'a> Iterator for SymIter<'a> {
    type Item = Sym<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < 4 {
            return None;
        }

        let len = u16::from_le_bytes([self.rest[0], self.rest[1]]) as usize;
        if len < 2 {
            warn!("symbol record with zero-length payload; stopping");
            return None;
        }
        if 2 + len > self.rest.len() {
            warn!("symbol record extends beyond its stream; stopping");
            return None;
        }

        let kind = SymKind(u16::from_le_bytes([self.rest[2], self.rest[3]]));
        let data = &self.rest[4..2 + len];
        self.rest = &self.rest[2 + len..];

        Some(Sym { kind, data })
    }
}

bitfield::bitfield! {
    /// The flag word of an `S_PUB32` record (`CV_PUBSYMFLAGS`). The wire
    /// format is one 32-bit field; this projection is advisory.
    #[derive(Copy, Clone)]
    pub struct PubFlags(u32);
    impl Debug;

    pub is_code, set_is_code: 0;
    pub is_function, set_is_function: 1;
    pub is_managed, set_is_managed: 2;
    pub is_msil, set_is_msil: 3;
}

/// Fixed part of `S_GDATA32`, `S_LDATA32`, `S_GTHREAD32`, and `S_LTHREAD32`.
#[derive(Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct DataFixed {
    pub type_: U32<LE>,
    pub offset_segment: OffsetSegment,
}

/// Decoded `S_GDATA32` / `S_LDATA32` / `S_GTHREAD32` / `S_LTHREAD32`.
#[derive(Clone, Debug)]
pub struct DataSym {
    /// The symbol's type.
    pub type_index: TypeIndex,
    /// Offset within the section.
    pub offset: u32,
    /// 1-based section index.
    pub section: u16,
    #[allow(missing_docs)]
    pub name: String,
}

impl DataSym {
    #[allow(missing_docs)]
    pub fn parse(data: &[u8]) -> Result<DataSym, ParserError> {
        let mut p = Parser::new(data);
        let fixed: &DataFixed = p.get()?;
        let name = p.strz()?;
        Ok(DataSym {
            type_index: TypeIndex(fixed.type_.get()),
            offset: fixed.offset_segment.offset.get(),
            section: fixed.offset_segment.segment.get(),
            name: name.to_str_lossy().into_owned(),
        })
    }
}

/// Fixed part of `S_PUB32`.
#[derive(Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct PubFixed {
    pub flags: U32<LE>,
    pub offset_segment: OffsetSegment,
}

/// Decoded `S_PUB32` / `S_PUB32_ST`.
#[derive(Clone, Debug)]
pub struct PubSym {
    #[allow(missing_docs)]
    pub flags: PubFlags,
    #[allow(missing_docs)]
    pub offset: u32,
    /// 1-based section index.
    pub section: u16,
    #[allow(missing_docs)]
    pub name: String,
}

impl PubSym {
    /// Parses `S_PUB32` (NUL-terminated name).
    pub fn parse(data: &[u8]) -> Result<PubSym, ParserError> {
        Self::parse_with(data, false)
    }

    /// Parses `S_PUB32_ST` (length-prefixed name).
    pub fn parse_st(data: &[u8]) -> Result<PubSym, ParserError> {
        Self::parse_with(data, true)
    }

    fn parse_with(data: &[u8], length_prefixed: bool) -> Result<PubSym, ParserError> {
        let mut p = Parser::new(data);
        let fixed: &PubFixed = p.get()?;
        let name = if length_prefixed { p.strt()? } else { p.strz()? };
        Ok(PubSym {
            flags: PubFlags(fixed.flags.get()),
            offset: fixed.offset_segment.offset.get(),
            section: fixed.offset_segment.segment.get(),
            name: name.to_str_lossy().into_owned(),
        })
    }
}

/// Decoded `S_UDT`.
#[derive(Clone, Debug)]
pub struct UdtSym {
    /// The type the name refers to.
    pub type_index: TypeIndex,
    #[allow(missing_docs)]
    pub name: String,
}

impl UdtSym {
    #[allow(missing_docs)]
    pub fn parse(data: &[u8]) -> Result<UdtSym, ParserError> {
        let mut p = Parser::new(data);
        let type_index = TypeIndex(p.u32()?);
        let name = p.strz()?;
        Ok(UdtSym {
            type_index,
            name: name.to_str_lossy().into_owned(),
        })
    }
}

/// Decoded `S_CONSTANT`. The value is an inline numeric leaf.
#[derive(Clone, Debug)]
pub struct ConstantSym {
    #[allow(missing_docs)]
    pub type_index: TypeIndex,
    #[allow(missing_docs)]
    pub value: i64,
    #[allow(missing_docs)]
    pub name: String,
}

impl ConstantSym {
    #[allow(missing_docs)]
    pub fn parse(data: &[u8]) -> Result<ConstantSym, ParserError> {
        let mut p = Parser::new(data);
        let type_index = TypeIndex(p.u32()?);
        let value = crate::types::number::read_numeric(&mut p)?;
        let name = p.strz()?;
        Ok(ConstantSym {
            type_index,
            value,
            name: name.to_str_lossy().into_owned(),
        })
    }
}

/// Fixed part of `S_PROCREF` / `S_LPROCREF`.
#[derive(Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct RefSym2Fixed {
    /// Checksum of the name; set to zero in practice.
    pub name_checksum: U32<LE>,
    /// Byte offset of the referenced symbol within its module stream.
    pub symbol_offset: U32<LE>,
    /// The 1-based index of the module containing the referenced symbol.
    pub module_index: U16<LE>,
}

/// Decoded `S_PROCREF` / `S_LPROCREF`: a cross-reference from the global
/// stream into a module's symbol stream.
#[derive(Clone, Debug)]
pub struct ProcRefSym {
    #[allow(missing_docs)]
    pub name_checksum: u32,
    /// Byte offset of the referenced symbol within its module stream.
    pub symbol_offset: u32,
    /// 1-based module index.
    pub module_index: u16,
    #[allow(missing_docs)]
    pub name: String,
}

impl ProcRefSym {
    #[allow(missing_docs)]
    pub fn parse(data: &[u8]) -> Result<ProcRefSym, ParserError> {
        let mut p = Parser::new(data);
        let fixed: &RefSym2Fixed = p.get()?;
        let name = p.strz()?;
        Ok(ProcRefSym {
            name_checksum: fixed.name_checksum.get(),
            symbol_offset: fixed.symbol_offset.get(),
            module_index: fixed.module_index.get(),
            name: name.to_str_lossy().into_owned(),
        })
    }
}

/// Fixed part of `S_GPROC32` / `S_LPROC32`.
///
/// See `PROCSYM32` in `cvinfo.h`.
#[derive(Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct ProcFixed {
    pub p_parent: U32<LE>,
    pub p_end: U32<LE>,
    pub p_next: U32<LE>,
    pub proc_len: U32<LE>,
    pub debug_start: U32<LE>,
    pub debug_end: U32<LE>,
    pub proc_type: U32<LE>,
    pub offset_segment: OffsetSegment,
    pub flags: u8,
}

static_assertions::const_assert_eq!(size_of::<ProcFixed>(), 35);

/// Decoded `S_GPROC32` / `S_LPROC32`, reduced to the fields the resolver
/// joins on.
#[derive(Clone, Debug)]
pub struct ProcSym {
    /// The procedure's type.
    pub type_index: TypeIndex,
    /// Offset within the section.
    pub offset: u32,
    /// 1-based section index.
    pub section: u16,
    #[allow(missing_docs)]
    pub name: String,
}

impl ProcSym {
    #[allow(missing_docs)]
    pub fn parse(data: &[u8]) -> Result<ProcSym, ParserError> {
        let mut p = Parser::new(data);
        let fixed: &ProcFixed = p.get()?;
        let name = p.strz()?;
        Ok(ProcSym {
            type_index: TypeIndex(fixed.proc_type.get()),
            offset: fixed.offset_segment.offset.get(),
            section: fixed.offset_segment.segment.get(),
            name: name.to_str_lossy().into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Basic framing and decoding test.
    #[test]
    fn parse_proc_stream() {
        #[rustfmt::skip]
        let data = &[
            /* 0x0000 */ 0x2e, 0, 0x10, 0x11,       // size and S_GPROC32
            /* 0x0004 */ 0, 0, 0, 0,                // p_parent
            /* 0x0008 */ 0x40, 0, 0, 0,             // p_end
            /* 0x000c */ 0, 0, 0, 0,                // p_next
            /* 0x0010 */ 42, 0, 0, 0,               // proc_len
            /* 0x0014 */ 10, 0, 0, 0,               // debug_start
            /* 0x0018 */ 20, 0, 0, 0,               // debug_end
            /* 0x001c */ 0xee, 0x10, 0, 0,          // proc_type
            /* 0x0020 */ 0xcc, 0x1, 0, 0,           // offset
            /* 0x0024 */ 1, 0, 0x50, b'm',          // segment, flags, name
            /* 0x0028 */ b'e', b'm', b's', b'e',
            /* 0x002c */ b't', 0, 0xf1, 0xf2,       // end and padding
            /* 0x0030 */ 2, 0, 6, 0,                // size = 2 and S_END
        ];

        let mut i = SymIter::new(data);

        let s0 = i.next().unwrap();
        assert_eq!(s0.kind, SymKind::S_GPROC32);
        assert_eq!(s0.data.len(), 0x2c);

        let proc = ProcSym::parse(s0.data).unwrap();
        assert_eq!(proc.type_index, TypeIndex(0x10ee));
        assert_eq!(proc.offset, 0x1cc);
        assert_eq!(proc.section, 1);
        assert_eq!(proc.name, "memset");

        let s1 = i.next().unwrap();
        assert_eq!(s1.kind, SymKind::S_END);
        assert!(s1.data.is_empty());

        assert!(i.next().is_none());
    }

    #[test]
    fn parse_data_sym() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x74u32.to_le_bytes()); // T_INT4
        data.extend_from_slice(&0x40u32.to_le_bytes()); // offset
        data.extend_from_slice(&1u16.to_le_bytes()); // section
        data.extend_from_slice(b"g\0");

        let sym = DataSym::parse(&data).unwrap();
        assert_eq!(sym.type_index, TypeIndex(0x74));
        assert_eq!(sym.offset, 0x40);
        assert_eq!(sym.section, 1);
        assert_eq!(sym.name, "g");
    }

    #[test]
    fn parse_constant_sym() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x74u32.to_le_bytes());
        data.extend_from_slice(&[0x03, 0x80, 0x01, 0x00, 0x00, 0x80]); // LF_LONG
        data.extend_from_slice(b"kMin\0");

        let sym = ConstantSym::parse(&data).unwrap();
        assert_eq!(sym.value, -2147483647);
        assert_eq!(sym.name, "kMin");
    }

    #[test]
    fn parse_pub_flags() {
        let mut data = Vec::new();
        data.extend_from_slice(&0b0011u32.to_le_bytes()); // code | function
        data.extend_from_slice(&0x10u32.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(b"main\0");

        let sym = PubSym::parse(&data).unwrap();
        assert!(sym.flags.is_code());
        assert!(sym.flags.is_function());
        assert!(!sym.flags.is_managed());
        assert_eq!(sym.name, "main");
    }

    #[test]
    fn parse_procref() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0x54u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // 1-based module index
        data.extend_from_slice(b"memset\0");

        let sym = ProcRefSym::parse(&data).unwrap();
        assert_eq!(sym.symbol_offset, 0x54);
        assert_eq!(sym.module_index, 1);
        assert_eq!(sym.name, "memset");
    }
}
