//! The DBI stream (stream 3, Debug Information).
//!
//! The DBI stream is the central directory of a PDB: it names the machine,
//! carries the module list, and points (by stream index) at the global symbol
//! stream, the per-module symbol streams, the PE section headers, and the
//! OMAP tables.
//!
//! The stream is a 64-byte header followed by substreams, concatenated in a
//! fixed order: modules, section contributions, section map, file info,
//! type-server map, EC info, then the optional debug header.
//!
//! # References
//! * <https://llvm.org/docs/PDB/DbiStream.html>

use crate::arch::MachineKind;
use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::stream_index::StreamIndexU16;
use bstr::ByteSlice;
use std::mem::size_of;
use std::ops::Range;
use tracing::warn;
use zerocopy::byteorder::{I32, LE, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The header of the DBI stream.
#[derive(Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct DbiStreamHeader {
    /// Always -1.
    pub signature: I32<LE>,
    pub version: U32<LE>,
    pub age: U32<LE>,

    /// Stream index of the Global Symbol Index.
    pub global_symbol_index_stream: StreamIndexU16,
    pub build_number: U16<LE>,

    /// Stream index of the Public Symbol Index.
    pub public_symbol_index_stream: StreamIndexU16,
    pub pdb_dll_version: U16<LE>,

    /// Stream index of the Global Symbol Stream, which holds the symbol
    /// records themselves.
    pub global_symbol_stream: StreamIndexU16,
    pub pdb_dll_rbld: U16<LE>,

    // Substream sizes, in stream order.
    pub mod_info_size: I32<LE>,
    pub section_contribution_size: I32<LE>,
    pub section_map_size: I32<LE>,
    pub source_info_size: I32<LE>,
    pub type_server_map_size: I32<LE>,
    /// Not a substream size.
    pub mfc_type_server_index: U32<LE>,
    pub optional_dbg_header_size: I32<LE>,
    pub edit_and_continue_size: I32<LE>,

    pub flags: U16<LE>,
    /// COFF machine code of the target.
    pub machine: U16<LE>,
    pub padding: U32<LE>,
}

const DBI_STREAM_HEADER_LEN: usize = 64;
static_assertions::const_assert_eq!(size_of::<DbiStreamHeader>(), DBI_STREAM_HEADER_LEN);

/// Byte ranges of the DBI substreams within the stream.
#[derive(Clone, Debug, Default)]
#[allow(missing_docs)]
pub struct DbiSubstreamRanges {
    pub modules: Range<usize>,
    pub section_contributions: Range<usize>,
    pub section_map: Range<usize>,
    pub sources: Range<usize>,
    pub type_server_map: Range<usize>,
    pub ec_info: Range<usize>,
    pub optional_dbg_header: Range<usize>,
}

impl DbiSubstreamRanges {
    /// Computes the substream ranges from the sizes in the header.
    ///
    /// Note that the optional debug header comes after the EC substream even
    /// though its size field precedes the EC size field in the header.
    pub fn from_sizes(header: &DbiStreamHeader, stream_len: usize) -> Result<DbiSubstreamRanges> {
        let mut pos = DBI_STREAM_HEADER_LEN;
        let mut take = |size: i32, what: &str| -> Result<Range<usize>> {
            if size < 0 {
                return Err(Error::CorruptMsf(format!(
                    "DBI substream {what} has negative size {size}"
                )));
            }
            let start = pos;
            let end = start
                .checked_add(size as usize)
                .filter(|&end| end <= stream_len)
                .ok_or_else(|| {
                    Error::CorruptMsf(format!(
                        "DBI substream {what} extends beyond the end of the stream"
                    ))
                })?;
            pos = end;
            Ok(start..end)
        };

        Ok(DbiSubstreamRanges {
            modules: take(header.mod_info_size.get(), "modules")?,
            section_contributions: take(
                header.section_contribution_size.get(),
                "section contributions",
            )?,
            section_map: take(header.section_map_size.get(), "section map")?,
            sources: take(header.source_info_size.get(), "sources")?,
            type_server_map: take(header.type_server_map_size.get(), "type server map")?,
            ec_info: take(header.edit_and_continue_size.get(), "EC info")?,
            optional_dbg_header: take(header.optional_dbg_header_size.get(), "debug header")?,
        })
    }
}

/// A module's first section contribution, embedded in each module info record.
#[derive(Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct SectionContribEntry {
    pub section: U16<LE>,
    pub padding1: [u8; 2],
    pub offset: I32<LE>,
    pub size: I32<LE>,
    pub characteristics: U32<LE>,
    pub module: U16<LE>,
    pub padding2: [u8; 2],
    pub data_crc: U32<LE>,
    pub reloc_crc: U32<LE>,
}

static_assertions::const_assert_eq!(size_of::<SectionContribEntry>(), 28);

/// The fixed part of a module info record.
///
/// See `MODI_60_Persist` in `dbi.h`.
#[derive(Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct ModuleInfoFixed {
    pub unused1: U32<LE>,
    pub section_contrib: SectionContribEntry,
    pub flags: U16<LE>,

    /// Stream index of this module's symbol stream.
    pub stream: StreamIndexU16,

    /// Size of the symbol substream within the module stream, including its
    /// 4-byte header.
    pub sym_byte_size: U32<LE>,
    pub c11_byte_size: U32<LE>,
    pub c13_byte_size: U32<LE>,
    pub source_file_count: U16<LE>,
    pub padding: [u8; 2],
    pub unused2: U32<LE>,
    pub source_file_name_index: U32<LE>,
    pub pdb_file_path_name_index: U32<LE>,
}

static_assertions::const_assert_eq!(size_of::<ModuleInfoFixed>(), 64);

/// One entry of the DBI module list.
#[derive(Clone, Debug)]
pub struct Module {
    /// The module's name. For simple object files this is the object path.
    pub name: String,
    /// The path of the object file or library the module came from.
    pub obj_file: String,
    /// Stream index of the module's symbol stream, if it has one.
    pub stream: Option<u32>,
    /// Size of the symbol substream within the module stream, including its
    /// 4-byte header.
    pub sym_byte_size: u32,
}

/// Parses the modules substream. Each record is the fixed part followed by
/// two NUL-terminated strings, padded to a 4-byte boundary.
pub fn parse_modules(substream: &[u8]) -> Result<Vec<Module>> {
    let mut modules = Vec::new();
    let mut p = Parser::new(substream);

    while p.len() >= size_of::<ModuleInfoFixed>() {
        let start_len = p.len();
        let fixed: &ModuleInfoFixed = p.get().map_err(|_| Error::TruncatedRecord)?;
        let name = p.strz().map_err(|_| Error::TruncatedRecord)?;
        let obj_file = p.strz().map_err(|_| Error::TruncatedRecord)?;

        // Records are aligned to 4 bytes.
        let consumed = start_len - p.len();
        let align = (4 - consumed % 4) % 4;
        if align > 0 && p.skip(align).is_err() {
            break;
        }

        modules.push(Module {
            name: name.to_str_lossy().into_owned(),
            obj_file: obj_file.to_str_lossy().into_owned(),
            stream: fixed.stream.get(),
            sym_byte_size: fixed.sym_byte_size.get(),
        });
    }

    Ok(modules)
}

/// Identifies the entries of the optional debug header, in storage order.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(usize)]
#[allow(missing_docs)]
pub enum DbgHeaderStream {
    Fpo = 0,
    Exception = 1,
    Fixup = 2,
    OmapToSrc = 3,
    OmapFromSrc = 4,
    SectionHeader = 5,
    TokenRidMap = 6,
    Xdata = 7,
    Pdata = 8,
    NewFpo = 9,
    OriginalSectionHeader = 10,
}

/// The optional debug header: an array of nil-able stream indexes.
#[derive(Clone, Debug, Default)]
pub struct DebugHeader {
    streams: Vec<Option<u32>>,
}

impl DebugHeader {
    /// Parses the optional debug header substream. Short substreams are
    /// tolerated; absent entries read as `None`.
    pub fn parse(substream: &[u8]) -> DebugHeader {
        let even_len = substream.len() & !1;
        if even_len != substream.len() {
            warn!("optional debug header has an odd size");
        }
        // unwrap() cannot fail; the length is even and the element type has
        // no alignment requirement.
        let indexes = <[StreamIndexU16]>::ref_from_bytes(&substream[..even_len]).unwrap();
        DebugHeader {
            streams: indexes.iter().map(|i| i.get()).collect(),
        }
    }

    /// Gets the stream index for a given debug header entry.
    pub fn stream(&self, which: DbgHeaderStream) -> Option<u32> {
        self.streams.get(which as usize).copied().flatten()
    }
}

/// The decoded DBI stream: everything the reader consumes from it.
#[derive(Clone, Debug)]
pub struct DbiStream {
    /// The target machine.
    pub machine: MachineKind,
    /// Age of the DBI; matches the PDB info age in consistent files.
    pub age: u32,
    /// Stream index of the global symbol stream.
    pub global_symbol_stream: Option<u32>,
    /// The module list.
    pub modules: Vec<Module>,
    /// The optional debug header.
    pub debug_header: DebugHeader,
}

impl Default for DbiStream {
    fn default() -> Self {
        DbiStream {
            machine: MachineKind::Unknown,
            age: 0,
            global_symbol_stream: None,
            modules: Vec::new(),
            debug_header: DebugHeader::default(),
        }
    }
}

impl DbiStream {
    /// Parses the DBI stream. An empty stream decodes to the default, which
    /// has no modules and an unknown machine.
    pub fn parse(stream_data: &[u8]) -> Result<DbiStream> {
        if stream_data.is_empty() {
            return Ok(DbiStream::default());
        }

        let Ok((header, _)) = DbiStreamHeader::ref_from_prefix(stream_data) else {
            return Err(Error::TruncatedRecord);
        };

        let ranges = DbiSubstreamRanges::from_sizes(header, stream_data.len())?;
        let modules = parse_modules(&stream_data[ranges.modules.clone()])?;
        let debug_header = DebugHeader::parse(&stream_data[ranges.optional_dbg_header.clone()]);

        Ok(DbiStream {
            machine: MachineKind::from_coff(header.machine.get()),
            age: header.age.get(),
            global_symbol_stream: header.global_symbol_stream.get(),
            modules,
            debug_header,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a DBI stream with one module, a global symbol stream index,
    /// and a debug header naming a section header stream.
    pub(crate) fn build_dbi(
        machine: u16,
        gss_stream: u16,
        module_stream: u16,
        section_stream: u16,
    ) -> Vec<u8> {
        let mut modules = Vec::new();
        modules.extend_from_slice(&[0u8; 4]); // unused1
        modules.extend_from_slice(&[0u8; 28]); // section contrib
        modules.extend_from_slice(&0u16.to_le_bytes()); // flags
        modules.extend_from_slice(&module_stream.to_le_bytes());
        modules.extend_from_slice(&0u32.to_le_bytes()); // sym_byte_size
        modules.extend_from_slice(&[0u8; 12]); // c11/c13/count/padding
        modules.extend_from_slice(&[0u8; 12]); // unused2/name indexes
        modules.extend_from_slice(b"mod.obj\0");
        modules.extend_from_slice(b"mod.lib\0");
        while modules.len() % 4 != 0 {
            modules.push(0);
        }

        let mut dbg = Vec::new();
        for i in 0..11u16 {
            let value = if i == DbgHeaderStream::SectionHeader as u16 {
                section_stream
            } else {
                0xffff
            };
            dbg.extend_from_slice(&value.to_le_bytes());
        }

        let mut header = Vec::new();
        header.extend_from_slice(&(-1i32).to_le_bytes());
        header.extend_from_slice(&19990903u32.to_le_bytes()); // version
        header.extend_from_slice(&1u32.to_le_bytes()); // age
        header.extend_from_slice(&0xffffu16.to_le_bytes()); // gsi
        header.extend_from_slice(&0u16.to_le_bytes()); // build number
        header.extend_from_slice(&0xffffu16.to_le_bytes()); // psi
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&gss_stream.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&(modules.len() as i32).to_le_bytes());
        header.extend_from_slice(&0i32.to_le_bytes()); // section contributions
        header.extend_from_slice(&0i32.to_le_bytes()); // section map
        header.extend_from_slice(&0i32.to_le_bytes()); // sources
        header.extend_from_slice(&0i32.to_le_bytes()); // type server map
        header.extend_from_slice(&0u32.to_le_bytes()); // mfc index
        header.extend_from_slice(&(dbg.len() as i32).to_le_bytes());
        header.extend_from_slice(&0i32.to_le_bytes()); // EC info
        header.extend_from_slice(&0u16.to_le_bytes()); // flags
        header.extend_from_slice(&machine.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // padding
        assert_eq!(header.len(), 64);

        let mut stream = header;
        stream.extend_from_slice(&modules);
        stream.extend_from_slice(&dbg);
        stream
    }

    #[test]
    fn parse_dbi_stream() {
        let stream = build_dbi(0x8664, 9, 11, 13);
        let dbi = DbiStream::parse(&stream).unwrap();

        assert_eq!(dbi.machine, MachineKind::Amd64);
        assert_eq!(dbi.global_symbol_stream, Some(9));
        assert_eq!(dbi.modules.len(), 1);
        assert_eq!(dbi.modules[0].name, "mod.obj");
        assert_eq!(dbi.modules[0].obj_file, "mod.lib");
        assert_eq!(dbi.modules[0].stream, Some(11));

        assert_eq!(
            dbi.debug_header.stream(DbgHeaderStream::SectionHeader),
            Some(13)
        );
        assert_eq!(dbi.debug_header.stream(DbgHeaderStream::OmapFromSrc), None);
        assert_eq!(
            dbi.debug_header.stream(DbgHeaderStream::OriginalSectionHeader),
            None
        );
    }

    #[test]
    fn empty_stream_is_default() {
        let dbi = DbiStream::parse(&[]).unwrap();
        assert_eq!(dbi.machine, MachineKind::Unknown);
        assert!(dbi.modules.is_empty());
    }

    #[test]
    fn oversized_substream_is_corrupt() {
        let mut stream = build_dbi(0x8664, 9, 11, 13);
        // Inflate the modules substream size beyond the stream length.
        stream[24..28].copy_from_slice(&0x7fff_ffffi32.to_le_bytes());
        assert!(matches!(
            DbiStream::parse(&stream),
            Err(Error::CorruptMsf(_))
        ));
    }

    #[test]
    fn module_records_are_4_byte_aligned() {
        // Two modules with names whose lengths force realignment.
        let one = build_dbi(0x014c, 0xffff, 0xffff, 0xffff);
        let dbi = DbiStream::parse(&one).unwrap();
        assert_eq!(dbi.modules.len(), 1);
        assert_eq!(dbi.machine, MachineKind::I386);
        assert_eq!(dbi.modules[0].stream, None);
    }
}
