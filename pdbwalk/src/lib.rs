//! Reads Microsoft Program Database (PDB) files and exposes their type and
//! symbol universe as a navigable in-memory model.
//!
//! [`Pdb::open`] reads the MSF container, materializes every stream it
//! consumes, resolves the type graph, and freezes. After that a [`Pdb`] is
//! immutable: type lookups, symbol resolution, and layout building never
//! touch the file again, and a fully constructed `Pdb` can be shared across
//! threads.
//!
//! ```no_run
//! use pdbwalk::Pdb;
//!
//! let pdb = Pdb::open("target.pdb")?;
//! let (ty, rva) = pdb.resolve("gBootServices")?;
//! let layout = pdb.layout(&ty, rva as u64, true)?;
//! # Ok::<(), pdbwalk::Error>(())
//! ```
//!
//! # References
//! * <https://llvm.org/docs/PDB/index.html>
//! * <https://github.com/microsoft/microsoft-pdb>

#![forbid(unused_must_use)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::collapsible_if)]

pub mod arch;
pub mod dbi;
pub mod error;
pub mod globals;
pub mod image;
pub mod layout;
pub mod modi;
pub mod omap;
pub mod parser;
pub mod pdbi;
mod resolver;
mod stream_index;
pub mod syms;
pub mod tpi;
pub mod types;

pub use arch::MachineKind;
pub use error::{Error, Result};
pub use layout::StructRecord;
pub use stream_index::{StreamIndexU16, NIL_STREAM_INDEX};
pub use tpi::{Ty, TypeGraph};
pub use types::TypeIndex;

use dbi::{DbgHeaderStream, DbiStream, Module};
use globals::GlobalSymbols;
use image::ImageSectionHeader;
use modi::ModuleSymbols;
use omap::{AddressRemap, OmapTable};
use pdbi::PdbiStream;
use pdbwalk_msf::Msf;
use resolver::AddressMap;
use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;
use sync_file::{RandomAccessFile, ReadAt};
use tracing::warn;
use uuid::Uuid;

/// Stream index of the PDB information stream.
pub const PDB_INFO_STREAM: u32 = 1;
/// Stream index of the TPI (type record) stream.
pub const TPI_STREAM: u32 = 2;
/// Stream index of the DBI (debug information) stream.
pub const DBI_STREAM: u32 = 3;

/// Configuration for [`Pdb::open_with`].
#[derive(Clone, Debug)]
pub struct OpenOptions {
    /// Drop symbols whose name starts with `std::` from the name indexes.
    /// Debug information for the C++ standard library is rarely what a
    /// consumer is after; disable this to keep it.
    pub exclude_std_names: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            exclude_std_names: true,
        }
    }
}

/// A fully parsed PDB: the resolved type graph, the symbol indexes, the
/// section table, and the OMAP remap.
///
/// All streams are read during construction; the file handle is released
/// before [`Pdb::open`] returns.
pub struct Pdb {
    info: PdbiStream,
    machine: MachineKind,
    graph: TypeGraph,
    modules: Vec<Module>,
    /// Parsed module symbol streams, parallel to `modules`.
    module_syms: Vec<Option<ModuleSymbols>>,
    globals: GlobalSymbols,

    /// The section table the resolver maps through: the original sections
    /// when an OMAP is present, the current sections otherwise.
    remap_sections: Vec<ImageSectionHeader>,
    remap: AddressRemap,
    omap_to_src: Option<OmapTable>,

    address_map: OnceLock<AddressMap>,
}

impl Pdb {
    /// Opens a PDB file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Pdb> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Opens a PDB file.
    pub fn open_with<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Pdb> {
        let file = File::open(path)?;
        Self::from_file(RandomAccessFile::from(file), options)
    }

    /// Reads a PDB from any random-access source.
    pub fn from_file<F: ReadAt>(file: F, options: OpenOptions) -> Result<Pdb> {
        let msf = Msf::from_file(file)?;

        // The fixed streams. A missing or empty DBI stream is tolerated so
        // that type-only PDBs still open; symbol queries then find nothing.
        let dbi = DbiStream::parse(&read_stream_or_empty(&msf, DBI_STREAM)?)?;
        let info = PdbiStream::parse(&read_stream_or_empty(&msf, PDB_INFO_STREAM)?)?;

        let machine = dbi.machine;
        let graph = TypeGraph::parse(
            &read_stream_or_empty(&msf, TPI_STREAM)?,
            machine.pointer_width(),
        )?;

        // The streams the DBI names.
        let globals = match dbi.global_symbol_stream {
            Some(stream) => {
                GlobalSymbols::parse(&read_named_stream(&msf, stream)?, options.exclude_std_names)
            }
            None => GlobalSymbols::default(),
        };

        let mut module_syms = Vec::with_capacity(dbi.modules.len());
        for module in &dbi.modules {
            let syms = match module.stream {
                Some(stream) => Some(ModuleSymbols::parse(
                    &read_named_stream(&msf, stream)?,
                    module.sym_byte_size,
                    options.exclude_std_names,
                )),
                None => None,
            };
            module_syms.push(syms);
        }

        let read_sections = |stream: Option<u32>| -> Result<Option<Vec<ImageSectionHeader>>> {
            match stream {
                Some(stream) => Ok(Some(image::parse_sections(&read_named_stream(
                    &msf, stream,
                )?)?)),
                None => Ok(None),
            }
        };
        let read_omap = |stream: Option<u32>| -> Result<Option<OmapTable>> {
            match stream {
                Some(stream) => Ok(Some(OmapTable::parse(&read_named_stream(&msf, stream)?)?)),
                None => Ok(None),
            }
        };

        let dbg = &dbi.debug_header;
        let sections = read_sections(dbg.stream(DbgHeaderStream::SectionHeader))?;
        let sections_orig = read_sections(dbg.stream(DbgHeaderStream::OriginalSectionHeader))?;
        let omap_from_src = read_omap(dbg.stream(DbgHeaderStream::OmapFromSrc))?;
        let omap_to_src = read_omap(dbg.stream(DbgHeaderStream::OmapToSrc))?;

        // When the image was rearranged after linking, symbols carry
        // addresses in the original layout: map through the original
        // sections plus the OMAP. Otherwise the current sections are
        // authoritative and the remap is the identity.
        let (remap_sections, remap) = match (sections_orig, omap_from_src) {
            (Some(orig), Some(omap)) => (orig, AddressRemap::Table(omap)),
            (_, _) => (sections.unwrap_or_default(), AddressRemap::Identity),
        };

        // Everything is in memory now; the MSF handle (and the file) drop
        // here.
        drop(msf);

        Ok(Pdb {
            info,
            machine,
            graph,
            modules: dbi.modules,
            module_syms,
            globals,
            remap_sections,
            remap,
            omap_to_src,
            address_map: OnceLock::new(),
        })
    }

    /// The machine the PDB was built for.
    pub fn machine(&self) -> MachineKind {
        self.machine
    }

    /// The width of a data pointer on the target machine, in bytes (4 or 8).
    pub fn pointer_width(&self) -> u32 {
        self.machine.pointer_width() as u32
    }

    /// The PDB's identity GUID.
    pub fn guid(&self) -> Uuid {
        self.info.guid
    }

    /// The PDB's age. Incremented on every modification; must match the PE
    /// header for the PDB to bind to its image.
    pub fn age(&self) -> u32 {
        self.info.age
    }

    /// The decoded PDB information stream.
    pub fn info(&self) -> &PdbiStream {
        &self.info
    }

    /// The resolved type graph.
    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// The DBI module list.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// The section table the resolver maps through.
    pub fn sections(&self) -> &[ImageSectionHeader] {
        &self.remap_sections
    }

    /// The OMAP table mapping final-image addresses back to original-image
    /// addresses, when present.
    pub fn omap_to_src(&self) -> Option<&OmapTable> {
        self.omap_to_src.as_ref()
    }

    /// Looks up a type by name: primitives first, then composites and enums.
    pub fn type_by_name(&self, name: &str) -> Result<Ty<'_>> {
        self.graph.get_by_name(name)
    }

    /// Looks up a type by index.
    pub fn type_by_id(&self, index: u32) -> Result<Ty<'_>> {
        self.graph.get(TypeIndex(index))
    }

    /// The size of a type in bytes; -1 when the type has no meaningful size.
    pub fn size_of(&self, ty: &Ty<'_>) -> i64 {
        self.graph.size_of(ty)
    }

    /// Renders a display name for a type.
    pub fn type_name(&self, ty: &Ty<'_>) -> String {
        self.graph.type_name(ty)
    }

    /// Builds the layout of a type at a base address.
    pub fn layout(&self, ty: &Ty<'_>, addr: u64, recursive: bool) -> Result<StructRecord> {
        self.graph.layout(ty, addr, recursive)
    }

    /// Resolves a pointer's pointee type and lays it out at `addr`.
    pub fn deref_pointer(&self, ty: &Ty<'_>, addr: u64) -> Result<StructRecord> {
        self.graph.deref_pointer(ty, addr)
    }

    /// The named values of an enum type. `None` for non-enum types.
    pub fn enum_values(&self, ty: &Ty<'_>) -> Option<Vec<(String, i64)>> {
        self.graph.enum_values(ty)
    }

    /// Iterates the named composites and enums of the type graph.
    pub fn struct_names(&self) -> impl Iterator<Item = (&str, TypeIndex)> {
        self.graph.composite_names()
    }

    /// The name indexes over the global symbol stream.
    pub fn global_symbols(&self) -> &GlobalSymbols {
        &self.globals
    }

    /// Searches the `S_PUB32` index for a public symbol.
    pub fn find_public_by_name(&self, name: &str) -> Option<&syms::PubSym> {
        self.globals.publics.get(name)
    }

    /// Searches the `S_CONSTANT` index.
    pub fn constant_by_name(&self, name: &str) -> Option<&syms::ConstantSym> {
        self.globals.constants.get(name)
    }
}

/// Reads one of the fixed streams, tolerating files whose stream directory
/// does not extend that far.
fn read_stream_or_empty<F: ReadAt>(msf: &Msf<F>, stream: u32) -> Result<Vec<u8>> {
    if stream < msf.num_streams() {
        Ok(msf.read_stream_to_vec(stream)?)
    } else {
        Ok(Vec::new())
    }
}

/// Reads a stream named by a DBI field. A dangling stream index is a defect
/// in the file, but a recoverable one: the reader degrades to an empty
/// stream.
fn read_named_stream<F: ReadAt>(msf: &Msf<F>, stream: u32) -> Result<Vec<u8>> {
    if stream < msf.num_streams() {
        Ok(msf.read_stream_to_vec(stream)?)
    } else {
        warn!(stream, "DBI names a stream beyond the stream directory");
        Ok(Vec::new())
    }
}
