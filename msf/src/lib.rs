//! Reads Multi-Stream Files (MSF), the container format underlying Program
//! Database (PDB) files.
//!
//! An MSF file contains a set of numbered _streams_. Each stream is a sequence
//! of bytes, stored in fixed-size pages that are usually not contiguous on
//! disk. The stream directory maps stream numbers to page lists; the directory
//! is itself stored in pages whose numbers are listed in a page named by the
//! file header.
//!
//! This crate only reads MSF files. It does not interpret the contents of any
//! stream; the `pdbwalk` crate builds the PDB data model on top of it.
//!
//! # References
//! * <https://llvm.org/docs/PDB/MsfFile.html>
//! * <https://github.com/microsoft/microsoft-pdb>

#![forbid(unused_must_use)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod open;
mod read;


use pow2::{IntOnlyPow2, Pow2};
use std::mem::size_of;
use sync_file::{RandomAccessFile, ReadAt};
use zerocopy::byteorder::{LE, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The signature of MSF 7.00 ("big MSF") files. This is the only container
/// version this crate accepts.
pub const MSF_MAGIC: [u8; 32] = *b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\x00\x00\x00";

/// The signature of the obsolete MSF 2.00 encoding. Recognized only so that we
/// can report it as an unsupported version rather than a corrupt file.
const MSF_SMALL_MAGIC: [u8; 0x2c] = *b"Microsoft C/C++ program database 2.00\r\n\x1a\x4a\x47\0\0";

/// The header of an MSF 7.00 file. This is at file offset 0.
#[derive(Clone, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct MsfHeader {
    /// Identifies this file as an MSF 7.00 file. Must equal [`MSF_MAGIC`].
    magic: [u8; 32],

    /// The size of each page, in bytes. Always a power of 2.
    page_size: U32<LE>,

    /// Page number of the active free-page map (1 or 2). Not consulted by
    /// this read-only implementation.
    active_fpm: U32<LE>,

    /// The total number of pages in the file. Every page number in the stream
    /// directory must be below this value.
    num_pages: U32<LE>,

    /// Size of the stream directory, in bytes.
    stream_dir_size: U32<LE>,

    reserved: U32<LE>,

    /// Page number of the page that lists the pages of the stream directory.
    stream_dir_map_page: U32<LE>,
}

/// The length of the MSF file header.
const MSF_HEADER_LEN: usize = size_of::<MsfHeader>();
static_assertions::const_assert_eq!(MSF_HEADER_LEN, 56);

/// The minimum supported page size.
pub const MIN_PAGE_SIZE: PageSize = PageSize::from_exponent(9);

/// The largest supported page size.
pub const MAX_PAGE_SIZE: PageSize = PageSize::from_exponent(16);

/// This size marks a stream as "nil". A nil stream is different from a
/// zero-length stream, but both read back as empty.
pub const NIL_STREAM_SIZE: u32 = 0xffff_ffff;

/// The stream index of the previous stream directory. It is never interpreted.
pub const OLD_STREAM_DIR_STREAM: u32 = 0;

/// Specifies a page size used in an MSF file. This value is always a power of 2.
pub type PageSize = Pow2;

/// Errors reported while opening or reading an MSF container.
#[derive(Debug, thiserror::Error)]
pub enum MsfError {
    /// The file signature is not the MSF 7.00 signature.
    #[error("file does not have the MSF 7.00 signature")]
    UnsupportedVersion,

    /// The container structure is internally inconsistent.
    #[error("corrupt MSF container: {0}")]
    Corrupt(String),

    /// A stream index beyond the stream directory was requested.
    #[error("stream {0} does not exist")]
    NoSuchStream(u32),

    /// The underlying file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Allows reading the contents of an MSF file.
///
/// [`Msf::open`] opens a file for read access. All directory information is
/// loaded eagerly; stream contents are read on demand with
/// [`Msf::read_stream_to_vec`].
pub struct Msf<F = RandomAccessFile> {
    /// The data source.
    file: F,

    page_size: PageSize,
    num_pages: u32,

    /// Contains the sizes of all streams. The length of `stream_sizes`
    /// implicitly defines the number of streams. Values may be
    /// [`NIL_STREAM_SIZE`].
    stream_sizes: Vec<u32>,

    /// The page numbers of all streams, concatenated.
    stream_pages: Vec<u32>,

    /// Offsets into `stream_pages` where each stream's page list starts.
    /// Has `stream_sizes.len() + 1` entries.
    stream_page_starts: Vec<u32>,
}

/// Converts a page number to a file offset.
fn page_to_offset(page: u32, page_size: PageSize) -> u64 {
    (page as u64) << page_size.exponent()
}

/// The number of pages needed to store `size` bytes.
fn num_pages_for_stream_size(size: u32, page_size: PageSize) -> u32 {
    if size == NIL_STREAM_SIZE {
        0
    } else {
        size.div_round_up(page_size)
    }
}

impl<F> Msf<F> {
    /// Returns the page size used for this file.
    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// The total number of streams in this file, including nil streams.
    pub fn num_streams(&self) -> u32 {
        self.stream_sizes.len() as u32
    }

    /// Indicates whether a stream index is valid and the stream is not nil.
    pub fn is_stream_valid(&self, stream: u32) -> bool {
        match self.stream_sizes.get(stream as usize) {
            Some(&size) => size != NIL_STREAM_SIZE,
            None => false,
        }
    }

    /// Gets the size in bytes of a given stream. Nil streams report zero.
    pub fn stream_size(&self, stream: u32) -> Result<u32, MsfError> {
        match self.stream_sizes.get(stream as usize) {
            Some(&NIL_STREAM_SIZE) => Ok(0),
            Some(&size) => Ok(size),
            None => Err(MsfError::NoSuchStream(stream)),
        }
    }

    /// Gets the size and the page list of a given stream. Nil streams report
    /// a zero size and an empty page list.
    pub fn stream_size_and_pages(&self, stream: u32) -> Result<(u32, &[u32]), MsfError> {
        let Some(&stream_size) = self.stream_sizes.get(stream as usize) else {
            return Err(MsfError::NoSuchStream(stream));
        };

        if stream_size == NIL_STREAM_SIZE {
            return Ok((0, &[]));
        }

        let num_stream_pages = num_pages_for_stream_size(stream_size, self.page_size) as usize;
        let start = self.stream_page_starts[stream as usize] as usize;
        Ok((stream_size, &self.stream_pages[start..start + num_stream_pages]))
    }

    /// Extracts the underlying file.
    pub fn into_file(self) -> F {
        self.file
    }
}

/// Checks whether the header of a file carries the MSF 7.00 signature.
///
/// This only looks at the signature; it does not validate anything else.
pub fn is_file_header_msf(header: &[u8]) -> bool {
    header.starts_with(&MSF_MAGIC)
}
