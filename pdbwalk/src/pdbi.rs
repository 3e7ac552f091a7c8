//! The PDB information stream (stream 1).
//!
//! Carries the version, timestamp, age, and GUID that bind a PDB to its PE
//! image, followed by a string table.

use crate::error::{Error, Result};
use bstr::ByteSlice;
use std::mem::size_of;
use tracing::debug;
use uuid::Uuid;
use zerocopy::byteorder::{LE, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[derive(Clone, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct PdbiStreamHeader {
    version: U32<LE>,
    /// Creation time, as a `time_t`.
    signature: U32<LE>,
    age: U32<LE>,
    guid: [u8; 16],
    /// Length in bytes of the string data that follows the header.
    names_len: U32<LE>,
}

static_assertions::const_assert_eq!(size_of::<PdbiStreamHeader>(), 32);

/// The decoded PDB information stream.
#[derive(Clone, Debug, Default)]
pub struct PdbiStream {
    /// The stream format version.
    pub version: u32,
    /// Creation time of the PDB, as a Unix timestamp.
    pub signature: u32,
    /// Incremented every time the PDB is modified. Must match the age stored
    /// in the PE header for the PDB to bind to the image.
    pub age: u32,
    /// The GUID that identifies this PDB.
    pub guid: Uuid,
    /// The stream's string table.
    pub names: Vec<String>,
}

impl PdbiStream {
    /// Parses the PDB information stream. An empty stream decodes to the
    /// default (zero) identity.
    pub fn parse(stream_data: &[u8]) -> Result<PdbiStream> {
        if stream_data.is_empty() {
            debug!("PDB info stream is empty");
            return Ok(PdbiStream::default());
        }

        let Ok((header, rest)) = PdbiStreamHeader::ref_from_prefix(stream_data) else {
            return Err(Error::TruncatedRecord);
        };

        let names_len = (header.names_len.get() as usize).min(rest.len());
        let names = rest[..names_len]
            .split(|&b| b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_str_lossy().into_owned())
            .collect();

        Ok(PdbiStream {
            version: header.version.get(),
            signature: header.signature.get(),
            age: header.age.get(),
            guid: Uuid::from_bytes_le(header.guid),
            names,
        })
    }
}
