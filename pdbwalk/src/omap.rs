//! OMAP address remapping.
//!
//! When an image is rearranged after compilation (profile-guided reordering,
//! hot patching), the PDB carries OMAP tables that map addresses between the
//! original and the final layout. The table is a tight array of `(from, to)`
//! pairs sorted by `from`; a lookup finds the greatest entry at or below the
//! address. An entry whose `to` is zero marks its range as unmapped.

use crate::error::{Error, Result};
use std::mem::size_of;
use zerocopy::byteorder::{LE, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// One entry of an OMAP table.
#[derive(Copy, Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct OmapEntry {
    pub from: U32<LE>,
    pub to: U32<LE>,
}

static_assertions::const_assert_eq!(size_of::<OmapEntry>(), 8);

/// A decoded OMAP table.
#[derive(Clone, Debug)]
pub struct OmapTable {
    entries: Vec<OmapEntry>,
}

impl OmapTable {
    /// Parses an OMAP stream.
    pub fn parse(stream_data: &[u8]) -> Result<OmapTable> {
        if stream_data.len() % size_of::<OmapEntry>() != 0 {
            return Err(Error::TruncatedRecord);
        }
        // unwrap() cannot fail; the length is a record multiple and the
        // entry type has no alignment requirement.
        let entries = <[OmapEntry]>::ref_from_bytes(stream_data).unwrap();
        Ok(OmapTable {
            entries: entries.to_vec(),
        })
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaps one address. Returns 0 when the address falls before the first
    /// entry or inside a range whose `to` is zero.
    pub fn remap(&self, address: u32) -> u32 {
        let idx = self
            .entries
            .partition_point(|e| e.from.get() <= address);
        if idx == 0 {
            return 0;
        }

        let entry = &self.entries[idx - 1];
        let to = entry.to.get();
        if to == 0 {
            0
        } else {
            to + (address - entry.from.get())
        }
    }
}

/// The remap applied between section-relative addresses and image RVAs:
/// either the identity (no OMAP stream) or an OMAP table.
#[derive(Clone, Debug)]
pub enum AddressRemap {
    /// No OMAP present; addresses pass through unchanged.
    Identity,
    /// Remap through an OMAP table.
    Table(OmapTable),
}

impl AddressRemap {
    #[allow(missing_docs)]
    pub fn remap(&self, address: u32) -> u32 {
        match self {
            AddressRemap::Identity => address,
            AddressRemap::Table(table) => table.remap(address),
        }
    }
}
