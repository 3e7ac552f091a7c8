//! PE image section headers.
//!
//! The DBI debug header names a stream that holds a copy of the image's
//! section table: a tight array of 40-byte `IMAGE_SECTION_HEADER` records.
//!
//! # References
//! * <https://learn.microsoft.com/en-us/windows/win32/api/winnt/ns-winnt-image_section_header>

use crate::error::Result;
use bstr::BStr;
use std::mem::size_of;
use tracing::warn;
use zerocopy::byteorder::{LE, U16, U32};
use zerocopy::FromBytes as _;
use zerocopy_derive::*;

/// The length of a section name.
pub const IMAGE_SIZEOF_SHORT_NAME: usize = 8;

bitflags::bitflags! {
    /// Section characteristics (`IMAGE_SCN_*`). Only the flags this crate
    /// inspects are named.
    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    pub struct SectionCharacteristics: u32 {
        /// Section contains code.
        const IMAGE_SCN_CNT_CODE               = 0x0000_0020;
        /// Section contains initialized data.
        const IMAGE_SCN_CNT_INITIALIZED_DATA   = 0x0000_0040;
        /// Section contains uninitialized data.
        const IMAGE_SCN_CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// Section can be discarded.
        const IMAGE_SCN_MEM_DISCARDABLE        = 0x0200_0000;
        /// Section is executable.
        const IMAGE_SCN_MEM_EXECUTE            = 0x2000_0000;
        /// Section is readable.
        const IMAGE_SCN_MEM_READ               = 0x4000_0000;
        /// Section is writeable.
        const IMAGE_SCN_MEM_WRITE              = 0x8000_0000;

        const _ = !0;
    }
}

/// One entry of the PE section table.
#[derive(Clone, Debug, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct ImageSectionHeader {
    /// Section name, NUL-padded.
    pub name: [u8; IMAGE_SIZEOF_SHORT_NAME],
    /// The `Misc` union: virtual size, or physical address for object files.
    pub virtual_size: U32<LE>,
    pub virtual_address: U32<LE>,
    pub size_of_raw_data: U32<LE>,
    pub pointer_to_raw_data: U32<LE>,
    pub pointer_to_relocations: U32<LE>,
    pub pointer_to_linenumbers: U32<LE>,
    pub number_of_relocations: U16<LE>,
    pub number_of_linenumbers: U16<LE>,
    pub characteristics: U32<LE>,
}

static_assertions::const_assert_eq!(size_of::<ImageSectionHeader>(), 40);

impl ImageSectionHeader {
    /// The section name, trimmed at the first NUL.
    pub fn name(&self) -> &BStr {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(IMAGE_SIZEOF_SHORT_NAME);
        BStr::new(&self.name[..end])
    }

    /// The section characteristics as flags.
    pub fn characteristics(&self) -> SectionCharacteristics {
        SectionCharacteristics::from_bits_retain(self.characteristics.get())
    }
}

/// Parses the tight section-header array from a section stream. Trailing
/// bytes that do not form a whole record are ignored with a warning.
pub fn parse_sections(stream_data: &[u8]) -> Result<Vec<ImageSectionHeader>> {
    let record_size = size_of::<ImageSectionHeader>();
    let whole = stream_data.len() / record_size * record_size;
    if whole != stream_data.len() {
        warn!(
            trailing = stream_data.len() - whole,
            "section header stream has trailing bytes"
        );
    }

    // unwrap() cannot fail; the length is a record multiple and the record
    // type has no alignment requirement.
    let sections = <[ImageSectionHeader]>::ref_from_bytes(&stream_data[..whole]).unwrap();
    Ok(sections.to_vec())
}
