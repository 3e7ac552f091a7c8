//! Nil-able 16-bit stream indexes, as stored in the DBI stream.

use zerocopy::byteorder::{LE, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The value that marks a stream index as absent.
pub const NIL_STREAM_INDEX: u16 = 0xffff;

/// A 16-bit stream index whose `0xffff` value means "no stream". The DBI
/// stream stores these for the symbol streams, the per-module streams, and
/// every entry of the optional debug header.
#[derive(Copy, Clone, Eq, PartialEq, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(transparent)]
pub struct StreamIndexU16(pub U16<LE>);

impl StreamIndexU16 {
    /// Gets the stream index, or `None` if this is the nil value.
    pub fn get(&self) -> Option<u32> {
        let value = self.0.get();
        if value == NIL_STREAM_INDEX {
            None
        } else {
            Some(value as u32)
        }
    }
}

impl std::fmt::Debug for StreamIndexU16 {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.get() {
            Some(stream) => write!(fmt, "{stream}"),
            None => fmt.write_str("nil"),
        }
    }
}
