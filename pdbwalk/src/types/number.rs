//! Inline numeric leaves.
//!
//! Wherever a type or symbol record embeds a size, offset, or enumerate value
//! followed by a name, the value is either a raw `u16` below [`Leaf::LF_CHAR`]
//! or a discriminated value whose width and signedness follow the tag.

use super::Leaf;
use crate::parser::{Parser, ParserError};
use tracing::warn;

/// Decodes an inline numeric leaf and advances the parser past it.
pub fn read_numeric(p: &mut Parser<'_>) -> Result<i64, ParserError> {
    let tag = Leaf(p.u16()?);
    if tag.is_immediate_numeric() {
        return Ok(tag.0 as i64);
    }

    Ok(match tag {
        Leaf::LF_CHAR => p.i8()? as i64,
        Leaf::LF_SHORT => p.i16()? as i64,
        Leaf::LF_USHORT => p.u16()? as i64,
        Leaf::LF_LONG => p.i32()? as i64,
        Leaf::LF_ULONG => p.u32()? as i64,
        Leaf::LF_QUADWORD => p.i64()?,
        Leaf::LF_UQUADWORD => p.u64()? as i64,
        _ => {
            // Real, complex, and string-valued leaves never occur where a
            // size or offset is expected. Without a known width we cannot
            // keep parsing this record.
            warn!(?tag, "unrecognized numeric leaf");
            return Err(ParserError::new());
        }
    })
}
