//! Decodes the sub-records of an `LF_FIELDLIST` record.

use super::number::read_numeric;
use super::{Leaf, TypeIndex};
use crate::parser::{Parser, ParserError};
use bstr::ByteSlice;
use tracing::warn;

/// One sub-record of a field list: a member, base class, enumerate, method,
/// or nested type of a composite.
#[derive(Clone, Debug)]
pub enum Field {
    /// `LF_MEMBER` — a data member at a byte offset.
    Member {
        /// Field attribute word (`CV_fldattr_t`).
        attr: u16,
        /// The member's type.
        ty: TypeIndex,
        /// Byte offset of the member within the composite.
        offset: i64,
        /// Member name.
        name: String,
    },
    /// `LF_STMEMBER` — a static data member. Occupies no storage.
    StaticMember {
        #[allow(missing_docs)]
        attr: u16,
        #[allow(missing_docs)]
        ty: TypeIndex,
        #[allow(missing_docs)]
        name: String,
    },
    /// `LF_BCLASS` — a direct base class at a byte offset.
    BaseClass {
        #[allow(missing_docs)]
        attr: u16,
        #[allow(missing_docs)]
        ty: TypeIndex,
        #[allow(missing_docs)]
        offset: i64,
    },
    /// `LF_ENUMERATE` — one named value of an enum.
    Enumerate {
        #[allow(missing_docs)]
        attr: u16,
        #[allow(missing_docs)]
        value: i64,
        #[allow(missing_docs)]
        name: String,
    },
    /// `LF_VFUNCTAB` — the virtual function table pointer.
    VFuncTable {
        #[allow(missing_docs)]
        ty: TypeIndex,
    },
    /// `LF_ONEMETHOD` — a non-overloaded method.
    OneMethod {
        #[allow(missing_docs)]
        attr: u16,
        #[allow(missing_docs)]
        ty: TypeIndex,
        /// Offset into the vtable, present only when the method introduces a
        /// new virtual slot.
        vtab_offset: Option<u32>,
        #[allow(missing_docs)]
        name: String,
    },
    /// `LF_METHOD` — an overloaded method group; `method_list` names an
    /// `LF_METHODLIST` record.
    Method {
        #[allow(missing_docs)]
        count: u16,
        #[allow(missing_docs)]
        method_list: TypeIndex,
        #[allow(missing_docs)]
        name: String,
    },
    /// `LF_NESTTYPE` — a nested type definition. Occupies no storage.
    NestedType {
        #[allow(missing_docs)]
        ty: TypeIndex,
        #[allow(missing_docs)]
        name: String,
    },
    /// `LF_INDEX` — continuation pointer to another field list.
    Index {
        #[allow(missing_docs)]
        ty: TypeIndex,
    },
}

impl Field {
    /// The name of this field, if it has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Field::Member { name, .. }
            | Field::StaticMember { name, .. }
            | Field::Enumerate { name, .. }
            | Field::OneMethod { name, .. }
            | Field::Method { name, .. }
            | Field::NestedType { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Indicates whether a method attribute word introduces a new virtual
/// function slot, which makes the `vtab_offset` field present.
///
/// `attr` is the `attr` field of an `LF_ONEMETHOD` or method list entry.
pub fn introduces_virtual(attr: u16) -> bool {
    matches!((attr >> 2) & 0xf, 4 | 6)
}

/// Decodes the payload of an `LF_FIELDLIST` record.
///
/// Sub-records are padded to a 4-byte boundary with `LF_PADn` markers (any
/// byte above 0xF0, low nibble = pad count); the markers are skipped between
/// records. Sub-records carry no length field, so an unrecognized kind ends
/// decoding of the list.
pub fn parse_field_list(bytes: &[u8]) -> Result<Vec<Field>, ParserError> {
    let mut p = Parser::new(bytes);
    let mut fields = Vec::new();

    loop {
        // Padding (alignment) bytes before the next sub-record.
        while let Some(&b) = p.peek_rest().first() {
            if b < 0xf0 {
                break;
            }
            p.skip(1)?;
        }
        if p.is_empty() {
            break;
        }

        let item_kind = Leaf(p.u16()?);
        let field = match item_kind {
            Leaf::LF_MEMBER => Field::Member {
                attr: p.u16()?,
                ty: TypeIndex(p.u32()?),
                offset: read_numeric(&mut p)?,
                name: p.strz()?.to_str_lossy().into_owned(),
            },

            Leaf::LF_STMEMBER => Field::StaticMember {
                attr: p.u16()?,
                ty: TypeIndex(p.u32()?),
                name: p.strz()?.to_str_lossy().into_owned(),
            },

            Leaf::LF_BCLASS => Field::BaseClass {
                attr: p.u16()?,
                ty: TypeIndex(p.u32()?),
                offset: read_numeric(&mut p)?,
            },

            Leaf::LF_ENUMERATE => Field::Enumerate {
                attr: p.u16()?,
                value: read_numeric(&mut p)?,
                name: p.strz()?.to_str_lossy().into_owned(),
            },

            Leaf::LF_VFUNCTAB => {
                p.skip(2)?; // padding
                Field::VFuncTable {
                    ty: TypeIndex(p.u32()?),
                }
            }

            Leaf::LF_ONEMETHOD => {
                let attr = p.u16()?;
                let ty = TypeIndex(p.u32()?);
                let vtab_offset = if introduces_virtual(attr) {
                    Some(p.u32()?)
                } else {
                    None
                };
                Field::OneMethod {
                    attr,
                    ty,
                    vtab_offset,
                    name: p.strz()?.to_str_lossy().into_owned(),
                }
            }

            Leaf::LF_METHOD => Field::Method {
                count: p.u16()?,
                method_list: TypeIndex(p.u32()?),
                name: p.strz()?.to_str_lossy().into_owned(),
            },

            Leaf::LF_NESTTYPE => {
                p.skip(2)?; // padding
                Field::NestedType {
                    ty: TypeIndex(p.u32()?),
                    name: p.strz()?.to_str_lossy().into_owned(),
                }
            }

            Leaf::LF_INDEX => {
                p.skip(2)?; // padding
                Field::Index {
                    ty: TypeIndex(p.u32()?),
                }
            }

            unknown_item_kind => {
                warn!(
                    ?unknown_item_kind,
                    "unrecognized item within LF_FIELDLIST; abandoning the rest of the list"
                );
                break;
            }
        };

        fields.push(field);
    }

    Ok(fields)
}
