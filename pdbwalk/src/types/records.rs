//! Owned forms of the type records this crate decodes.
//!
//! Records are decoded into owned values rather than views over the stream
//! because forward-reference resolution rewrites the reference attributes in
//! place after parsing.

use super::fields::{parse_field_list, Field};
use super::number::read_numeric;
use super::{Leaf, TypeIndex};
use crate::parser::{Parser, ParserError};
use bstr::{BStr, ByteSlice};

bitfield::bitfield! {
    /// Bit field structure describing class/struct/union/enum properties.
    ///
    /// See `CV_prop_t` in `cvinfo.h`.
    #[derive(Copy, Clone)]
    pub struct UdtProperties(u16);
    impl Debug;

    pub packed,        set_packed:        0;
    pub ctor,          set_ctor:          1;
    pub ovlops,        set_ovlops:        2;
    pub isnested,      set_isnested:      3;
    pub cnested,       set_cnested:       4;
    pub opassign,      set_opassign:      5;
    pub opcast,        set_opcast:        6;
    /// True for a forward reference (declaration without a definition).
    pub fwdref,        set_fwdref:        7;
    pub scoped,        set_scoped:        8;
    /// True if a decorated name follows the regular name.
    pub hasuniquename, set_hasuniquename: 9;
}

bitfield::bitfield! {
    /// Attribute word of an `LF_MODIFIER` record.
    #[derive(Copy, Clone)]
    pub struct ModifierAttrs(u16);
    impl Debug;

    pub is_const, set_is_const: 0;
    pub is_volatile, set_is_volatile: 1;
    pub is_unaligned, set_is_unaligned: 2;
}

bitfield::bitfield! {
    /// Attribute dword of an `LF_POINTER` record.
    #[derive(Copy, Clone)]
    pub struct PointerAttrs(u32);
    impl Debug;

    pub pointer_kind, set_pointer_kind: 4, 0;
    pub mode, set_mode: 7, 5;
    pub flat32, set_flat32: 8;
    pub volatile, set_volatile: 9;
    pub r#const, set_const: 10;
    pub unaligned, set_unaligned: 11;
    pub restrict, set_restrict: 12;
    pub size, set_size: 18, 13;
}

/// A single decoded type record.
#[derive(Clone, Debug)]
pub struct TypeRecord {
    /// The record's leaf kind as stored.
    pub kind: Leaf,
    /// The decoded payload.
    pub data: TypeData,
}

/// Parsed details of a type record. Leaf kinds outside the decoded set are
/// retained as [`TypeData::Unknown`].
#[derive(Clone, Debug)]
pub enum TypeData {
    #[allow(missing_docs)]
    Modifier(Modifier),
    #[allow(missing_docs)]
    Pointer(Pointer),
    #[allow(missing_docs)]
    Proc(Proc),
    #[allow(missing_docs)]
    ArgList(ArgList),
    #[allow(missing_docs)]
    Array(Array),
    #[allow(missing_docs)]
    Bitfield(Bitfield),
    #[allow(missing_docs)]
    FieldList(FieldList),
    #[allow(missing_docs)]
    Enum(Enum),
    /// `LF_CLASS` and `LF_STRUCTURE` share one shape.
    Struct(Struct),
    #[allow(missing_docs)]
    Union(Union),
    /// Retained raw payload of a leaf kind this crate does not decode.
    Unknown(Vec<u8>),
}

/// `LF_MODIFIER`
#[derive(Clone, Debug)]
pub struct Modifier {
    /// The type being qualified.
    pub underlying: TypeIndex,
    /// `const` / `volatile` / `unaligned` bits.
    pub attrs: ModifierAttrs,
}

/// `LF_POINTER`
#[derive(Clone, Debug)]
pub struct Pointer {
    /// The pointee.
    pub underlying: TypeIndex,
    #[allow(missing_docs)]
    pub attrs: PointerAttrs,
}

/// `LF_PROCEDURE`
#[derive(Clone, Debug)]
pub struct Proc {
    /// Return type.
    pub return_type: TypeIndex,
    /// Calling convention (`CV_call_t`).
    pub call: u8,
    /// Number of parameters.
    pub num_params: u16,
    /// The `LF_ARGLIST` record holding the parameter types.
    pub arg_list: TypeIndex,
}

/// `LF_ARGLIST`
#[derive(Clone, Debug)]
pub struct ArgList {
    /// Argument types of a function signature.
    pub args: Vec<TypeIndex>,
}

/// `LF_ARRAY` and `LF_ARRAY_ST`
#[derive(Clone, Debug)]
pub struct Array {
    /// Element type.
    pub element_type: TypeIndex,
    /// The type of the indexing expression.
    pub index_type: TypeIndex,
    /// Total size of the array in bytes.
    pub size: i64,
    /// Usually empty.
    pub name: String,
}

/// `LF_BITFIELD`
#[derive(Clone, Debug)]
pub struct Bitfield {
    /// The type the bits are carved out of.
    pub base_type: TypeIndex,
    /// Number of bits.
    pub length: u8,
    /// Starting bit position within the base type.
    pub position: u8,
}

/// `LF_FIELDLIST`
#[derive(Clone, Debug)]
pub struct FieldList {
    #[allow(missing_docs)]
    pub fields: Vec<Field>,
}

/// `LF_ENUM` and `LF_ENUM_ST`
#[derive(Clone, Debug)]
pub struct Enum {
    /// Number of enumerates.
    pub count: u16,
    #[allow(missing_docs)]
    pub property: UdtProperties,
    /// The underlying integer type.
    pub underlying_type: TypeIndex,
    /// The `LF_FIELDLIST` holding the enumerates.
    pub fields: TypeIndex,
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub unique_name: Option<String>,
}

/// `LF_CLASS`, `LF_STRUCTURE` and their `_ST` variants.
#[derive(Clone, Debug)]
pub struct Struct {
    /// Number of elements, counting members, bases and methods.
    pub count: u16,
    #[allow(missing_docs)]
    pub property: UdtProperties,
    /// The `LF_FIELDLIST` holding the members.
    pub fields: TypeIndex,
    /// Derivation list; always zero in practice.
    pub derived: TypeIndex,
    /// The vtable shape record.
    pub vshape: TypeIndex,
    /// Size of an instance in bytes.
    pub size: i64,
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub unique_name: Option<String>,
}

/// `LF_UNION` and `LF_UNION_ST`
#[derive(Clone, Debug)]
pub struct Union {
    #[allow(missing_docs)]
    pub count: u16,
    #[allow(missing_docs)]
    pub property: UdtProperties,
    #[allow(missing_docs)]
    pub fields: TypeIndex,
    /// Size of an instance in bytes.
    pub size: i64,
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub unique_name: Option<String>,
}

fn owned(s: &BStr) -> String {
    s.to_str_lossy().into_owned()
}

fn type_index(p: &mut Parser<'_>) -> Result<TypeIndex, ParserError> {
    Ok(TypeIndex(p.u32()?))
}

/// Reads the optional decorated name that follows the regular name when
/// `hasuniquename` is set.
fn unique_name(
    p: &mut Parser<'_>,
    property: UdtProperties,
) -> Result<Option<String>, ParserError> {
    if property.hasuniquename() && !p.is_empty() {
        Ok(Some(owned(p.strz()?)))
    } else {
        Ok(None)
    }
}

impl TypeRecord {
    /// Parses the payload of a type record.
    ///
    /// Unknown leaf kinds are retained with their raw payload and never fail.
    pub fn parse(kind: Leaf, payload: &[u8]) -> Result<TypeRecord, ParserError> {
        let mut p = Parser::new(payload);

        let data = match kind {
            Leaf::LF_MODIFIER => TypeData::Modifier(Modifier {
                underlying: type_index(&mut p)?,
                attrs: ModifierAttrs(p.u16()?),
            }),

            Leaf::LF_POINTER => TypeData::Pointer(Pointer {
                underlying: type_index(&mut p)?,
                attrs: PointerAttrs(p.u32()?),
            }),

            Leaf::LF_PROCEDURE => {
                let return_type = type_index(&mut p)?;
                let call = p.u8()?;
                let _funcattr = p.u8()?;
                let num_params = p.u16()?;
                let arg_list = type_index(&mut p)?;
                TypeData::Proc(Proc {
                    return_type,
                    call,
                    num_params,
                    arg_list,
                })
            }

            Leaf::LF_ARGLIST => {
                let count = p.u32()? as usize;
                let mut args = Vec::with_capacity(count);
                for _ in 0..count {
                    args.push(type_index(&mut p)?);
                }
                TypeData::ArgList(ArgList { args })
            }

            Leaf::LF_ARRAY => {
                let element_type = type_index(&mut p)?;
                let index_type = type_index(&mut p)?;
                let size = read_numeric(&mut p)?;
                let name = owned(p.strz()?);
                TypeData::Array(Array {
                    element_type,
                    index_type,
                    size,
                    name,
                })
            }

            Leaf::LF_ARRAY_ST => {
                let element_type = type_index(&mut p)?;
                let index_type = type_index(&mut p)?;
                let size = p.u16()? as i64;
                let name = owned(p.strt()?);
                TypeData::Array(Array {
                    element_type,
                    index_type,
                    size,
                    name,
                })
            }

            Leaf::LF_BITFIELD => TypeData::Bitfield(Bitfield {
                base_type: type_index(&mut p)?,
                length: p.u8()?,
                position: p.u8()?,
            }),

            Leaf::LF_FIELDLIST => TypeData::FieldList(FieldList {
                fields: parse_field_list(p.take_rest())?,
            }),

            Leaf::LF_ENUM | Leaf::LF_ENUM_ST => {
                let count = p.u16()?;
                let property = UdtProperties(p.u16()?);
                let underlying_type = type_index(&mut p)?;
                let fields = type_index(&mut p)?;
                let name = if kind == Leaf::LF_ENUM {
                    owned(p.strz()?)
                } else {
                    owned(p.strt()?)
                };
                let unique_name = unique_name(&mut p, property)?;
                TypeData::Enum(Enum {
                    count,
                    property,
                    underlying_type,
                    fields,
                    name,
                    unique_name,
                })
            }

            Leaf::LF_CLASS | Leaf::LF_STRUCTURE | Leaf::LF_CLASS_ST | Leaf::LF_STRUCTURE_ST => {
                let count = p.u16()?;
                let property = UdtProperties(p.u16()?);
                let fields = type_index(&mut p)?;
                let derived = type_index(&mut p)?;
                let vshape = type_index(&mut p)?;
                let (size, name) =
                    if matches!(kind, Leaf::LF_CLASS | Leaf::LF_STRUCTURE) {
                        (read_numeric(&mut p)?, owned(p.strz()?))
                    } else {
                        (p.u16()? as i64, owned(p.strt()?))
                    };
                let unique_name = unique_name(&mut p, property)?;
                TypeData::Struct(Struct {
                    count,
                    property,
                    fields,
                    derived,
                    vshape,
                    size,
                    name,
                    unique_name,
                })
            }

            Leaf::LF_UNION | Leaf::LF_UNION_ST => {
                let count = p.u16()?;
                let property = UdtProperties(p.u16()?);
                let fields = type_index(&mut p)?;
                let (size, name) = if kind == Leaf::LF_UNION {
                    (read_numeric(&mut p)?, owned(p.strz()?))
                } else {
                    (p.u16()? as i64, owned(p.strt()?))
                };
                let unique_name = unique_name(&mut p, property)?;
                TypeData::Union(Union {
                    count,
                    property,
                    fields,
                    size,
                    name,
                    unique_name,
                })
            }

            _ => TypeData::Unknown(payload.to_vec()),
        };

        Ok(TypeRecord { kind, data })
    }

    /// The composite's UDT property word, if this record has one.
    pub fn property(&self) -> Option<UdtProperties> {
        match &self.data {
            TypeData::Struct(s) => Some(s.property),
            TypeData::Union(u) => Some(u.property),
            TypeData::Enum(e) => Some(e.property),
            _ => None,
        }
    }

    /// The composite or enum name, if this record has one.
    pub fn name(&self) -> Option<&str> {
        match &self.data {
            TypeData::Struct(s) => Some(&s.name),
            TypeData::Union(u) => Some(&u.name),
            TypeData::Enum(e) => Some(&e.name),
            TypeData::Array(a) if !a.name.is_empty() => Some(&a.name),
            _ => None,
        }
    }

    /// True if this record is a declaration-only forward reference.
    pub fn is_fwdref(&self) -> bool {
        self.property().is_some_and(|p| p.fwdref())
    }
}
