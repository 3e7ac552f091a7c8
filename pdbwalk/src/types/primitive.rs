//! Built-in primitive types.
//!
//! Type indices below `type_index_begin` denote primitive types and are never
//! stored as records. The low byte names the base type; bits 8-11 encode the
//! pointer mode (0 = value, 4 = 32-bit pointer, 6 = 64-bit pointer, 1-3 are
//! legacy 16-bit-era pointers).

use super::TypeIndex;
use std::borrow::Cow;

/// A fully described primitive type.
#[derive(Clone, Debug)]
pub struct PrimitiveType {
    /// The primitive's type index.
    pub index: TypeIndex,
    /// Display name, e.g. `T_INT4` or `T_64PVOID`.
    pub name: Cow<'static, str>,
    /// Size in bytes.
    pub size: i64,
    /// True for signed integer types.
    pub has_sign: bool,
    /// True for floating-point types.
    pub is_real: bool,
    /// True for the pointer modes.
    pub is_pointer: bool,
    /// For pointer modes, the index of the pointee primitive.
    pub utype: Option<TypeIndex>,
}

/// `(base byte, name, size, has_sign, is_real)`
///
/// See `TYPE_ENUM_e` in `cvinfo.h`.
static BASE_TYPES: &[(u8, &str, i64, bool, bool)] = &[
    (0x00, "T_NOTYPE", 0, false, false),
    (0x03, "T_VOID", 4, false, false),
    (0x08, "T_HRESULT", 4, false, false),
    (0x10, "T_CHAR", 1, true, false),
    (0x11, "T_SHORT", 2, true, false),
    (0x12, "T_LONG", 4, true, false),
    (0x13, "T_QUAD", 8, true, false),
    (0x20, "T_UCHAR", 1, false, false),
    (0x21, "T_USHORT", 2, false, false),
    (0x22, "T_ULONG", 4, false, false),
    (0x23, "T_UQUAD", 8, false, false),
    (0x30, "T_BOOL08", 1, false, false),
    (0x31, "T_BOOL16", 2, false, false),
    (0x32, "T_BOOL32", 4, false, false),
    (0x33, "T_BOOL64", 8, false, false),
    (0x40, "T_REAL32", 4, true, true),
    (0x41, "T_REAL64", 8, true, true),
    (0x42, "T_REAL80", 10, true, true),
    (0x68, "T_INT1", 1, true, false),
    (0x69, "T_UINT1", 1, false, false),
    (0x70, "T_RCHAR", 1, false, false),
    (0x71, "T_WCHAR", 2, false, false),
    (0x72, "T_INT2", 2, true, false),
    (0x73, "T_UINT2", 2, false, false),
    (0x74, "T_INT4", 4, true, false),
    (0x75, "T_UINT4", 4, false, false),
    (0x76, "T_INT8", 8, true, false),
    (0x77, "T_UINT8", 8, false, false),
    (0x7a, "T_CHAR16", 2, false, false),
    (0x7b, "T_CHAR32", 4, false, false),
];

fn base_type(base: u8) -> Option<&'static (u8, &'static str, i64, bool, bool)> {
    BASE_TYPES.iter().find(|entry| entry.0 == base)
}

/// Decodes a primitive type index.
///
/// Returns `None` if the base byte or the mode bits are not recognized. The
/// caller is expected to have already checked that the index is below the
/// TPI's `type_index_begin`.
pub fn primitive_type(index: TypeIndex) -> Option<PrimitiveType> {
    let raw = index.0;
    if raw & !0x0fff != 0 {
        return None;
    }

    let base = (raw & 0xff) as u8;
    let mode = (raw >> 8) & 0xf;
    let &(_, name, size, has_sign, is_real) = base_type(base)?;

    match mode {
        0 => Some(PrimitiveType {
            index,
            name: Cow::Borrowed(name),
            size,
            has_sign,
            is_real,
            is_pointer: false,
            utype: None,
        }),

        1..=6 => {
            let (prefix, ptr_size) = match mode {
                1 => ("T_P", 4),
                2 => ("T_PF", 4),
                3 => ("T_PH", 4),
                4 => ("T_32P", 4),
                5 => ("T_32PF", 4),
                _ => ("T_64P", 8),
            };
            let suffix = name.strip_prefix("T_").unwrap_or(name);
            Some(PrimitiveType {
                index,
                name: Cow::Owned(format!("{prefix}{suffix}")),
                size: ptr_size,
                has_sign: false,
                is_real: false,
                is_pointer: true,
                utype: Some(TypeIndex(base as u32)),
            })
        }

        _ => None,
    }
}

/// Looks up a primitive by display name, accepting the pointer-mode name
/// prefixes (`T_32P…`, `T_64P…`, `T_P…`).
pub fn primitive_by_name(name: &str) -> Option<PrimitiveType> {
    for &(base, base_name, ..) in BASE_TYPES {
        if base_name == name {
            return primitive_type(TypeIndex(base as u32));
        }
    }

    for (prefix, mode) in [("T_32P", 4u32), ("T_64P", 6), ("T_P", 1)] {
        let Some(suffix) = name.strip_prefix(prefix) else {
            continue;
        };
        for &(base, base_name, ..) in BASE_TYPES {
            if base_name.strip_prefix("T_") == Some(suffix) {
                return primitive_type(TypeIndex((mode << 8) | base as u32));
            }
        }
    }

    None
}
