//! Leaf kinds for type records.

/// Identifies type records (and the sub-records of a field list).
///
/// See `LEAF_ENUM_e` in `cvinfo.h`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Leaf(pub u16);

macro_rules! leaf_kinds {
    (
        $(
            $code:expr, $name:ident ;
        )*
    ) => {
        #[allow(missing_docs)]
        impl Leaf {
            $(
                pub const $name: Leaf = Leaf($code);
            )*
        }

        static LEAF_NAMES: &[(Leaf, &str)] = &[
            $(
                (Leaf($code), stringify!($name)),
            )*
        ];
    }
}

leaf_kinds! {
    0x1001, LF_MODIFIER;
    0x1002, LF_POINTER;
    0x1003, LF_ARRAY_ST;
    0x1004, LF_CLASS_ST;
    0x1005, LF_STRUCTURE_ST;
    0x1006, LF_UNION_ST;
    0x1007, LF_ENUM_ST;
    0x1008, LF_PROCEDURE;
    0x1009, LF_MFUNCTION;

    0x1201, LF_ARGLIST;
    0x1203, LF_FIELDLIST;
    0x1205, LF_BITFIELD;
    0x1206, LF_METHODLIST;

    0x1400, LF_BCLASS;
    0x1401, LF_VBCLASS;
    0x1402, LF_IVBCLASS;
    0x1404, LF_INDEX;
    0x1409, LF_VFUNCTAB;

    0x1502, LF_ENUMERATE;
    0x1503, LF_ARRAY;
    0x1504, LF_CLASS;
    0x1505, LF_STRUCTURE;
    0x1506, LF_UNION;
    0x1507, LF_ENUM;
    0x150a, LF_ALIAS;
    0x150d, LF_MEMBER;
    0x150e, LF_STMEMBER;
    0x150f, LF_METHOD;
    0x1510, LF_NESTTYPE;
    0x1511, LF_ONEMETHOD;

    // Numeric leaves. These never start a type record; they appear inline
    // wherever a record embeds a size, offset, or enumerate value.
    0x8000, LF_CHAR;
    0x8001, LF_SHORT;
    0x8002, LF_USHORT;
    0x8003, LF_LONG;
    0x8004, LF_ULONG;
    0x8005, LF_REAL32;
    0x8006, LF_REAL64;
    0x8007, LF_REAL80;
    0x8009, LF_QUADWORD;
    0x800a, LF_UQUADWORD;
}

impl Leaf {
    /// Numeric leaves below `LF_CHAR` are immediate `u16` values.
    pub fn is_immediate_numeric(self) -> bool {
        self.0 < Leaf::LF_CHAR.0
    }

    /// Gets the symbolic name of this leaf kind, if it is one this crate knows.
    pub fn name(self) -> Option<&'static str> {
        LEAF_NAMES
            .iter()
            .find(|(leaf, _)| *leaf == self)
            .map(|(_, name)| *name)
    }
}

impl std::fmt::Debug for Leaf {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(name) = self.name() {
            fmt.write_str(name)
        } else {
            write!(fmt, "Leaf(0x{:04x})", self.0)
        }
    }
}
