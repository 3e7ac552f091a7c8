//! The layout builder: walks the resolved type graph and produces a
//! [`StructRecord`] tree with concrete member addresses.

use crate::error::{Error, Result};
use crate::tpi::{Ty, TypeGraph};
use crate::types::fields::Field;
use crate::types::{TypeData, TypeIndex};
use tracing::warn;

/// One node of a recursive layout: a primitive, a composite with named
/// children, an array with indexed children, a bitfield, or a pointer.
#[derive(Clone, Debug, Default)]
pub struct StructRecord {
    /// The member or element name of this node within its parent: a member
    /// name for composites, `[i]` for array elements, the type name at the
    /// root.
    pub level_name: String,
    /// Numeric value, for constants and enumerates.
    pub value: Option<i64>,
    /// The rendered type name. Always equal to `type_name` of the type this
    /// node was built from.
    pub type_name: String,
    /// Absolute address of this node.
    pub address: u64,
    /// Size in bytes; -1 when the type has no meaningful size.
    pub size: i64,
    /// Bit offset within the storage unit, for bitfield members.
    pub bit_offset: Option<u8>,
    /// Bit width, for bitfield members.
    pub bit_size: Option<u8>,
    /// Child nodes: members in declaration order for composites, elements in
    /// index order for arrays. `None` for leaves and pruned levels.
    pub fields: Option<Vec<StructRecord>>,
    /// True for pointer-typed nodes.
    pub is_pointer: bool,
    /// True for pointers whose pointee is a procedure type.
    pub is_func_pointer: bool,
    /// True for floating-point primitives.
    pub is_real: bool,
    /// True for signed integer primitives.
    pub has_sign: bool,
    /// The type index this node was built from.
    pub type_index: u32,
}

impl StructRecord {
    /// Looks up a child of a composite by member name.
    pub fn field(&self, name: &str) -> Option<&StructRecord> {
        self.fields
            .as_ref()?
            .iter()
            .find(|child| child.level_name == name)
    }

    /// Gets an array element by index.
    pub fn element(&self, index: usize) -> Option<&StructRecord> {
        self.fields.as_ref()?.get(index)
    }
}

impl TypeGraph {
    /// Builds the layout of a type at a given base address.
    ///
    /// With `recursive` false, composite and array children below the root
    /// are pruned to one level.
    pub fn layout(&self, ty: &Ty<'_>, addr: u64, recursive: bool) -> Result<StructRecord> {
        self.layout_depth(ty, addr, recursive, 0)
    }

    fn layout_depth(
        &self,
        ty: &Ty<'_>,
        addr: u64,
        recursive: bool,
        depth: u32,
    ) -> Result<StructRecord> {
        let mut record = StructRecord {
            type_name: self.type_name(ty),
            address: addr,
            size: self.size_of(ty),
            type_index: ty.index().0,
            ..StructRecord::default()
        };

        let descend = recursive || depth == 0;

        match ty {
            Ty::Primitive(p) => {
                record.level_name = p.name.to_string();
                record.is_pointer = p.is_pointer;
                record.is_real = p.is_real;
                record.has_sign = p.has_sign;
            }

            Ty::Record { record: type_record, .. } => match &type_record.data {
                TypeData::Struct(s) => {
                    if descend {
                        record.fields =
                            Some(self.layout_members(s.fields, addr, recursive, depth)?);
                    }
                }

                TypeData::Union(u) => {
                    // Union members carry zero offsets, so every child shares
                    // the parent's address.
                    if descend {
                        record.fields =
                            Some(self.layout_members(u.fields, addr, recursive, depth)?);
                    }
                }

                TypeData::Array(a) => {
                    if descend {
                        let elem = self.get(a.element_type)?;
                        let elem_size = self.size_of(&elem);
                        let count = if elem_size > 0 { a.size / elem_size } else { 0 };

                        let mut children = Vec::with_capacity(count as usize);
                        for i in 0..count {
                            let elem_addr = addr.wrapping_add((i * elem_size) as u64);
                            let mut child =
                                self.layout_depth(&elem, elem_addr, recursive, depth + 1)?;
                            child.level_name = format!("[{i}]");
                            children.push(child);
                        }
                        record.fields = Some(children);
                    }
                    record.level_name = a.name.clone();
                }

                TypeData::Bitfield(b) => {
                    record.bit_offset = Some(b.position);
                    record.bit_size = Some(b.length);
                    if let Ok(Ty::Primitive(base)) = self.get(b.base_type) {
                        record.is_real = base.is_real;
                        record.has_sign = base.has_sign;
                    }
                }

                TypeData::Pointer(p) => {
                    record.is_pointer = true;
                    record.is_func_pointer = match self.get(p.underlying) {
                        Ok(pointee) => {
                            matches!(pointee.record().map(|r| &r.data), Some(TypeData::Proc(_)))
                        }
                        Err(_) => false,
                    };
                }

                TypeData::Enum(_) => {
                    // Enumerate values are retrieved through `enum_values`
                    // when the caller wants them.
                }

                TypeData::Modifier(m) => {
                    let inner = self.get(m.underlying)?;
                    let mut unwrapped = self.layout_depth(&inner, addr, recursive, depth)?;
                    unwrapped.type_name = self.type_name(ty);
                    unwrapped.type_index = ty.index().0;
                    return Ok(unwrapped);
                }

                TypeData::Proc(_)
                | TypeData::ArgList(_)
                | TypeData::FieldList(_)
                | TypeData::Unknown(_) => {}
            },
        }

        Ok(record)
    }

    /// Lays out the data members of a composite's field list. Non-member
    /// fields (nested types, static members, methods, bases, vtable
    /// pointers) occupy no storage at this level and are skipped.
    fn layout_members(
        &self,
        fields: TypeIndex,
        addr: u64,
        recursive: bool,
        depth: u32,
    ) -> Result<Vec<StructRecord>> {
        let field_list = match self.get(fields) {
            Ok(Ty::Record { record, .. }) => match &record.data {
                TypeData::FieldList(list) => &list.fields,
                _ => return Ok(Vec::new()),
            },
            _ => return Ok(Vec::new()),
        };

        let mut children = Vec::new();
        for field in field_list {
            let Field::Member {
                ty, offset, name, ..
            } = field
            else {
                continue;
            };

            let member_ty = match self.get(*ty) {
                Ok(member_ty) => member_ty,
                Err(e) => {
                    warn!(member = %name, error = %e, "skipping member with unresolvable type");
                    continue;
                }
            };

            let member_addr = addr.wrapping_add(*offset as u64);
            let mut child = self.layout_depth(&member_ty, member_addr, recursive, depth + 1)?;
            child.level_name = name.clone();
            children.push(child);
        }

        Ok(children)
    }

    /// Resolves a pointer's pointee and lays it out at `addr`.
    ///
    /// Fails with [`Error::NotAPointer`] when the type has no pointee.
    pub fn deref_pointer(&self, ty: &Ty<'_>, addr: u64) -> Result<StructRecord> {
        let pointee = match ty {
            Ty::Record { record, .. } => match &record.data {
                TypeData::Pointer(p) => self.get(p.underlying)?,
                _ => return Err(Error::NotAPointer),
            },
            Ty::Primitive(p) => match p.utype {
                Some(utype) => self.get(utype)?,
                None => return Err(Error::NotAPointer),
            },
        };

        self.layout(&pointee, addr, true)
    }
}
