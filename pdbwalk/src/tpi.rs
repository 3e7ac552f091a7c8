//! The TPI stream (stream 2) and the resolved type graph.
//!
//! The TPI stream holds a dense array of variable-length type records,
//! numbered from `type_index_begin` to `type_index_end - 1`. Composite
//! records may be forward references (declarations); resolution joins them by
//! name to their definitions, rewrites every reference attribute, and drops
//! the resolved declarations from the graph.

use crate::error::{Error, Result};
use crate::types::primitive::{primitive_by_name, primitive_type, PrimitiveType};
use crate::types::{
    ArgList, Leaf, Modifier, Pointer, Proc, TypeData, TypeIndex, TypeRecord,
};
use std::collections::{BTreeMap, HashMap};
use std::mem::size_of;
use tracing::warn;
use zerocopy::byteorder::{LE, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The header of the TPI stream.
#[derive(Clone, IntoBytes, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
#[allow(missing_docs)]
pub struct TpiStreamHeader {
    pub version: U32<LE>,
    /// Offset of the first type record within the stream.
    pub header_size: U32<LE>,
    pub type_index_begin: U32<LE>,
    pub type_index_end: U32<LE>,
    /// Total size in bytes of the record array.
    pub type_record_bytes: U32<LE>,

    // Hash metadata. Parsed for completeness; the graph does not use it.
    pub hash_stream: U16<LE>,
    pub hash_aux_stream: U16<LE>,
    pub hash_key_size: U32<LE>,
    pub num_hash_buckets: U32<LE>,
    pub hash_value_buffer_offset: U32<LE>,
    pub hash_value_buffer_length: U32<LE>,
    pub index_offset_buffer_offset: U32<LE>,
    pub index_offset_buffer_length: U32<LE>,
    pub hash_adj_buffer_offset: U32<LE>,
    pub hash_adj_buffer_length: U32<LE>,
}

static_assertions::const_assert_eq!(size_of::<TpiStreamHeader>(), 56);

/// A type, as handed out by graph queries: either a primitive or a reference
/// to a record in the graph.
#[derive(Clone, Debug)]
pub enum Ty<'a> {
    /// A built-in type, decoded from an index below `type_index_begin`.
    Primitive(PrimitiveType),
    /// A record stored in the TPI.
    Record {
        /// The record's type index.
        index: TypeIndex,
        /// The decoded record.
        record: &'a TypeRecord,
    },
}

impl<'a> Ty<'a> {
    /// The type index behind this type.
    pub fn index(&self) -> TypeIndex {
        match self {
            Ty::Primitive(p) => p.index,
            Ty::Record { index, .. } => *index,
        }
    }

    /// The record, for non-primitive types.
    pub fn record(&self) -> Option<&'a TypeRecord> {
        match self {
            Ty::Primitive(_) => None,
            Ty::Record { record, .. } => Some(record),
        }
    }
}

/// The fully parsed and resolved type universe of one PDB.
pub struct TypeGraph {
    type_index_begin: u32,
    type_index_end: u32,

    /// Records by type index. Resolved forward references are absent.
    records: BTreeMap<u32, TypeRecord>,

    /// Composite/enum name to type index, last definition wins.
    names: HashMap<String, u32>,

    /// Architecture pointer width in bytes, from the DBI machine field.
    pointer_width: i64,
}

impl TypeGraph {
    /// Parses the TPI stream and resolves forward references.
    ///
    /// An empty stream yields an empty graph whose index range is
    /// `[0x1000, 0x1000)`.
    pub fn parse(stream_data: &[u8], pointer_width: i64) -> Result<TypeGraph> {
        if stream_data.is_empty() {
            return Ok(TypeGraph {
                type_index_begin: TypeIndex::MIN_BEGIN.0,
                type_index_end: TypeIndex::MIN_BEGIN.0,
                records: BTreeMap::new(),
                names: HashMap::new(),
                pointer_width,
            });
        }

        let Ok((header, _)) = TpiStreamHeader::ref_from_prefix(stream_data) else {
            return Err(Error::TruncatedRecord);
        };

        let type_index_begin = header.type_index_begin.get();
        let type_index_end = header.type_index_end.get();
        let header_size = header.header_size.get() as usize;
        let Some(body) = stream_data.get(header_size..) else {
            return Err(Error::TruncatedRecord);
        };

        let mut records: BTreeMap<u32, TypeRecord> = BTreeMap::new();
        let mut index = type_index_begin;
        let mut pos = 0usize;

        while pos + 4 <= body.len() {
            let len = u16::from_le_bytes([body[pos], body[pos + 1]]) as usize;
            if len < 2 {
                warn!(pos, "type record with zero-length payload; stopping");
                break;
            }
            if pos + 2 + len > body.len() {
                return Err(Error::TruncatedRecord);
            }

            let kind = Leaf(u16::from_le_bytes([body[pos + 2], body[pos + 3]]));
            let payload = &body[pos + 4..pos + 2 + len];

            let record = TypeRecord::parse(kind, payload)
                .map_err(|_| Error::UnsupportedLeaf(kind.0))?;
            records.insert(index, record);

            index += 1;
            pos += 2 + len;
        }

        if index != type_index_end {
            warn!(
                parsed = index - type_index_begin,
                declared = type_index_end - type_index_begin,
                "TPI record count does not match the declared index range"
            );
        }

        let mut graph = TypeGraph {
            type_index_begin,
            type_index_end: index,
            records,
            names: HashMap::new(),
            pointer_width,
        };
        graph.resolve_fwdrefs();
        graph.build_name_index();
        Ok(graph)
    }

    /// Joins forward references to their definitions by name, rewrites every
    /// reference attribute, and drops the resolved declarations.
    fn resolve_fwdrefs(&mut self) {
        // Pass 1a: collect forward references by name.
        let mut fwd_by_name: HashMap<&str, Vec<u32>> = HashMap::new();
        for (&index, record) in self.records.iter() {
            if record.is_fwdref() {
                if let Some(name) = record.name() {
                    fwd_by_name.entry(name).or_default().push(index);
                }
            }
        }

        if fwd_by_name.is_empty() {
            return;
        }

        // Pass 1b: join against definitions. The last definition with a given
        // name wins, matching the index policy used for symbols.
        let mut fwd_to_real: HashMap<u32, u32> = HashMap::new();
        let mut resolved_names: HashMap<&str, ()> = HashMap::new();
        for (&index, record) in self.records.iter() {
            // Only composites and enums can define a forward reference.
            if record.property().map_or(true, |p| p.fwdref()) {
                continue;
            }
            let Some(name) = record.name() else { continue };
            if let Some(fwd_indices) = fwd_by_name.get(name) {
                for &fwd in fwd_indices {
                    fwd_to_real.insert(fwd, index);
                }
                resolved_names.insert(name, ());
            }
        }

        for (name, _) in fwd_by_name.iter() {
            if !resolved_names.contains_key(name) {
                warn!("{}", Error::UnresolvedFwdref((*name).to_string()));
            }
        }

        // The borrow of names above ends here; now mutate.
        let fwd_by_name: Vec<u32> = fwd_to_real.keys().copied().collect();

        // Pass 2: rewrite every reference attribute.
        for record in self.records.values_mut() {
            rewrite_refs(record, &fwd_to_real);
        }

        // Drop the resolved declarations.
        for fwd in fwd_by_name {
            self.records.remove(&fwd);
        }
    }

    fn build_name_index(&mut self) {
        for (&index, record) in self.records.iter() {
            if record.is_fwdref() {
                continue;
            }
            match record.data {
                TypeData::Struct(_) | TypeData::Union(_) | TypeData::Enum(_) => {
                    if let Some(name) = record.name() {
                        // Ascending index order; the last definition wins.
                        self.names.insert(name.to_string(), index);
                    }
                }
                _ => {}
            }
        }
    }

    /// The first type index stored as a record.
    pub fn type_index_begin(&self) -> u32 {
        self.type_index_begin
    }

    /// One past the last type index stored as a record.
    pub fn type_index_end(&self) -> u32 {
        self.type_index_end
    }

    /// The architecture pointer width, in bytes.
    pub fn pointer_width(&self) -> i64 {
        self.pointer_width
    }

    /// Looks up a type by index: the primitive table below
    /// `type_index_begin`, the record table at or above it.
    pub fn get(&self, index: TypeIndex) -> Result<Ty<'_>> {
        if index.0 < self.type_index_begin {
            primitive_type(index)
                .map(Ty::Primitive)
                .ok_or(Error::UnknownTypeIndex(index))
        } else {
            self.records
                .get(&index.0)
                .map(|record| Ty::Record { index, record })
                .ok_or(Error::UnknownTypeIndex(index))
        }
    }

    /// Looks up a type by name: primitives first, then composites and enums.
    pub fn get_by_name(&self, name: &str) -> Result<Ty<'_>> {
        if let Some(p) = primitive_by_name(name) {
            return Ok(Ty::Primitive(p));
        }
        if let Some(&index) = self.names.get(name) {
            return self.get(TypeIndex(index));
        }
        Err(Error::UnknownTypeName(name.to_string()))
    }

    /// Iterates the named composites and enums of the graph.
    pub fn composite_names(&self) -> impl Iterator<Item = (&str, TypeIndex)> {
        self.names
            .iter()
            .map(|(name, &index)| (name.as_str(), TypeIndex(index)))
    }

    /// The size of a type in bytes. Returns -1 for types with no meaningful
    /// size (procedures, argument lists, retained unknown leaves).
    pub fn size_of(&self, ty: &Ty<'_>) -> i64 {
        match ty {
            Ty::Primitive(p) => p.size,
            Ty::Record { record, .. } => match &record.data {
                TypeData::Struct(s) => s.size,
                TypeData::Union(u) => u.size,
                TypeData::Array(a) => a.size,
                TypeData::Enum(_) => 4,
                TypeData::Pointer(_) => self.pointer_width,
                TypeData::Bitfield(b) => match self.get(b.base_type) {
                    Ok(base) => self.size_of(&base),
                    Err(_) => -1,
                },
                TypeData::Modifier(m) => match self.get(m.underlying) {
                    Ok(inner) => self.size_of(&inner),
                    Err(_) => -1,
                },
                TypeData::Proc(_)
                | TypeData::ArgList(_)
                | TypeData::FieldList(_)
                | TypeData::Unknown(_) => -1,
            },
        }
    }

    /// Renders a display name for a type.
    pub fn type_name(&self, ty: &Ty<'_>) -> String {
        match ty {
            Ty::Primitive(p) => p.name.to_string(),
            Ty::Record { record, .. } => match &record.data {
                TypeData::Struct(s) => s.name.clone(),
                TypeData::Union(u) => u.name.clone(),
                TypeData::Enum(e) => e.name.clone(),
                TypeData::Array(_) => self.array_name(ty),
                TypeData::Pointer(ptr) => self.pointer_name(ptr),
                TypeData::Modifier(m) => self.modifier_name(m),
                TypeData::Bitfield(b) => {
                    let base = match self.get(b.base_type) {
                        Ok(base) => self.type_name(&base),
                        Err(_) => "?".to_string(),
                    };
                    format!("{} : {}", base, b.length)
                }
                TypeData::Proc(proc) => {
                    let (ret, args) = self.proc_signature(proc);
                    format!("{ret} ({args})")
                }
                TypeData::ArgList(_) | TypeData::FieldList(_) | TypeData::Unknown(_) => {
                    format!("{:?}", record.kind)
                }
            },
        }
    }

    /// Collects nested array extents: `elem[d1][d2]…`, with parentheses
    /// around pointer-typed elements.
    fn array_name(&self, ty: &Ty<'_>) -> String {
        let mut dims = String::new();
        let mut current = ty.clone();

        loop {
            let Ty::Record { record, .. } = &current else {
                break;
            };
            let TypeData::Array(a) = &record.data else {
                break;
            };

            let elem = match self.get(a.element_type) {
                Ok(elem) => elem,
                Err(_) => return format!("?{dims}"),
            };
            let elem_size = self.size_of(&elem);
            let count = if elem_size > 0 { a.size / elem_size } else { 0 };
            dims.push_str(&format!("[{count}]"));
            current = elem;
        }

        let elem_is_pointer = match &current {
            Ty::Primitive(p) => p.is_pointer,
            Ty::Record { record, .. } => matches!(record.data, TypeData::Pointer(_)),
        };
        let elem_name = self.type_name(&current);
        if elem_is_pointer {
            format!("({elem_name}){dims}")
        } else {
            format!("{elem_name}{dims}")
        }
    }

    fn pointer_name(&self, ptr: &Pointer) -> String {
        match self.get(ptr.underlying) {
            Ok(pointee) => {
                if let Some(record) = pointee.record() {
                    if let TypeData::Proc(proc) = &record.data {
                        let (ret, args) = self.proc_signature(proc);
                        return format!("{ret} (*)({args})");
                    }
                }
                format!("{} *", self.type_name(&pointee))
            }
            Err(_) => "? *".to_string(),
        }
    }

    fn modifier_name(&self, m: &Modifier) -> String {
        let mut out = String::new();
        if m.attrs.is_const() {
            out.push_str("const ");
        }
        if m.attrs.is_volatile() {
            out.push_str("volatile ");
        }
        if m.attrs.is_unaligned() {
            out.push_str("unaligned ");
        }
        match self.get(m.underlying) {
            Ok(inner) => out.push_str(&self.type_name(&inner)),
            Err(_) => out.push('?'),
        }
        out
    }

    /// Renders a procedure's return type and argument list.
    fn proc_signature(&self, proc: &Proc) -> (String, String) {
        let ret = match self.get(proc.return_type) {
            Ok(ret) => self.type_name(&ret),
            Err(_) => "?".to_string(),
        };

        let args = match self.get(proc.arg_list) {
            Ok(Ty::Record { record, .. }) => match &record.data {
                TypeData::ArgList(ArgList { args }) => args
                    .iter()
                    .map(|&arg| match self.get(arg) {
                        Ok(a) => self.type_name(&a),
                        Err(_) => "?".to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => String::new(),
            },
            _ => String::new(),
        };

        (ret, args)
    }

    /// The named values of an enum, read from its field list. Returns `None`
    /// for non-enum types.
    pub fn enum_values(&self, ty: &Ty<'_>) -> Option<Vec<(String, i64)>> {
        let record = ty.record()?;
        let TypeData::Enum(e) = &record.data else {
            return None;
        };

        let fields = match self.get(e.fields) {
            Ok(Ty::Record { record, .. }) => record,
            _ => return Some(Vec::new()),
        };
        let TypeData::FieldList(list) = &fields.data else {
            return Some(Vec::new());
        };

        Some(
            list.fields
                .iter()
                .filter_map(|f| match f {
                    crate::types::fields::Field::Enumerate { value, name, .. } => {
                        Some((name.clone(), *value))
                    }
                    _ => None,
                })
                .collect(),
        )
    }
}

fn rewrite_refs(record: &mut TypeRecord, map: &HashMap<u32, u32>) {
    let fix = |ti: &mut TypeIndex| {
        if let Some(&real) = map.get(&ti.0) {
            *ti = TypeIndex(real);
        }
    };

    use crate::types::fields::Field;
    match &mut record.data {
        TypeData::Modifier(m) => fix(&mut m.underlying),
        TypeData::Pointer(p) => fix(&mut p.underlying),
        TypeData::Proc(p) => {
            fix(&mut p.return_type);
            fix(&mut p.arg_list);
        }
        TypeData::ArgList(a) => {
            for arg in a.args.iter_mut() {
                fix(arg);
            }
        }
        TypeData::Array(a) => {
            fix(&mut a.element_type);
            fix(&mut a.index_type);
        }
        TypeData::Bitfield(b) => fix(&mut b.base_type),
        TypeData::FieldList(list) => {
            for field in list.fields.iter_mut() {
                match field {
                    Field::Member { ty, .. }
                    | Field::StaticMember { ty, .. }
                    | Field::BaseClass { ty, .. }
                    | Field::VFuncTable { ty }
                    | Field::OneMethod { ty, .. }
                    | Field::NestedType { ty, .. }
                    | Field::Index { ty } => fix(ty),
                    Field::Method { method_list, .. } => fix(method_list),
                    Field::Enumerate { .. } => {}
                }
            }
        }
        TypeData::Enum(e) => {
            fix(&mut e.underlying_type);
            fix(&mut e.fields);
        }
        TypeData::Struct(s) => {
            fix(&mut s.fields);
            fix(&mut s.derived);
            fix(&mut s.vshape);
        }
        TypeData::Union(u) => fix(&mut u.fields),
        TypeData::Unknown(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeData;

    fn record(out: &mut Vec<u8>, kind: Leaf, payload: &[u8]) {
        out.extend_from_slice(&((payload.len() + 2) as u16).to_le_bytes());
        out.extend_from_slice(&kind.0.to_le_bytes());
        out.extend_from_slice(payload);
    }

    fn tpi_stream(records: &[(Leaf, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (kind, payload) in records {
            record(&mut body, *kind, payload);
        }

        let mut stream = vec![0u8; 56];
        let put = |s: &mut Vec<u8>, at: usize, v: u32| {
            s[at..at + 4].copy_from_slice(&v.to_le_bytes())
        };
        put(&mut stream, 0, 20131206); // version
        put(&mut stream, 4, 56); // header_size
        put(&mut stream, 8, 0x1000);
        put(&mut stream, 12, 0x1000 + records.len() as u32);
        put(&mut stream, 16, body.len() as u32);
        stream.extend_from_slice(&body);
        stream
    }

    fn structure(fwdref: bool, size: u16, fields: u32, name: &str) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&2u16.to_le_bytes());
        p.extend_from_slice(&(if fwdref { 0x0080u16 } else { 0 }).to_le_bytes());
        p.extend_from_slice(&fields.to_le_bytes());
        p.extend_from_slice(&0u32.to_le_bytes());
        p.extend_from_slice(&0u32.to_le_bytes());
        p.extend_from_slice(&size.to_le_bytes());
        p.extend_from_slice(name.as_bytes());
        p.push(0);
        p
    }

    fn member(ty: u32, offset: u16, name: &str) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&Leaf::LF_MEMBER.0.to_le_bytes());
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(&ty.to_le_bytes());
        p.extend_from_slice(&offset.to_le_bytes());
        p.extend_from_slice(name.as_bytes());
        p.push(0);
        let pad = (4 - p.len() % 4) % 4;
        for i in 0..pad {
            p.push(0xf0 | (pad - i) as u8);
        }
        p
    }

    fn pointer(utype: u32) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&utype.to_le_bytes());
        p.extend_from_slice(&0x0000_800Cu32.to_le_bytes());
        p
    }

    #[test]
    fn empty_stream_yields_empty_graph() {
        let graph = TypeGraph::parse(&[], 8).unwrap();
        assert_eq!(graph.type_index_begin(), 0x1000);
        assert!(matches!(
            graph.get(TypeIndex(0x1000)),
            Err(Error::UnknownTypeIndex(_))
        ));
        // Primitives still resolve.
        let int4 = graph.get(TypeIndex(0x74)).unwrap();
        assert_eq!(graph.size_of(&int4), 4);
    }

    #[test]
    fn fwdref_resolution_rewrites_and_drops() {
        let mut fieldlist = member(0x74, 0, "a");
        fieldlist.extend_from_slice(&member(0x74, 4, "b"));

        let stream = tpi_stream(&[
            (Leaf::LF_STRUCTURE, structure(true, 0, 0, "Foo")), // 0x1000
            (Leaf::LF_STRUCTURE, structure(false, 8, 0x1002, "Foo")), // 0x1001
            (Leaf::LF_FIELDLIST, fieldlist),                    // 0x1002
            (Leaf::LF_POINTER, pointer(0x1000)),                // 0x1003 -> fwdref
        ]);

        let graph = TypeGraph::parse(&stream, 8).unwrap();

        // The declaration is gone.
        assert!(graph.get(TypeIndex(0x1000)).is_err());

        // The definition resolves by name and reports its size.
        let foo = graph.get_by_name("Foo").unwrap();
        assert_eq!(foo.index(), TypeIndex(0x1001));
        assert_eq!(graph.size_of(&foo), 8);

        // The pointer's reference was rewritten to the definition.
        let ptr = graph.get(TypeIndex(0x1003)).unwrap();
        match &ptr.record().unwrap().data {
            TypeData::Pointer(p) => assert_eq!(p.underlying, TypeIndex(0x1001)),
            other => panic!("unexpected record {other:?}"),
        }
        assert_eq!(graph.type_name(&ptr), "Foo *");
    }

    #[test]
    fn unresolved_fwdref_is_kept() {
        let stream = tpi_stream(&[(Leaf::LF_STRUCTURE, structure(true, 0, 0, "Ghost"))]);
        let graph = TypeGraph::parse(&stream, 8).unwrap();
        let ghost = graph.get(TypeIndex(0x1000)).unwrap();
        assert!(ghost.record().unwrap().is_fwdref());
    }

    #[test]
    fn no_record_reachable_after_resolution_is_fwdref() {
        let stream = tpi_stream(&[
            (Leaf::LF_STRUCTURE, structure(true, 0, 0, "Foo")),
            (Leaf::LF_STRUCTURE, structure(false, 8, 0, "Foo")),
        ]);
        let graph = TypeGraph::parse(&stream, 8).unwrap();
        for index in graph.type_index_begin()..graph.type_index_end() {
            if let Ok(ty) = graph.get(TypeIndex(index)) {
                assert!(!ty.record().unwrap().is_fwdref());
            }
        }
    }

    #[test]
    fn pointer_width_drives_pointer_size() {
        let stream = tpi_stream(&[(Leaf::LF_POINTER, pointer(0x74))]);
        let graph32 = TypeGraph::parse(&stream, 4).unwrap();
        let ptr = graph32.get(TypeIndex(0x1000)).unwrap();
        assert_eq!(graph32.size_of(&ptr), 4);

        let graph64 = TypeGraph::parse(&stream, 8).unwrap();
        let ptr = graph64.get(TypeIndex(0x1000)).unwrap();
        assert_eq!(graph64.size_of(&ptr), 8);
    }

    #[test]
    fn array_and_proc_names() {
        // int[3] with int extents, and int (*)(int, char).
        let mut array = Vec::new();
        array.extend_from_slice(&0x74u32.to_le_bytes()); // element
        array.extend_from_slice(&0x74u32.to_le_bytes()); // index type
        array.extend_from_slice(&12u16.to_le_bytes()); // size, immediate
        array.push(0); // empty name

        let mut arglist = Vec::new();
        arglist.extend_from_slice(&2u32.to_le_bytes());
        arglist.extend_from_slice(&0x74u32.to_le_bytes());
        arglist.extend_from_slice(&0x10u32.to_le_bytes());

        let mut proc = Vec::new();
        proc.extend_from_slice(&0x74u32.to_le_bytes()); // return
        proc.push(0); // call
        proc.push(0);
        proc.extend_from_slice(&2u16.to_le_bytes());
        proc.extend_from_slice(&0x1001u32.to_le_bytes()); // arglist

        let stream = tpi_stream(&[
            (Leaf::LF_ARRAY, array),
            (Leaf::LF_ARGLIST, arglist),
            (Leaf::LF_PROCEDURE, proc),
            (Leaf::LF_POINTER, pointer(0x1002)),
        ]);
        let graph = TypeGraph::parse(&stream, 8).unwrap();

        let arr = graph.get(TypeIndex(0x1000)).unwrap();
        assert_eq!(graph.type_name(&arr), "T_INT4[3]");
        assert_eq!(graph.size_of(&arr), 12);

        let fnptr = graph.get(TypeIndex(0x1003)).unwrap();
        assert_eq!(graph.type_name(&fnptr), "T_INT4 (*)(T_INT4, T_CHAR)");
    }

    #[test]
    fn modifier_names_prepend_tokens() {
        let mut modifier = Vec::new();
        modifier.extend_from_slice(&0x74u32.to_le_bytes());
        modifier.extend_from_slice(&3u16.to_le_bytes()); // const volatile

        let stream = tpi_stream(&[(Leaf::LF_MODIFIER, modifier)]);
        let graph = TypeGraph::parse(&stream, 8).unwrap();
        let m = graph.get(TypeIndex(0x1000)).unwrap();
        assert_eq!(graph.type_name(&m), "const volatile T_INT4");
        assert_eq!(graph.size_of(&m), 4);
    }

    #[test]
    fn enum_values_come_from_the_fieldlist() {
        let mut fieldlist = Vec::new();
        fieldlist.extend_from_slice(&Leaf::LF_ENUMERATE.0.to_le_bytes());
        fieldlist.extend_from_slice(&3u16.to_le_bytes());
        fieldlist.extend_from_slice(&0u16.to_le_bytes()); // RED = 0
        fieldlist.extend_from_slice(b"RED\0");

        let mut e = Vec::new();
        e.extend_from_slice(&1u16.to_le_bytes());
        e.extend_from_slice(&0u16.to_le_bytes());
        e.extend_from_slice(&0x74u32.to_le_bytes()); // utype
        e.extend_from_slice(&0x1000u32.to_le_bytes()); // fields
        e.extend_from_slice(b"Color\0");

        let stream = tpi_stream(&[(Leaf::LF_FIELDLIST, fieldlist), (Leaf::LF_ENUM, e)]);
        let graph = TypeGraph::parse(&stream, 8).unwrap();

        let color = graph.get_by_name("Color").unwrap();
        assert_eq!(graph.size_of(&color), 4);
        assert_eq!(
            graph.enum_values(&color).unwrap(),
            vec![("RED".to_string(), 0)]
        );
    }
}
