//! End-to-end tests over synthetic in-memory PDB images.

use pdbwalk::{Error, MachineKind, OpenOptions, Pdb, TypeIndex};
use sync_file::ReadAt;

/// An in-memory file that implements [`ReadAt`].
struct TestFile {
    data: Vec<u8>,
}

impl ReadAt for TestFile {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        self.data.read_exact_at(buf, offset)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        self.data.read_at(buf, offset)
    }
}

fn open(image: Vec<u8>) -> Result<Pdb, Error> {
    Pdb::from_file(TestFile { data: image }, OpenOptions::default())
}

// ---------------------------------------------------------------------------
// MSF image builder
// ---------------------------------------------------------------------------

const PS: usize = 0x1000;
const MSF_MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\x00\x00\x00";

/// Assembles an MSF 7.00 image: header page, two reserved FPM pages, stream
/// pages, directory pages, and the block-map page.
fn build_msf(streams: &[Vec<u8>]) -> Vec<u8> {
    let pages_for = |len: usize| len.div_ceil(PS);

    let mut next_page: u32 = 3;
    let mut dir: Vec<u32> = vec![streams.len() as u32];
    for s in streams {
        dir.push(s.len() as u32);
    }

    let mut stream_starts = Vec::new();
    for s in streams {
        stream_starts.push(next_page);
        for _ in 0..pages_for(s.len()) {
            dir.push(next_page);
            next_page += 1;
        }
    }

    let dir_size = dir.len() * 4;
    let num_dir_pages = pages_for(dir_size);
    let first_dir_page = next_page;
    next_page += num_dir_pages as u32;
    let map_page = next_page;
    next_page += 1;

    let num_pages = next_page;
    let mut image = vec![0u8; num_pages as usize * PS];
    let put_u32 = |image: &mut [u8], at: usize, value: u32| {
        image[at..at + 4].copy_from_slice(&value.to_le_bytes());
    };

    image[0..32].copy_from_slice(MSF_MAGIC);
    put_u32(&mut image, 32, PS as u32);
    put_u32(&mut image, 36, 1);
    put_u32(&mut image, 40, num_pages);
    put_u32(&mut image, 44, dir_size as u32);
    put_u32(&mut image, 52, map_page);

    for (s, &start) in streams.iter().zip(stream_starts.iter()) {
        image[start as usize * PS..start as usize * PS + s.len()].copy_from_slice(s);
    }

    let dir_offset = first_dir_page as usize * PS;
    for (i, &value) in dir.iter().enumerate() {
        put_u32(&mut image, dir_offset + i * 4, value);
    }
    for i in 0..num_dir_pages {
        put_u32(
            &mut image,
            map_page as usize * PS + i * 4,
            first_dir_page + i as u32,
        );
    }

    image
}

// ---------------------------------------------------------------------------
// Stream builders
// ---------------------------------------------------------------------------

fn pdbi_stream() -> Vec<u8> {
    let mut s = Vec::new();
    s.extend_from_slice(&20000404u32.to_le_bytes()); // version
    s.extend_from_slice(&0x5f5e_1000u32.to_le_bytes()); // signature
    s.extend_from_slice(&7u32.to_le_bytes()); // age
    s.extend_from_slice(&[0xabu8; 16]); // guid
    s.extend_from_slice(&0u32.to_le_bytes()); // no strings
    s
}

fn tpi_stream(records: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (kind, payload) in records {
        body.extend_from_slice(&((payload.len() + 2) as u16).to_le_bytes());
        body.extend_from_slice(&kind.to_le_bytes());
        body.extend_from_slice(payload);
    }

    let mut s = vec![0u8; 56];
    s[0..4].copy_from_slice(&20040203u32.to_le_bytes());
    s[4..8].copy_from_slice(&56u32.to_le_bytes());
    s[8..12].copy_from_slice(&0x1000u32.to_le_bytes());
    s[12..16].copy_from_slice(&(0x1000 + records.len() as u32).to_le_bytes());
    s[16..20].copy_from_slice(&(body.len() as u32).to_le_bytes());
    s.extend_from_slice(&body);
    s
}

const LF_STRUCTURE: u16 = 0x1505;
const LF_FIELDLIST: u16 = 0x1203;
const LF_MEMBER: u16 = 0x150d;
const LF_POINTER: u16 = 0x1002;

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
    p.extend_from_slice(&LF_MEMBER.to_le_bytes());
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
    p.extend_from_slice(&0x0000_000Cu32.to_le_bytes());
    p
}

/// DBI stream: AMD64, one module, with debug-header entries.
///
/// `dbg` maps debug-header slots (0 = FPO .. 10 = original section header)
/// to stream indexes.
fn dbi_stream(gss_stream: u16, module_stream: u16, sym_byte_size: u32, dbg: &[(usize, u16)]) -> Vec<u8> {
    let mut modules = Vec::new();
    modules.extend_from_slice(&[0u8; 32]); // unused1 + section contrib
    modules.extend_from_slice(&0u16.to_le_bytes()); // flags
    modules.extend_from_slice(&module_stream.to_le_bytes());
    modules.extend_from_slice(&sym_byte_size.to_le_bytes());
    modules.extend_from_slice(&[0u8; 24]); // c11/c13/counts/unused/name indexes
    modules.extend_from_slice(b"fixture.obj\0");
    modules.extend_from_slice(b"fixture.lib\0");
    while modules.len() % 4 != 0 {
        modules.push(0);
    }

    let mut dbg_bytes = Vec::new();
    for slot in 0..11usize {
        let value = dbg
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, stream)| *stream)
            .unwrap_or(0xffff);
        dbg_bytes.extend_from_slice(&value.to_le_bytes());
    }

    let mut s = Vec::new();
    s.extend_from_slice(&(-1i32).to_le_bytes());
    s.extend_from_slice(&19990903u32.to_le_bytes());
    s.extend_from_slice(&7u32.to_le_bytes()); // age
    s.extend_from_slice(&0xffffu16.to_le_bytes()); // gsi
    s.extend_from_slice(&0u16.to_le_bytes());
    s.extend_from_slice(&0xffffu16.to_le_bytes()); // psi
    s.extend_from_slice(&0u16.to_le_bytes());
    s.extend_from_slice(&gss_stream.to_le_bytes());
    s.extend_from_slice(&0u16.to_le_bytes());
    s.extend_from_slice(&(modules.len() as i32).to_le_bytes());
    s.extend_from_slice(&0i32.to_le_bytes());
    s.extend_from_slice(&0i32.to_le_bytes());
    s.extend_from_slice(&0i32.to_le_bytes());
    s.extend_from_slice(&0i32.to_le_bytes());
    s.extend_from_slice(&0u32.to_le_bytes());
    s.extend_from_slice(&(dbg_bytes.len() as i32).to_le_bytes());
    s.extend_from_slice(&0i32.to_le_bytes());
    s.extend_from_slice(&0u16.to_le_bytes());
    s.extend_from_slice(&0x8664u16.to_le_bytes()); // AMD64
    s.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(s.len(), 64);

    s.extend_from_slice(&modules);
    s.extend_from_slice(&dbg_bytes);
    s
}

const S_UDT: u16 = 0x1108;
const S_GDATA32: u16 = 0x110d;
const S_GPROC32: u16 = 0x1110;
const S_CONSTANT: u16 = 0x1107;
const S_PROCREF: u16 = 0x1125;
const S_END: u16 = 0x0006;

fn sym_record(out: &mut Vec<u8>, kind: u16, payload: &[u8]) {
    out.extend_from_slice(&((payload.len() + 2) as u16).to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(payload);
}

fn gdata(ty: u32, offset: u32, section: u16, name: &str) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&ty.to_le_bytes());
    p.extend_from_slice(&offset.to_le_bytes());
    p.extend_from_slice(&section.to_le_bytes());
    p.extend_from_slice(name.as_bytes());
    p.push(0);
    p
}

fn global_stream() -> Vec<u8> {
    let mut s = Vec::new();
    sym_record(&mut s, S_GDATA32, &gdata(0x74, 0x40, 1, "g"));

    let mut udt = Vec::new();
    udt.extend_from_slice(&0x1000u32.to_le_bytes()); // points at the fwdref
    udt.extend_from_slice(b"Foo\0");
    sym_record(&mut s, S_UDT, &udt);

    let mut constant = Vec::new();
    constant.extend_from_slice(&0x74u32.to_le_bytes());
    constant.extend_from_slice(&[0x03, 0x80, 0x01, 0x00, 0x00, 0x80]); // LF_LONG
    constant.extend_from_slice(b"kMin\0");
    sym_record(&mut s, S_CONSTANT, &constant);

    let mut procref = Vec::new();
    procref.extend_from_slice(&0u32.to_le_bytes());
    procref.extend_from_slice(&4u32.to_le_bytes()); // symbol offset in module
    procref.extend_from_slice(&1u16.to_le_bytes()); // 1-based module index
    procref.extend_from_slice(b"proc1\0");
    sym_record(&mut s, S_PROCREF, &procref);

    // A std:: symbol that the default filter drops.
    sym_record(&mut s, S_GDATA32, &gdata(0x74, 0x90, 1, "std::locale::id"));

    s
}

fn module_stream() -> Vec<u8> {
    let mut records = Vec::new();

    let mut proc = Vec::new();
    proc.extend_from_slice(&[0u8; 24]); // parent/end/next/len/dbg range
    proc.extend_from_slice(&0x1003u32.to_le_bytes()); // type: pointer record
    proc.extend_from_slice(&0x100u32.to_le_bytes()); // offset
    proc.extend_from_slice(&1u16.to_le_bytes()); // section
    proc.push(0); // flags
    proc.extend_from_slice(b"proc1\0");
    sym_record(&mut records, S_GPROC32, &proc);
    sym_record(&mut records, S_END, &[]);

    let mut s = 4u32.to_le_bytes().to_vec();
    s.extend_from_slice(&records);
    s
}

fn section_stream(sections: &[(&str, u32, u32)]) -> Vec<u8> {
    let mut s = Vec::new();
    for &(name, virtual_address, virtual_size) in sections {
        let mut header = vec![0u8; 40];
        header[..name.len()].copy_from_slice(name.as_bytes());
        header[8..12].copy_from_slice(&virtual_size.to_le_bytes());
        header[12..16].copy_from_slice(&virtual_address.to_le_bytes());
        header[36..40].copy_from_slice(&0x6000_0020u32.to_le_bytes());
        s.extend_from_slice(&header);
    }
    s
}

fn omap_stream(pairs: &[(u32, u32)]) -> Vec<u8> {
    let mut s = Vec::new();
    for &(from, to) in pairs {
        s.extend_from_slice(&from.to_le_bytes());
        s.extend_from_slice(&to.to_le_bytes());
    }
    s
}

fn fixture_tpi() -> Vec<u8> {
    let mut fieldlist = member(0x74, 0, "a");
    fieldlist.extend_from_slice(&member(0x74, 4, "b"));

    tpi_stream(&[
        (LF_STRUCTURE, structure(true, 0, 0, "Foo")), // 0x1000, fwdref
        (LF_STRUCTURE, structure(false, 8, 0x1002, "Foo")), // 0x1001
        (LF_FIELDLIST, fieldlist),                    // 0x1002
        (LF_POINTER, pointer(0x1000)),                // 0x1003 -> rewritten
    ])
}

/// The standard fixture: identity remap, one module, one data symbol.
fn fixture() -> Vec<u8> {
    let module = module_stream();
    build_msf(&[
        Vec::new(),   // 0: old directory
        pdbi_stream(), // 1
        fixture_tpi(), // 2
        dbi_stream(4, 5, module.len() as u32, &[(5, 6)]), // 3; dbg slot 5 = section header
        global_stream(), // 4
        module,          // 5
        section_stream(&[(".text", 0x1000, 0x2000)]), // 6
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn minimal_pdb_opens_with_empty_type_universe() {
    // Three streams: old directory, PDB info, and a TPI with begin == end.
    let image = build_msf(&[Vec::new(), pdbi_stream(), tpi_stream(&[])]);
    let pdb = open(image).unwrap();

    assert!(matches!(
        pdb.type_by_id(0x1000),
        Err(Error::UnknownTypeIndex(TypeIndex(0x1000)))
    ));
    assert_eq!(pdb.machine(), MachineKind::Unknown);
    assert_eq!(pdb.pointer_width(), 8);
    assert_eq!(pdb.age(), 7);
}

#[test]
fn bad_signature_is_unsupported_version() {
    let mut image = fixture();
    image[0] = b'X';
    assert!(matches!(open(image), Err(Error::UnsupportedVersion)));
}

#[test]
fn machine_and_identity_come_from_the_fixed_streams() {
    let pdb = open(fixture()).unwrap();
    assert_eq!(pdb.machine(), MachineKind::Amd64);
    assert_eq!(pdb.pointer_width(), 8);
    assert_eq!(pdb.age(), 7);
    assert_ne!(pdb.guid(), uuid::Uuid::nil());
    assert_eq!(pdb.modules().len(), 1);
    assert_eq!(pdb.modules()[0].name, "fixture.obj");
}

#[test]
fn fwdref_resolution_and_layout() {
    let pdb = open(fixture()).unwrap();

    let foo = pdb.type_by_name("Foo").unwrap();
    assert_eq!(pdb.size_of(&foo), 8);

    let layout = pdb.layout(&foo, 0, true).unwrap();
    assert_eq!(layout.field("a").unwrap().address, 0);
    assert_eq!(layout.field("b").unwrap().address, 4);

    // The forward reference's index no longer resolves.
    assert!(pdb.type_by_id(0x1000).is_err());
}

#[test]
fn pointer_deref_and_name() {
    let pdb = open(fixture()).unwrap();

    let ptr = pdb.type_by_id(0x1003).unwrap();
    assert_eq!(pdb.type_name(&ptr), "Foo *");

    let deref = pdb.deref_pointer(&ptr, 0x9000).unwrap();
    assert_eq!(deref.type_name, "Foo");
    assert_eq!(deref.address, 0x9000);
    assert_eq!(deref.field("b").unwrap().address, 0x9004);
}

#[test]
fn resolve_and_name_at_round_trip() {
    let pdb = open(fixture()).unwrap();

    // Section 1 has VA 0x1000; no OMAP, so remap is the identity.
    let (ty, rva) = pdb.resolve("g").unwrap();
    assert_eq!(pdb.type_name(&ty), "T_INT4");
    assert_eq!(rva, 0x1040);
    assert_eq!(pdb.name_at(0x1040), Some("g"));
    assert_eq!(pdb.name_at(0x1044), None);

    // Procref: resolved through the module's symbol stream.
    let (proc_ty, proc_rva) = pdb.resolve("proc1").unwrap();
    assert_eq!(proc_rva, 0x1100);
    assert_eq!(pdb.type_name(&proc_ty), "Foo *");
    assert_eq!(pdb.name_at(0x1100), Some("proc1"));

    // Round trip for every name in the data index.
    for name in pdb.global_symbols().data.keys() {
        let (_, rva) = pdb.resolve(name).unwrap();
        assert_eq!(pdb.name_at(rva), Some(name.as_str()));
    }
}

#[test]
fn resolve_falls_back_to_udt_and_tpi() {
    let pdb = open(fixture()).unwrap();

    // "Foo" is indexed by S_UDT, whose typind points at the dropped forward
    // reference; resolution falls through to the TPI name lookup.
    let (ty, rva) = pdb.resolve("Foo").unwrap();
    assert_eq!(rva, 0);
    assert_eq!(pdb.size_of(&ty), 8);

    assert!(matches!(
        pdb.resolve("does_not_exist"),
        Err(Error::UnknownSymbol(_))
    ));
}

#[test]
fn constants_are_indexed() {
    let pdb = open(fixture()).unwrap();
    let constant = pdb.constant_by_name("kMin").unwrap();
    assert_eq!(constant.value, -2147483647);
}

#[test]
fn std_names_are_filtered_by_default() {
    let pdb = open(fixture()).unwrap();
    assert!(pdb.resolve("std::locale::id").is_err());

    let pdb = Pdb::from_file(
        TestFile { data: fixture() },
        OpenOptions {
            exclude_std_names: false,
        },
    )
    .unwrap();
    let (_, rva) = pdb.resolve("std::locale::id").unwrap();
    assert_eq!(rva, 0x1090);
}

#[test]
fn omap_remaps_symbol_addresses() {
    // Like the standard fixture, but the image was rearranged: the debug
    // header names original sections (slot 10) and an OMAP-from-src
    // (slot 4) alongside the current sections (slot 5).
    let module = module_stream();
    let image = build_msf(&[
        Vec::new(),
        pdbi_stream(),
        fixture_tpi(),
        dbi_stream(
            4,
            5,
            module.len() as u32,
            &[(5, 6), (10, 7), (4, 8)],
        ),
        global_stream(),
        module,
        section_stream(&[(".text", 0x4000, 0x2000)]), // current, not used
        section_stream(&[(".text", 0x1000, 0x2000)]), // original
        omap_stream(&[(0x1000, 0x5000), (0x2000, 0)]), // from-src
    ]);
    let pdb = open(image).unwrap();

    // g: section 1, offset 0x40 -> original VA 0x1040 -> OMAP -> 0x5040.
    let (_, rva) = pdb.resolve("g").unwrap();
    assert_eq!(rva, 0x5040);
    assert_eq!(pdb.name_at(0x5040), Some("g"));
}

#[test]
fn remap_is_monotonic_within_a_section_without_omap() {
    let pdb = open(fixture()).unwrap();
    let mut last = 0;
    for offset in [0u32, 0x10, 0x200, 0x1fff] {
        let rva = pdb.remap_address(1, offset).unwrap();
        assert!(rva >= last);
        last = rva;
    }

    assert!(matches!(
        pdb.remap_address(0, 0),
        Err(Error::BadSectionIndex(0))
    ));
    assert!(matches!(
        pdb.remap_address(9, 0),
        Err(Error::BadSectionIndex(9))
    ));
}
