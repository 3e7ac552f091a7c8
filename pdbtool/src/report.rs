//! Renders a parsed PDB as a text report: identity, struct layouts, and
//! resolved symbol addresses.

use pdbwalk::{Pdb, StructRecord};
use std::io::Write;

pub fn write_report<W: Write>(pdb: &Pdb, w: &mut W) -> std::io::Result<()> {
    writeln!(w, "guid:          {}", pdb.guid())?;
    writeln!(w, "age:           {}", pdb.age())?;
    writeln!(w, "machine:       {}", pdb.machine())?;
    writeln!(w, "pointer width: {}", pdb.pointer_width())?;
    writeln!(w, "modules:       {}", pdb.modules().len())?;
    writeln!(w)?;

    write_types(pdb, w)?;
    write_symbols(pdb, w)?;
    Ok(())
}

fn write_types<W: Write>(pdb: &Pdb, w: &mut W) -> std::io::Result<()> {
    let mut names: Vec<&str> = pdb.struct_names().map(|(name, _)| name).collect();
    names.sort_unstable();

    writeln!(w, "=== types ({}) ===", names.len())?;
    for name in names {
        let Ok(ty) = pdb.type_by_name(name) else {
            continue;
        };
        match pdb.layout(&ty, 0, true) {
            Ok(layout) => write_layout(w, &layout, name, 0)?,
            Err(e) => writeln!(w, "{name}: <{e}>")?,
        }
    }
    writeln!(w)?;
    Ok(())
}

fn write_layout<W: Write>(
    w: &mut W,
    record: &StructRecord,
    name: &str,
    indent: usize,
) -> std::io::Result<()> {
    write!(
        w,
        "{:indent$}+0x{:04x} {}: {}",
        "",
        record.address,
        name,
        record.type_name,
        indent = indent * 2
    )?;
    if let (Some(bit_offset), Some(bit_size)) = (record.bit_offset, record.bit_size) {
        write!(w, " <bits {}:{}>", bit_offset, bit_size)?;
    }
    writeln!(w, " (size {})", record.size)?;

    if let Some(children) = &record.fields {
        // Array element layouts repeat; the extent is already in the type
        // name, so only composites get their children listed.
        let is_array = children
            .first()
            .is_some_and(|child| child.level_name.starts_with('['));
        if !is_array {
            for child in children {
                write_layout(w, child, &child.level_name, indent + 1)?;
            }
        }
    }
    Ok(())
}

fn write_symbols<W: Write>(pdb: &Pdb, w: &mut W) -> std::io::Result<()> {
    let globals = pdb.global_symbols();

    let mut names: Vec<&str> = globals
        .data
        .keys()
        .chain(globals.procrefs.keys())
        .map(String::as_str)
        .collect();
    names.sort_unstable();
    names.dedup();

    writeln!(w, "=== symbols ({}) ===", names.len())?;
    for name in names {
        match pdb.resolve(name) {
            Ok((ty, rva)) => {
                writeln!(w, "{rva:#010x} {name}: {}", pdb.type_name(&ty))?;
            }
            Err(e) => writeln!(w, "{:>10} {name}: <{e}>", "-")?,
        }
    }

    let mut constants: Vec<&str> = globals.constants.keys().map(String::as_str).collect();
    constants.sort_unstable();
    if !constants.is_empty() {
        writeln!(w)?;
        writeln!(w, "=== constants ({}) ===", constants.len())?;
        for name in constants {
            let constant = &globals.constants[name];
            writeln!(w, "{name} = {}", constant.value)?;
        }
    }

    Ok(())
}
