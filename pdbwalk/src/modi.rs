//! Per-module symbol streams.
//!
//! Each DBI module entry may name a stream holding that module's local
//! symbols: a 4-byte signature header followed by length-prefixed records,
//! then line data this crate does not read. The DBI entry's `sym_byte_size`
//! bounds the symbol region, including the 4-byte header.

use crate::globals::is_filtered;
use crate::syms::{DataSym, ProcSym, SymIter, SymKind, UdtSym};
use tracing::warn;

/// The decoded symbols of one module stream.
#[derive(Default)]
pub struct ModuleSymbols {
    /// `S_GPROC32` and `S_LPROC32` records, in stream order.
    pub procs: Vec<ProcSym>,
    /// `S_GDATA32` and `S_LDATA32` records, in stream order.
    pub data: Vec<DataSym>,
    /// `S_UDT` records, in stream order.
    pub udts: Vec<UdtSym>,
}

impl ModuleSymbols {
    /// Decodes a module symbol stream.
    ///
    /// `sym_byte_size` comes from the module's DBI entry; when it is zero or
    /// out of range the whole stream is scanned instead.
    pub fn parse(stream_data: &[u8], sym_byte_size: u32, exclude_std: bool) -> ModuleSymbols {
        let mut out = ModuleSymbols::default();

        if stream_data.len() < 4 {
            return out;
        }

        let end = match sym_byte_size as usize {
            size if size >= 4 && size <= stream_data.len() => size,
            _ => stream_data.len(),
        };
        let body = &stream_data[4..end];

        for sym in SymIter::new(body) {
            match sym.kind {
                SymKind::S_GPROC32 | SymKind::S_LPROC32 => match ProcSym::parse(sym.data) {
                    Ok(proc) => {
                        if !is_filtered(&proc.name, exclude_std) {
                            out.procs.push(proc);
                        }
                    }
                    Err(_) => warn!("failed to decode module procedure record"),
                },

                SymKind::S_GDATA32 | SymKind::S_LDATA32 => match DataSym::parse(sym.data) {
                    Ok(data) => {
                        if !is_filtered(&data.name, exclude_std) {
                            out.data.push(data);
                        }
                    }
                    Err(_) => warn!("failed to decode module data record"),
                },

                SymKind::S_UDT => match UdtSym::parse(sym.data) {
                    Ok(udt) => {
                        if !is_filtered(&udt.name, exclude_std) {
                            out.udts.push(udt);
                        }
                    }
                    Err(_) => warn!("failed to decode module UDT record"),
                },

                _ => {}
            }
        }

        out
    }

    /// Finds a procedure by name.
    pub fn proc_by_name(&self, name: &str) -> Option<&ProcSym> {
        self.procs.iter().find(|proc| proc.name == name)
    }
}
