//! The global symbol stream.
//!
//! The stream named by the DBI header's `global_symbol_stream` field holds
//! the global symbol records: global/local data, thread storage, publics,
//! UDTs, constants, and procedure references into module streams.
//!
//! Records are indexed by name, last writer wins. Per-record decode failures
//! are logged and the record is skipped; they never abort open.

use crate::syms::{ConstantSym, DataSym, ProcRefSym, PubSym, Sym, SymIter, SymKind, UdtSym};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Name-keyed indexes over the global symbol stream.
#[derive(Default)]
pub struct GlobalSymbols {
    /// `S_GDATA32` and `S_LDATA32`, merged.
    pub data: HashMap<String, DataSym>,
    /// `S_GTHREAD32` and `S_LTHREAD32`, merged.
    pub threads: HashMap<String, DataSym>,
    /// `S_PUB32` and `S_PUB32_ST`.
    pub publics: HashMap<String, PubSym>,
    /// `S_UDT`.
    pub udts: HashMap<String, UdtSym>,
    /// `S_CONSTANT`.
    pub constants: HashMap<String, ConstantSym>,
    /// `S_PROCREF` and `S_LPROCREF`, merged.
    pub procrefs: HashMap<String, ProcRefSym>,
}

/// Returns true when a name should be dropped from the indexes because the
/// standard-library filter is active.
pub(crate) fn is_filtered(name: &str, exclude_std: bool) -> bool {
    exclude_std && name.starts_with("std::")
}

impl GlobalSymbols {
    /// Decodes the global symbol stream and builds the name indexes.
    pub fn parse(stream_data: &[u8], exclude_std: bool) -> GlobalSymbols {
        let mut out = GlobalSymbols::default();
        let mut duplicates = 0usize;
        let mut unrecognized: HashMap<SymKind, u32> = HashMap::new();

        for sym in SymIter::new(stream_data) {
            if let Err(()) = out.add_record(&sym, exclude_std, &mut duplicates) {
                // Decode failures skip the record only.
                warn!(kind = ?sym.kind, "failed to decode global symbol record");
                continue;
            }

            if out.knows_kind(sym.kind) {
                continue;
            }
            *unrecognized.entry(sym.kind).or_default() += 1;
        }

        if duplicates > 0 {
            debug!(duplicates, "duplicate global symbol names; last one wins");
        }
        if !unrecognized.is_empty() {
            debug!(
                kinds = unrecognized.len(),
                "skipped global symbol records of unrecognized kinds"
            );
        }

        out
    }

    fn knows_kind(&self, kind: SymKind) -> bool {
        matches!(
            kind,
            SymKind::S_GDATA32
                | SymKind::S_LDATA32
                | SymKind::S_GTHREAD32
                | SymKind::S_LTHREAD32
                | SymKind::S_PUB32
                | SymKind::S_PUB32_ST
                | SymKind::S_UDT
                | SymKind::S_CONSTANT
                | SymKind::S_PROCREF
                | SymKind::S_LPROCREF
        )
    }

    fn add_record(
        &mut self,
        sym: &Sym<'_>,
        exclude_std: bool,
        duplicates: &mut usize,
    ) -> Result<(), ()> {
        fn insert<T>(
            map: &mut HashMap<String, T>,
            name: &str,
            value: T,
            exclude_std: bool,
            duplicates: &mut usize,
        ) {
            if is_filtered(name, exclude_std) {
                return;
            }
            if map.insert(name.to_string(), value).is_some() {
                *duplicates += 1;
            }
        }

        match sym.kind {
            SymKind::S_GDATA32 | SymKind::S_LDATA32 => {
                let data = DataSym::parse(sym.data).map_err(|_| ())?;
                let name = data.name.clone();
                insert(&mut self.data, &name, data, exclude_std, duplicates);
            }

            SymKind::S_GTHREAD32 | SymKind::S_LTHREAD32 => {
                let data = DataSym::parse(sym.data).map_err(|_| ())?;
                let name = data.name.clone();
                insert(&mut self.threads, &name, data, exclude_std, duplicates);
            }

            SymKind::S_PUB32 => {
                let pub_sym = PubSym::parse(sym.data).map_err(|_| ())?;
                let name = pub_sym.name.clone();
                insert(&mut self.publics, &name, pub_sym, exclude_std, duplicates);
            }

            SymKind::S_PUB32_ST => {
                let pub_sym = PubSym::parse_st(sym.data).map_err(|_| ())?;
                let name = pub_sym.name.clone();
                insert(&mut self.publics, &name, pub_sym, exclude_std, duplicates);
            }

            SymKind::S_UDT => {
                let udt = UdtSym::parse(sym.data).map_err(|_| ())?;
                let name = udt.name.clone();
                insert(&mut self.udts, &name, udt, exclude_std, duplicates);
            }

            SymKind::S_CONSTANT => {
                let constant = ConstantSym::parse(sym.data).map_err(|_| ())?;
                let name = constant.name.clone();
                insert(&mut self.constants, &name, constant, exclude_std, duplicates);
            }

            SymKind::S_PROCREF | SymKind::S_LPROCREF => {
                let proc_ref = ProcRefSym::parse(sym.data).map_err(|_| ())?;
                let name = proc_ref.name.clone();
                insert(&mut self.procrefs, &name, proc_ref, exclude_std, duplicates);
            }

            _ => {}
        }

        Ok(())
    }
}
